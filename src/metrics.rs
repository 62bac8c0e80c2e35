// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("queue_enqueued_total", "Jobs accepted onto the queue.");
        describe_counter!("queue_completed_total", "Jobs that ran to completion.");
        describe_counter!(
            "queue_retries_total",
            "Job executions re-enqueued after a failure."
        );
        describe_counter!(
            "queue_abandoned_total",
            "Jobs dropped after exhausting their retry budget."
        );
        describe_gauge!("queue_inflight_jobs", "Jobs currently held by a worker.");
        describe_histogram!("queue_job_duration_ms", "Job execution time in milliseconds.");

        describe_counter!("pipeline_cycles_total", "Harvest cycles started.");
        describe_gauge!(
            "pipeline_last_cycle_ts",
            "Unix ts when the last harvest cycle started."
        );
        describe_gauge!("pipeline_fanout_feeds", "Feed URLs in the last fan-out.");
        describe_counter!("feed_fetches_total", "Feed downloads attempted.");
        describe_counter!("feed_fetch_failures_total", "Feed downloads that failed.");
        describe_counter!(
            "feed_parse_failures_total",
            "Feed bodies that could not be parsed."
        );
        describe_histogram!("feed_parse_ms", "Feed parse time in milliseconds.");
        describe_counter!("articles_inserted_total", "Articles stored for the first time.");
        describe_counter!(
            "articles_conflicted_total",
            "Candidates skipped because the fingerprint already exists."
        );

        describe_counter!(
            "scoring_requests_total",
            "Scoring prompts sent to the provider."
        );
        describe_counter!("scores_applied_total", "Scores written back to stored articles.");
        describe_counter!(
            "scores_orphaned_total",
            "Scores that arrived for articles no longer in the store."
        );
        describe_counter!(
            "recovery_requeued_total",
            "Unscored articles re-enqueued by a recovery sweep."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize Prometheus recorder and expose a static gauge for the
    /// per-worker scoring budget.
    pub fn init(rate_budget_per_worker: u32) -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        ensure_metrics_described();

        // Static gauge with the per-worker request budget (requests per minute)
        gauge!("scoring_rate_budget_per_worker").set(rate_budget_per_worker as f64);

        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
