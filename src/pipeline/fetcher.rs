// src/pipeline/fetcher.rs
//! Per-feed fetch handler. One bad feed never sinks the cycle: transport
//! errors, bad statuses and unparseable bodies are logged and swallowed, and
//! the job reports success so the dispatcher schedules no retry. Feeds are
//! simply picked up again on the next cycle.

use std::time::Duration;

use anyhow::{Context, Result};
use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::feed;
use crate::queue::{Job, JobHandler, JobQueue};

pub struct FeedFetcher {
    http: reqwest::Client,
    queue: JobQueue,
}

impl FeedFetcher {
    pub fn new(queue: JobQueue, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("feedrank/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self { http, queue }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("feed request failed")?
            .error_for_status()
            .context("feed answered with an error status")?;
        let body = response.bytes().await.context("reading feed body")?;
        Ok(body.to_vec())
    }
}

#[async_trait::async_trait]
impl JobHandler for FeedFetcher {
    async fn run(&self, job: &Job) -> Result<()> {
        let Job::FetchFeed {
            url,
            cutoff,
            scored,
        } = job
        else {
            anyhow::bail!("feed fetcher received {}", job.kind().as_str());
        };

        counter!("feed_fetches_total").increment(1);
        let body = match self.download(url).await {
            Ok(body) => body,
            Err(err) => {
                counter!("feed_fetch_failures_total").increment(1);
                warn!(target: "pipeline", url = %url, error = %err, "feed fetch failed, skipped");
                return Ok(());
            }
        };

        let started = std::time::Instant::now();
        let candidates = match feed::extract_candidates(&body, *cutoff, scored) {
            Ok(candidates) => candidates,
            Err(err) => {
                counter!("feed_parse_failures_total").increment(1);
                warn!(target: "pipeline", url = %url, error = %err, "feed parse failed, skipped");
                return Ok(());
            }
        };
        histogram!("feed_parse_ms").record(started.elapsed().as_millis() as f64);

        info!(
            target: "pipeline",
            url = %url,
            kept = candidates.len(),
            "feed normalized"
        );
        if !candidates.is_empty() {
            self.queue.enqueue(Job::InsertArticles {
                articles: candidates,
            });
        }
        Ok(())
    }
}
