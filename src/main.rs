//! Feed harvester — Binary Entrypoint
//! Wires config, store, queue, dispatcher, and the trigger API together,
//! seeds the first cycle, and serves HTTP until ctrl-c.
//!
//! See `README.md` for quickstart and `DESIGN.md` for architecture notes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedrank::config::AppConfig;
use feedrank::metrics::Metrics;
use feedrank::pipeline::{
    CycleRunner, FeedFanout, FeedFetcher, InsertionGate, RearmPolicy, RecoverySweep,
};
use feedrank::queue::{self, Dispatcher, Job, JobKind, Registry, RetryPolicy, ShutdownSignal};
use feedrank::scoring::ingestor::ScoreIngestor;
use feedrank::scoring::limiter::RateLimiter;
use feedrank::scoring::provider::ChatCompletionsProvider;
use feedrank::scoring::ScoringClient;
use feedrank::store::MemoryStore;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedrank=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::load_default().context("loading configuration")?;
    let metrics = Metrics::init(config.scoring_budget_per_worker());

    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(ChatCompletionsProvider::from_config(&config));
    let limiter = Arc::new(RateLimiter::per_minute(config.scoring_budget_per_worker()));
    let rubric = config.rubric();

    let (queue, rx) = queue::channel();
    let shutdown = ShutdownSignal::new();

    let mut registry = Registry::new();
    registry.register(
        JobKind::RunCycle,
        Arc::new(CycleRunner::new(
            queue.clone(),
            config.opml_path.clone(),
            RearmPolicy::from_interval_secs(config.cycle_interval_secs),
            shutdown.clone(),
        )),
        RetryPolicy::none(),
    );
    registry.register(
        JobKind::DownloadFeeds,
        Arc::new(FeedFanout::new(
            store.clone(),
            queue.clone(),
            config.cutoff_hours,
        )),
        RetryPolicy::none(),
    );
    registry.register(
        JobKind::FetchFeed,
        Arc::new(FeedFetcher::new(
            queue.clone(),
            Duration::from_secs(config.fetch_timeout_secs),
        )),
        RetryPolicy::none(),
    );
    registry.register(
        JobKind::InsertArticles,
        Arc::new(InsertionGate::new(
            store.clone(),
            queue.clone(),
            rubric.clone(),
        )),
        RetryPolicy::none(),
    );
    registry.register(
        JobKind::ScoreArticle,
        Arc::new(ScoringClient::new(provider, limiter, queue.clone())),
        RetryPolicy::exponential(5, Duration::from_secs(3600)),
    );
    registry.register(
        JobKind::ApplyScores,
        Arc::new(ScoreIngestor::new(store.clone())),
        RetryPolicy::fixed(3, Duration::from_secs(30)),
    );
    registry.register(
        JobKind::RecoveryScan,
        Arc::new(RecoverySweep::new(store.clone(), queue.clone(), rubric)),
        RetryPolicy::none(),
    );

    let dispatcher = Dispatcher::new(
        registry,
        queue.clone(),
        rx,
        config.worker_count,
        shutdown.clone(),
    );
    let dispatcher_handle = dispatcher.spawn();

    if config.autostart {
        info!(workers = config.worker_count, "seeding first harvest cycle");
        queue.enqueue(Job::RunCycle);
    }

    let router =
        feedrank::api::create_router(queue.clone(), config.opml_path.clone()).merge(metrics.router());

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
            shutdown.trigger();
        });
    }

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "serving trigger api");

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
        .await
        .context("http server")?;

    // The dispatcher stops on the same signal; wait for it before exiting.
    shutdown.trigger();
    let _ = dispatcher_handle.await;
    Ok(())
}
