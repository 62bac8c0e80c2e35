// src/pipeline/scheduler.rs
//! The self-perpetuating cycle.
//!
//! `CycleRunner` handles `RunCycle`: start a recovery sweep, read the OPML
//! document, hand it to the fan-out, then re-arm itself per [`RearmPolicy`].
//! Re-arm happens only after a successful pass, and never once the shutdown
//! signal has been triggered. A cycle that cannot read its OPML fails
//! without re-arming; the trigger API can always start a fresh one.
//!
//! `FeedFanout` handles `DownloadFeeds`: parse the OPML, snapshot the scored
//! fingerprints once, compute the cutoff, and enqueue one fetch per feed URL
//! with cutoff and snapshot shared across the whole fan-out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::{counter, gauge};
use tracing::info;

use crate::feed::opml;
use crate::queue::{Job, JobHandler, JobQueue, ShutdownSignal};
use crate::store::ArticleStore;

/// How the next cycle is armed after the current one finishes its
/// orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RearmPolicy {
    /// Enqueue the next cycle right away (continuous harvesting).
    Immediate,
    /// Enqueue the next cycle after a fixed pause.
    After(Duration),
}

impl RearmPolicy {
    /// Zero means continuous.
    pub fn from_interval_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::Immediate
        } else {
            Self::After(Duration::from_secs(secs))
        }
    }
}

pub struct CycleRunner {
    queue: JobQueue,
    opml_path: PathBuf,
    rearm: RearmPolicy,
    shutdown: ShutdownSignal,
}

impl CycleRunner {
    pub fn new(
        queue: JobQueue,
        opml_path: PathBuf,
        rearm: RearmPolicy,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            queue,
            opml_path,
            rearm,
            shutdown,
        }
    }
}

#[async_trait::async_trait]
impl JobHandler for CycleRunner {
    async fn run(&self, job: &Job) -> Result<()> {
        let Job::RunCycle = job else {
            anyhow::bail!("cycle runner received {}", job.kind().as_str());
        };

        counter!("pipeline_cycles_total").increment(1);
        gauge!("pipeline_last_cycle_ts").set(Utc::now().timestamp().max(0) as f64);

        self.queue.enqueue(Job::RecoveryScan);

        let opml = tokio::fs::read_to_string(&self.opml_path)
            .await
            .with_context(|| format!("reading opml from {}", self.opml_path.display()))?;
        self.queue.enqueue(Job::DownloadFeeds { opml });

        if self.shutdown.is_triggered() {
            info!(target: "pipeline", "shutdown triggered, cycle not re-armed");
            return Ok(());
        }
        match self.rearm {
            RearmPolicy::Immediate => self.queue.enqueue(Job::RunCycle),
            RearmPolicy::After(delay) => self.queue.enqueue_after(Job::RunCycle, 0, delay),
        }
        Ok(())
    }
}

pub struct FeedFanout {
    store: Arc<dyn ArticleStore>,
    queue: JobQueue,
    cutoff_hours: i64,
}

impl FeedFanout {
    pub fn new(store: Arc<dyn ArticleStore>, queue: JobQueue, cutoff_hours: i64) -> Self {
        Self {
            store,
            queue,
            cutoff_hours,
        }
    }
}

#[async_trait::async_trait]
impl JobHandler for FeedFanout {
    async fn run(&self, job: &Job) -> Result<()> {
        let Job::DownloadFeeds { opml } = job else {
            anyhow::bail!("feed fan-out received {}", job.kind().as_str());
        };

        // malformed OPML is fatal for this cycle, no partial fan-out
        let urls = opml::feed_urls(opml)?;
        let cutoff = Utc::now() - chrono::Duration::hours(self.cutoff_hours);
        let scored = Arc::new(self.store.scored_fingerprints().await?);

        gauge!("pipeline_fanout_feeds").set(urls.len() as f64);
        info!(
            target: "pipeline",
            feeds = urls.len(),
            scored = scored.len(),
            cutoff = %cutoff,
            "feed fan-out"
        );

        for url in urls {
            self.queue.enqueue(Job::FetchFeed {
                url,
                cutoff,
                scored: Arc::clone(&scored),
            });
        }
        Ok(())
    }
}
