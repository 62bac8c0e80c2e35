// src/queue/registry.rs
//! Job definitions and the registry the dispatcher consults.
//!
//! Every job kind is registered once at startup with its handler and its
//! retry policy; nothing registers itself from module scope. The dispatcher
//! only ever sees `(kind -> handler, policy)` through [`Registry::lookup`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::scoring::response::ScoreBatch;
use crate::scoring::ScoringRequest;
use crate::store::Article;

/// One unit of queued work, payload included.
#[derive(Debug, Clone)]
pub enum Job {
    /// Run one harvest cycle: recovery sweep, OPML read, fan-out, re-arm.
    RunCycle,
    /// Fan a loaded OPML document out into per-feed fetches.
    DownloadFeeds { opml: String },
    /// Fetch and normalize a single feed. The scored-fingerprint snapshot is
    /// captured once per cycle and shared read-only across the fan-out.
    FetchFeed {
        url: String,
        cutoff: DateTime<Utc>,
        scored: Arc<HashSet<String>>,
    },
    /// Insert a batch of candidates through the store's uniqueness gate.
    InsertArticles { articles: Vec<Article> },
    /// Request a significance score for one article.
    ScoreArticle { request: ScoringRequest },
    /// Apply one validated scoring response to the store.
    ApplyScores { batch: ScoreBatch },
    /// Re-enqueue scoring for every stored article without a score.
    RecoveryScan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    RunCycle,
    DownloadFeeds,
    FetchFeed,
    InsertArticles,
    ScoreArticle,
    ApplyScores,
    RecoveryScan,
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::RunCycle => JobKind::RunCycle,
            Job::DownloadFeeds { .. } => JobKind::DownloadFeeds,
            Job::FetchFeed { .. } => JobKind::FetchFeed,
            Job::InsertArticles { .. } => JobKind::InsertArticles,
            Job::ScoreArticle { .. } => JobKind::ScoreArticle,
            Job::ApplyScores { .. } => JobKind::ApplyScores,
            Job::RecoveryScan => JobKind::RecoveryScan,
        }
    }
}

impl JobKind {
    /// Stable label for logs and metric dimensions.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::RunCycle => "run_cycle",
            JobKind::DownloadFeeds => "download_feeds",
            JobKind::FetchFeed => "fetch_feed",
            JobKind::InsertArticles => "insert_articles",
            JobKind::ScoreArticle => "score_article",
            JobKind::ApplyScores => "apply_scores",
            JobKind::RecoveryScan => "recovery_scan",
        }
    }

    /// Fixed priority tag carried through logs and metrics. Dispatch itself
    /// is FIFO; the tag mirrors the queue lanes of the upstream system
    /// (1 fetch, 2 insert, 3 score, 4 apply, 0 orchestration).
    pub fn priority(&self) -> u8 {
        match self {
            JobKind::FetchFeed => 1,
            JobKind::InsertArticles => 2,
            JobKind::ScoreArticle => 3,
            JobKind::ApplyScores => 4,
            JobKind::RunCycle | JobKind::DownloadFeeds | JobKind::RecoveryScan => 0,
        }
    }
}

/// Delay shape applied between a failed attempt and its re-submission.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    None,
    Fixed(Duration),
    /// `min(2^attempt, cap)` seconds, attempt counted from zero.
    Exponential { cap: Duration },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Re-submissions allowed after the initial run; `max_retries = 5` means
    /// at most six executions in total.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::None,
        }
    }

    pub const fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub const fn exponential(max_retries: u32, cap: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential { cap },
        }
    }

    /// Delay scheduled after failed attempt `attempt` (0-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { cap } => {
                let secs = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
                Duration::from_secs(secs).min(cap)
            }
        }
    }
}

#[async_trait::async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: &Job) -> Result<()>;
}

pub struct Registration {
    pub handler: Arc<dyn JobHandler>,
    pub policy: RetryPolicy,
}

/// Startup-built map from job kind to handler + retry policy.
#[derive(Default)]
pub struct Registry {
    entries: HashMap<JobKind, Registration>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        kind: JobKind,
        handler: Arc<dyn JobHandler>,
        policy: RetryPolicy,
    ) {
        self.entries.insert(kind, Registration { handler, policy });
    }

    pub fn lookup(&self, kind: JobKind) -> Option<&Registration> {
        self.entries.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
