// src/scoring/mod.rs
//! Scoring dispatch: rate-limited calls to the scoring service, response
//! validation, and hand-off of validated batches to the ingestor.

pub mod ingestor;
pub mod limiter;
pub mod provider;
pub mod response;

use std::sync::Arc;

use anyhow::Result;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::queue::{Job, JobHandler, JobQueue};
use limiter::RateLimiter;
use provider::ScoreProvider;
use response::{parse_batch, validate_batch};

/// Unit of scoring work. Carries everything the call needs so the queue
/// boundary stays self-contained, and serializes so a durable queue backend
/// can carry it as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub title: String,
    pub fingerprint: String,
    pub rubric_prompt: String,
}

impl ScoringRequest {
    /// The rubric immediately followed by the title/fingerprint block. The
    /// service is expected to echo the fingerprint back as `id`.
    pub fn prompt(&self) -> String {
        format!(
            "{}Title: `{}` Hash (\"id\"): `{}`",
            self.rubric_prompt, self.title, self.fingerprint
        )
    }
}

/// Job handler for [`Job::ScoreArticle`]. One rate-limited provider call,
/// strict validation, then an apply job. Every failure (transport, parse,
/// mismatched id, out-of-range score) surfaces as `Err` so the dispatcher's
/// exponential backoff owns the retry schedule.
pub struct ScoringClient {
    provider: Arc<dyn ScoreProvider>,
    limiter: Arc<RateLimiter>,
    queue: JobQueue,
}

impl ScoringClient {
    pub fn new(
        provider: Arc<dyn ScoreProvider>,
        limiter: Arc<RateLimiter>,
        queue: JobQueue,
    ) -> Self {
        Self {
            provider,
            limiter,
            queue,
        }
    }
}

#[async_trait::async_trait]
impl JobHandler for ScoringClient {
    async fn run(&self, job: &Job) -> Result<()> {
        let Job::ScoreArticle { request } = job else {
            anyhow::bail!("scoring client received {}", job.kind().as_str());
        };

        self.limiter.acquire().await;
        counter!("scoring_requests_total").increment(1);

        let raw = self.provider.complete(&request.prompt()).await?;
        let batch = parse_batch(&raw)?;
        validate_batch(&batch, &request.fingerprint)?;

        info!(
            target: "scoring",
            fingerprint = %request.fingerprint,
            entries = batch.articles.len(),
            provider = self.provider.name(),
            "scoring response validated"
        );
        self.queue.enqueue(Job::ApplyScores { batch });
        Ok(())
    }
}
