// src/pipeline/recovery.rs
//! Recovery sweep: every stored article still missing a score gets its
//! scoring request re-issued. This is the only path back for requests lost
//! to abandoned retries or a crash between insertion and dispatch. Safe to
//! run any number of times; duplicate in-flight requests resolve to the same
//! idempotent score write.

use std::sync::Arc;

use anyhow::Result;
use metrics::counter;
use tracing::info;

use crate::queue::{Job, JobHandler, JobQueue};
use crate::scoring::ScoringRequest;
use crate::store::ArticleStore;

pub struct RecoverySweep {
    store: Arc<dyn ArticleStore>,
    queue: JobQueue,
    rubric: String,
}

impl RecoverySweep {
    pub fn new(store: Arc<dyn ArticleStore>, queue: JobQueue, rubric: String) -> Self {
        Self {
            store,
            queue,
            rubric,
        }
    }
}

#[async_trait::async_trait]
impl JobHandler for RecoverySweep {
    async fn run(&self, job: &Job) -> Result<()> {
        let Job::RecoveryScan = job else {
            anyhow::bail!("recovery sweep received {}", job.kind().as_str());
        };

        let unscored = self.store.find_unscored().await?;
        counter!("recovery_requeued_total").increment(unscored.len() as u64);
        info!(target: "pipeline", unscored = unscored.len(), "recovery sweep");

        for article in unscored {
            self.queue.enqueue(Job::ScoreArticle {
                request: ScoringRequest {
                    title: article.title,
                    fingerprint: article.fingerprint,
                    rubric_prompt: self.rubric.clone(),
                },
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Article, MemoryStore, UpdateOutcome};
    use chrono::Utc;

    fn sample(title: &str) -> Article {
        Article {
            fingerprint: format!("{:x}", md5::compute(title.as_bytes())),
            title: title.to_string(),
            link: "https://example.test/a".to_string(),
            source: "Example".to_string(),
            source_url: "https://example.test/".to_string(),
            source_image: String::new(),
            description: String::new(),
            image: None,
            author: None,
            publication_date: Utc::now(),
            score: None,
        }
    }

    #[tokio::test]
    async fn requeues_only_unscored_articles() {
        let store = Arc::new(MemoryStore::new());
        let scored = sample("Already ranked");
        let pending = sample("Still waiting");
        store.create_if_absent(&scored).await.unwrap();
        store.create_if_absent(&pending).await.unwrap();
        assert_eq!(
            store.update_score(&scored.fingerprint, 90).await.unwrap(),
            UpdateOutcome::Applied
        );

        let (queue, mut rx) = crate::queue::channel();
        let sweep = RecoverySweep::new(store, queue, "R".into());
        sweep.run(&Job::RecoveryScan).await.unwrap();

        let envelope = rx.try_recv().unwrap();
        let Job::ScoreArticle { request } = envelope.job else {
            panic!("expected a scoring request");
        };
        assert_eq!(request.fingerprint, pending.fingerprint);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_store_sweeps_cleanly() {
        let (queue, mut rx) = crate::queue::channel();
        let sweep = RecoverySweep::new(Arc::new(MemoryStore::new()), queue, String::new());
        sweep.run(&Job::RecoveryScan).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
