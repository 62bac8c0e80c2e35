// src/scoring/ingestor.rs
//! Applies validated score batches to the store, one atomic update per
//! article. A score for a fingerprint the store does not know is logged and
//! skipped; a store failure makes the whole batch re-run under its
//! fixed-delay policy, which is safe because re-applying an already-written
//! score is a no-op.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use metrics::counter;
use tracing::{error, info, warn};

use crate::queue::{Job, JobHandler};
use crate::store::{ArticleStore, UpdateOutcome};

pub struct ScoreIngestor {
    store: Arc<dyn ArticleStore>,
}

impl ScoreIngestor {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl JobHandler for ScoreIngestor {
    async fn run(&self, job: &Job) -> Result<()> {
        let Job::ApplyScores { batch } = job else {
            anyhow::bail!("score ingestor received {}", job.kind().as_str());
        };

        let mut failed: Vec<String> = Vec::new();
        for entry in &batch.articles {
            match self.store.update_score(&entry.id, entry.score).await {
                Ok(UpdateOutcome::Applied) => {
                    counter!("scores_applied_total").increment(1);
                    info!(
                        target: "scoring",
                        fingerprint = %entry.id,
                        score = entry.score,
                        "score applied"
                    );
                }
                Ok(UpdateOutcome::NotFound) => {
                    counter!("scores_orphaned_total").increment(1);
                    warn!(
                        target: "scoring",
                        fingerprint = %entry.id,
                        "score arrived for unknown article, skipped"
                    );
                }
                Err(err) => {
                    error!(
                        target: "scoring",
                        fingerprint = %entry.id,
                        error = %err,
                        "score update failed"
                    );
                    failed.push(entry.id.clone());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(
                "{} score update(s) failed: {}",
                failed.len(),
                failed.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::response::{ScoreBatch, ScoredEntry};
    use crate::store::{Article, MemoryStore, StoreError};
    use chrono::Utc;
    use std::collections::HashSet;

    /// Delegates to a real memory store but fails score writes for one
    /// poisoned fingerprint.
    struct FlakyStore {
        inner: MemoryStore,
        failing: String,
    }

    #[async_trait::async_trait]
    impl ArticleStore for FlakyStore {
        async fn create_if_absent(&self, article: &Article) -> Result<bool, StoreError> {
            self.inner.create_if_absent(article).await
        }

        async fn find_unscored(&self) -> Result<Vec<Article>, StoreError> {
            self.inner.find_unscored().await
        }

        async fn scored_fingerprints(&self) -> Result<HashSet<String>, StoreError> {
            self.inner.scored_fingerprints().await
        }

        async fn update_score(
            &self,
            fingerprint: &str,
            score: i64,
        ) -> Result<UpdateOutcome, StoreError> {
            if fingerprint == self.failing {
                return Err(StoreError::Unavailable("backend down".into()));
            }
            self.inner.update_score(fingerprint, score).await
        }
    }

    fn article(title: &str) -> Article {
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

    fn apply_job(entries: Vec<ScoredEntry>) -> Job {
        Job::ApplyScores {
            batch: ScoreBatch { articles: entries },
        }
    }

    #[tokio::test]
    async fn applies_scores_and_skips_unknown_fingerprints() {
        let store = Arc::new(MemoryStore::new());
        let known = article("Known story");
        store.create_if_absent(&known).await.unwrap();

        let ingestor = ScoreIngestor::new(store.clone());
        let job = apply_job(vec![
            ScoredEntry {
                id: known.fingerprint.clone(),
                score: 73,
            },
            ScoredEntry {
                id: "ffffffffffffffffffffffffffffffff".into(),
                score: 50,
            },
        ]);

        // the orphaned entry is skipped, not an error
        ingestor.run(&job).await.unwrap();
        assert_eq!(store.get(&known.fingerprint).unwrap().score, Some(73));
    }

    #[tokio::test]
    async fn reapplying_a_batch_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        let known = article("Re-run story");
        store.create_if_absent(&known).await.unwrap();

        let ingestor = ScoreIngestor::new(store.clone());
        let job = apply_job(vec![ScoredEntry {
            id: known.fingerprint.clone(),
            score: 12,
        }]);
        ingestor.run(&job).await.unwrap();
        ingestor.run(&job).await.unwrap();
        assert_eq!(store.get(&known.fingerprint).unwrap().score, Some(12));
    }

    #[tokio::test]
    async fn store_failure_applies_healthy_siblings_then_reports_it() {
        let broken = article("Backend-breaking story");
        let healthy = article("Healthy sibling");
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            failing: broken.fingerprint.clone(),
        });
        store.inner.create_if_absent(&broken).await.unwrap();
        store.inner.create_if_absent(&healthy).await.unwrap();

        let ingestor = ScoreIngestor::new(store.clone());
        // broken first, so the healthy sibling is applied after the failure
        let job = apply_job(vec![
            ScoredEntry {
                id: broken.fingerprint.clone(),
                score: 70,
            },
            ScoredEntry {
                id: healthy.fingerprint.clone(),
                score: 55,
            },
        ]);

        let err = ingestor.run(&job).await.unwrap_err();
        assert_eq!(
            store.inner.get(&healthy.fingerprint).unwrap().score,
            Some(55)
        );
        assert_eq!(store.inner.get(&broken.fingerprint).unwrap().score, None);
        // the batch error names exactly the entries left unapplied
        assert!(err.to_string().contains(&broken.fingerprint));
        assert!(!err.to_string().contains(&healthy.fingerprint));
    }
}
