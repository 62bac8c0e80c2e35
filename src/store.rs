// src/store.rs
//! Article persistence seam. The pipeline only ever talks to the narrow
//! `ArticleStore` trait; the store's uniqueness constraint on `fingerprint`
//! and its per-row score update are the sole concurrency primitives in the
//! system. `MemoryStore` is the bundled implementation; durable backends
//! plug in behind the trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// One harvested article. `fingerprint` is the 32-hex MD5 of the title and
/// uniquely identifies the article; `score` stays `None` until the scoring
/// service has answered for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub fingerprint: String,
    pub title: String,
    pub link: String,
    pub source: String,
    pub source_url: String,
    pub source_image: String,
    pub description: String,
    pub image: Option<String>,
    pub author: Option<String>,
    pub publication_date: DateTime<Utc>,
    pub score: Option<i64>,
}

/// Result of a score write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transient backend failure; callers may retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Atomic create-if-absent keyed by fingerprint. `Ok(true)` when the
    /// article was inserted, `Ok(false)` when the fingerprint already exists.
    async fn create_if_absent(&self, article: &Article) -> Result<bool, StoreError>;

    /// All articles still waiting for a score.
    async fn find_unscored(&self) -> Result<Vec<Article>, StoreError>;

    /// Fingerprints of articles that already carry a score. Snapshot taken
    /// once per cycle and shared read-only across all fetches.
    async fn scored_fingerprints(&self) -> Result<HashSet<String>, StoreError>;

    /// Set the score for one article; one atomic unit per article.
    /// Re-applying the same score is a no-op in effect.
    async fn update_score(&self, fingerprint: &str, score: i64)
        -> Result<UpdateOutcome, StoreError>;
}

/// Mutex-guarded in-memory store keyed by fingerprint.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Article>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, fingerprint: &str) -> Option<Article> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .get(fingerprint)
            .cloned()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn create_if_absent(&self, article: &Article) -> Result<bool, StoreError> {
        let mut map = self.inner.lock().expect("store mutex poisoned");
        if map.contains_key(&article.fingerprint) {
            return Ok(false);
        }
        map.insert(article.fingerprint.clone(), article.clone());
        Ok(true)
    }

    async fn find_unscored(&self) -> Result<Vec<Article>, StoreError> {
        let map = self.inner.lock().expect("store mutex poisoned");
        Ok(map.values().filter(|a| a.score.is_none()).cloned().collect())
    }

    async fn scored_fingerprints(&self) -> Result<HashSet<String>, StoreError> {
        let map = self.inner.lock().expect("store mutex poisoned");
        Ok(map
            .values()
            .filter(|a| a.score.is_some())
            .map(|a| a.fingerprint.clone())
            .collect())
    }

    async fn update_score(
        &self,
        fingerprint: &str,
        score: i64,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut map = self.inner.lock().expect("store mutex poisoned");
        match map.get_mut(fingerprint) {
            Some(article) => {
                article.score = Some(score);
                Ok(UpdateOutcome::Applied)
            }
            None => Ok(UpdateOutcome::NotFound),
        }
    }
}
