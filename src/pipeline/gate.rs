// src/pipeline/gate.rs
//! Insertion gate. The store's uniqueness constraint is the only concurrency
//! primitive: create-if-absent decides winner and loser when two cycles race
//! on the same fingerprint. A freshly created article immediately gets a
//! scoring request; a conflict is routine, not an error.

use std::sync::Arc;

use anyhow::Result;
use metrics::counter;
use tracing::{debug, error, info};

use crate::queue::{Job, JobHandler, JobQueue};
use crate::scoring::ScoringRequest;
use crate::store::ArticleStore;

pub struct InsertionGate {
    store: Arc<dyn ArticleStore>,
    queue: JobQueue,
    rubric: String,
}

impl InsertionGate {
    pub fn new(store: Arc<dyn ArticleStore>, queue: JobQueue, rubric: String) -> Self {
        Self {
            store,
            queue,
            rubric,
        }
    }
}

#[async_trait::async_trait]
impl JobHandler for InsertionGate {
    async fn run(&self, job: &Job) -> Result<()> {
        let Job::InsertArticles { articles } = job else {
            anyhow::bail!("insertion gate received {}", job.kind().as_str());
        };

        for article in articles {
            match self.store.create_if_absent(article).await {
                Ok(true) => {
                    counter!("articles_inserted_total").increment(1);
                    info!(
                        target: "pipeline",
                        fingerprint = %article.fingerprint,
                        title = %article.title,
                        "article inserted"
                    );
                    self.queue.enqueue(Job::ScoreArticle {
                        request: ScoringRequest {
                            title: article.title.clone(),
                            fingerprint: article.fingerprint.clone(),
                            rubric_prompt: self.rubric.clone(),
                        },
                    });
                }
                Ok(false) => {
                    counter!("articles_conflicted_total").increment(1);
                    debug!(
                        target: "pipeline",
                        fingerprint = %article.fingerprint,
                        "article already stored, skipped"
                    );
                }
                Err(err) => {
                    // skip this article only, keep the rest of the batch
                    error!(
                        target: "pipeline",
                        fingerprint = %article.fingerprint,
                        error = %err,
                        "insert failed, article skipped"
                    );
                }
            }
        }
        Ok(())
    }
}
