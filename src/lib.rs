// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod feed;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod scoring;
pub mod store;

// ---- Re-exports for stable public API ----
// Router construction: `feedrank::api::create_router` or `feedrank::create_router`
pub use crate::api::create_router;
pub use crate::config::AppConfig;
pub use crate::queue::{Job, JobQueue, ShutdownSignal};
pub use crate::store::{Article, ArticleStore, MemoryStore};
