// src/pipeline/mod.rs
//! The job handlers that make up one harvest cycle: fetch, insert, recover,
//! and the cycle scheduler that strings them together.

pub mod fetcher;
pub mod gate;
pub mod recovery;
pub mod scheduler;

pub use fetcher::FeedFetcher;
pub use gate::InsertionGate;
pub use recovery::RecoverySweep;
pub use scheduler::{CycleRunner, FeedFanout, RearmPolicy};
