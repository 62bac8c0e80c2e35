// src/scoring/response.rs
//! Parsing and validation of scoring-service replies.
//!
//! The service answers with JSON, frequently wrapped in a Markdown code
//! fence. The contract is `{"articles": [{"id": <fingerprint>, "score":
//! <0..=100>}]}`; a reply without an `articles` array is an empty batch, not
//! an error. Any `id` that does not echo the submitted fingerprint, or any
//! score outside the range, fails validation and takes the same retry path
//! as a transport error.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub id: String,
    pub score: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBatch {
    #[serde(default)]
    pub articles: Vec<ScoredEntry>,
}

/// Strips surrounding backticks and one leading `json` language tag, then
/// trims whitespace. Mirrors how the replies actually arrive
/// (```` ```json\n{..}\n``` ````).
pub fn strip_code_fences(raw: &str) -> String {
    let stripped = raw.trim_matches('`').replacen("json\n", "", 1);
    stripped.trim().to_string()
}

pub fn parse_batch(raw: &str) -> Result<ScoreBatch> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(&cleaned).context("parsing scoring response json")
}

/// Every entry must echo the submitted fingerprint as `id` and carry a score
/// in 0..=100. An empty batch is vacuously valid.
pub fn validate_batch(batch: &ScoreBatch, fingerprint: &str) -> Result<()> {
    for entry in &batch.articles {
        if entry.id != fingerprint {
            return Err(anyhow!(
                "mismatched id in scoring response: expected {fingerprint}, got {}",
                entry.id
            ));
        }
        if !(0..=100).contains(&entry.score) {
            return Err(anyhow!(
                "score {} out of range for {}",
                entry.score,
                entry.id
            ));
        }
    }
    Ok(())
}
