// src/config.rs
//! Runtime configuration, loaded once in `main` and passed into each
//! component at construction. No global settings object.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_CONFIG_PATH: &str = "FEEDRANK_CONFIG_PATH";
const ENV_API_KEY: &str = "SCORING_API_KEY";
const DEFAULT_CONFIG_PATH: &str = "config/feedrank.toml";

/// Fallback rubric when no rubric file is configured. The wording is
/// deployment-specific; only the response contract matters to the pipeline:
/// a JSON dictionary named "articles" holding {"id", "score"} objects.
const DEFAULT_RUBRIC: &str = "Score the article title listed after \"TITLES:\" from 0 to 100 by its \
significance and create a JSON dictionary named \"articles\" with a list of objects containing \
\"id\" and \"score\". The title is between the first pair of backticks and the 32-character hash \
code \"id\" is between the second pair. Exclude the title from the output; respond with the JSON \
only.\nTITLES:";

fn default_opml_path() -> PathBuf {
    PathBuf::from("config/feeds.opml")
}
fn default_rubric_path() -> PathBuf {
    PathBuf::from("config/rubric.txt")
}
fn default_cutoff_hours() -> i64 {
    800
}
fn default_requests_per_minute() -> u32 {
    250
}
fn default_worker_count() -> usize {
    4
}
fn default_fetch_timeout_secs() -> u64 {
    10
}
fn default_scoring_timeout_secs() -> u64 {
    30
}
fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "gpt-4-1106-preview".to_string()
}
fn default_api_key() -> String {
    // "env" means: resolve from SCORING_API_KEY at load time.
    "env".to_string()
}
fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// OPML subscription list read at the start of every cycle.
    #[serde(default = "default_opml_path")]
    pub opml_path: PathBuf,
    /// Scoring rubric text file; missing file falls back to a built-in rubric.
    #[serde(default = "default_rubric_path")]
    pub rubric_path: PathBuf,
    /// Entries older than `now - cutoff_hours` are dropped at ingestion.
    #[serde(default = "default_cutoff_hours")]
    pub cutoff_hours: i64,
    /// Global ceiling for scoring calls; the per-worker budget is
    /// `requests_per_minute / worker_count`.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Concurrent job slots in the dispatcher pool.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_scoring_timeout_secs")]
    pub scoring_timeout_secs: u64,
    /// Seconds between cycle completions; 0 re-arms immediately, leaving
    /// pacing entirely to queue/worker throughput.
    #[serde(default)]
    pub cycle_interval_secs: u64,
    /// Seed the first cycle at startup.
    #[serde(default = "default_true")]
    pub autostart: bool,
    #[serde(default = "default_endpoint")]
    pub scoring_endpoint: String,
    #[serde(default = "default_model")]
    pub scoring_model: String,
    /// "env" resolves from SCORING_API_KEY; anything else is used verbatim.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Serde defaults double as the programmatic defaults.
        toml::from_str("").expect("empty config deserializes")
    }
}

impl AppConfig {
    /// Load from an explicit TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg: AppConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config from {}", path.display()))?;
        cfg.resolve();
        Ok(cfg)
    }

    /// Load using env + fallbacks:
    /// 1) $FEEDRANK_CONFIG_PATH
    /// 2) config/feedrank.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            anyhow::bail!("FEEDRANK_CONFIG_PATH points to non-existent path");
        }
        let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Self::load_from(&fallback);
        }
        let mut cfg = AppConfig::default();
        cfg.resolve();
        Ok(cfg)
    }

    /// Resolve the "env" api-key indirection and clamp nonsense values.
    fn resolve(&mut self) {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = env::var(ENV_API_KEY).unwrap_or_default();
        }
        if self.worker_count == 0 {
            self.worker_count = 1;
        }
        if self.requests_per_minute == 0 {
            self.requests_per_minute = 1;
        }
        if self.cutoff_hours <= 0 {
            self.cutoff_hours = default_cutoff_hours();
        }
    }

    /// Per-worker scoring budget, requests per minute. Never zero.
    pub fn scoring_budget_per_worker(&self) -> u32 {
        (self.requests_per_minute / self.worker_count.max(1) as u32).max(1)
    }

    /// Rubric text: configured file if readable, built-in fallback otherwise.
    pub fn rubric(&self) -> String {
        match fs::read_to_string(&self.rubric_path) {
            Ok(s) if !s.trim().is_empty() => s,
            _ => DEFAULT_RUBRIC.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.cutoff_hours, 800);
        assert_eq!(cfg.requests_per_minute, 250);
        assert_eq!(cfg.fetch_timeout_secs, 10);
        assert_eq!(cfg.scoring_timeout_secs, 30);
        assert_eq!(cfg.cycle_interval_secs, 0);
        assert!(cfg.autostart);
    }

    #[test]
    fn per_worker_budget_divides_ceiling_and_never_hits_zero() {
        let mut cfg = AppConfig::default();
        cfg.requests_per_minute = 250;
        cfg.worker_count = 5;
        assert_eq!(cfg.scoring_budget_per_worker(), 50);

        cfg.requests_per_minute = 3;
        cfg.worker_count = 10;
        assert_eq!(cfg.scoring_budget_per_worker(), 1);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            "cutoff_hours = 99\nworker_count = 2\napi_key = \"sk-test\"\ncycle_interval_secs = 30"
        )
        .unwrap();
        let cfg = AppConfig::load_from(f.path()).unwrap();
        assert_eq!(cfg.cutoff_hours, 99);
        assert_eq!(cfg.worker_count, 2);
        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.cycle_interval_secs, 30);
        // untouched fields keep their defaults
        assert_eq!(cfg.requests_per_minute, 250);
    }

    #[serial_test::serial]
    #[test]
    fn env_key_indirection_resolves() {
        std::env::set_var(ENV_API_KEY, "sk-from-env");
        let mut cfg = AppConfig::default();
        cfg.resolve();
        assert_eq!(cfg.api_key, "sk-from-env");
        std::env::remove_var(ENV_API_KEY);
    }

    #[test]
    fn rubric_falls_back_when_file_missing() {
        let mut cfg = AppConfig::default();
        cfg.rubric_path = PathBuf::from("does/not/exist.txt");
        let rubric = cfg.rubric();
        assert!(rubric.contains("\"articles\""));
        assert!(rubric.ends_with("TITLES:"));
    }
}
