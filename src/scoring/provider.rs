// src/scoring/provider.rs
//! Scoring service abstraction: one trait, one real chat-completions
//! implementation, one scripted stand-in for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[async_trait::async_trait]
pub trait ScoreProvider: Send + Sync {
    /// Submits one prompt and returns the raw text of the reply.
    async fn complete(&self, prompt: &str) -> Result<String>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// OpenAI-style chat-completions provider. The request pins `temperature: 0`
/// and a fixed system message; the reply's first choice is returned verbatim
/// for the response layer to parse.
pub struct ChatCompletionsProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsProvider {
    pub fn new(endpoint: String, api_key: String, model: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("feedrank/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            http,
            endpoint,
            api_key,
            model,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.scoring_endpoint.clone(),
            config.api_key.clone(),
            config.scoring_model.clone(),
            Duration::from_secs(config.scoring_timeout_secs),
        )
    }
}

#[async_trait::async_trait]
impl ScoreProvider for ChatCompletionsProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(anyhow!("scoring api key is not configured"));
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: "You are a helpful assistant.",
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("sending scoring request")?
            .error_for_status()
            .context("scoring service rejected request")?;

        let body: Resp = resp.json().await.context("reading scoring response")?;
        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("scoring response had no choices"))
    }

    fn name(&self) -> &'static str {
        "chat-completions"
    }
}

/// Test provider that replays a queued script of replies and failures,
/// recording every prompt it was given.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, body: impl Into<String>) {
        self.replies
            .lock()
            .expect("replies poisoned")
            .push_back(Ok(body.into()));
    }

    pub fn push_failure(&self, reason: impl Into<String>) {
        self.replies
            .lock()
            .expect("replies poisoned")
            .push_back(Err(reason.into()));
    }

    pub fn seen_prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts poisoned").clone()
    }
}

#[async_trait::async_trait]
impl ScoreProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("prompts poisoned")
            .push(prompt.to_string());
        match self
            .replies
            .lock()
            .expect("replies poisoned")
            .pop_front()
        {
            Some(Ok(body)) => Ok(body),
            Some(Err(reason)) => Err(anyhow!(reason)),
            None => Err(anyhow!("scripted provider ran out of replies")),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
