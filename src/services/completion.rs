// src/services/completion.rs
//! Client for the external chat completion API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RelayConfig;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request timed out after {0:?}")]
    Timeout(Duration),

    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode completion response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Turns a single user prompt into reply text.
///
/// `Ok(None)` means the upstream answered but produced no usable text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Option<String>, CompletionError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [CompletionMessage<'a>; 1],
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        })
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, CompletionError> {
        Self::new(
            &config.openai_base_url,
            &config.openai_api_key,
            &config.model,
            config.upstream_timeout,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, prompt: &str) -> Result<Option<String>, CompletionError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: [CompletionMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.is_empty()))
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<Option<String>, CompletionError> {
        match tokio::time::timeout(self.timeout, self.send(prompt)).await {
            Ok(result) => result.map_err(|e| match e {
                CompletionError::Http(err) if err.is_timeout() => {
                    CompletionError::Timeout(self.timeout)
                }
                other => other,
            }),
            Err(_) => Err(CompletionError::Timeout(self.timeout)),
        }
    }
}
