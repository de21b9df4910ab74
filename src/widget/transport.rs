// src/widget/transport.rs
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::WidgetConfig;
use crate::message::ChatRequest;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not reach the relay: {0}")]
    Http(#[from] reqwest::Error),

    #[error("relay answered with a non-JSON body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// What the relay said, once it said anything at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatOutcome {
    /// 2xx with a JSON body; `reply` is absent when the body has no string `reply` field.
    Replied(Option<String>),
    /// Any non-2xx status.
    Rejected(u16),
}

// Browser fetch futures are not `Send`.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChatOutcome, TransportError>;
}

/// Posts chat requests to `{api_base}/chat` over HTTP.
pub struct HttpTransport {
    http: reqwest::Client,
    chat_url: String,
}

impl HttpTransport {
    pub fn new(config: &WidgetConfig, timeout: Duration) -> Result<Self, TransportError> {
        #[cfg(not(target_arch = "wasm32"))]
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        // The browser's fetch owns the request lifetime there.
        #[cfg(target_arch = "wasm32")]
        let http = {
            let _ = timeout;
            reqwest::Client::builder().build()?
        };
        Ok(Self {
            http,
            chat_url: config.chat_url(),
        })
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatOutcome, TransportError> {
        let response = self.http.post(&self.chat_url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Ok(ChatOutcome::Rejected(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        let reply = body
            .get("reply")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        Ok(ChatOutcome::Replied(reply))
    }
}
