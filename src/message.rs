// src/message.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "businessId", default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, business_id: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            business_id: Some(business_id.into()),
        }
    }

    /// The message with surrounding whitespace removed, or `None` when nothing is left.
    pub fn trimmed_message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// Milliseconds since the Unix epoch.
    pub ts: u64,
}
