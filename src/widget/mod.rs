//! Floating chat widget.
//!
//! Each [`Widget`] owns its own state; the current [`WidgetView`] is published
//! on a `watch` channel so any renderer (DOM, terminal, tests) can draw it.

pub mod render;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

pub use render::{Patch, Renderer};
pub use transport::{ChatOutcome, ChatTransport, HttpTransport, TransportError};

use crate::message::ChatRequest;

pub const DEFAULT_API_BASE: &str = "https://ai-chatbot-server-db6g.onrender.com";
pub const DEFAULT_BUSINESS_ID: &str = "demo";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const TITLE: &str = "AI Receptionist";
pub const PLACEHOLDER: &str = "Type your message…";
pub const TYPING_TEXT: &str = "AI is typing…";
pub const SEND_LABEL: &str = "Send";
pub const SENDING_LABEL: &str = "Sending…";

pub const FALLBACK_REPLY: &str = "Sorry, I didn’t quite catch that.";
pub const TROUBLE_REPLY: &str = "Hmm, I’m having trouble. Please try again in a moment.";
pub const NETWORK_ERROR_REPLY: &str = "😕 Network issue: I couldn’t reach the server.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WidgetConfig {
    pub api_base: String,
    pub business_id: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            business_id: DEFAULT_BUSINESS_ID.to_string(),
        }
    }
}

impl WidgetConfig {
    pub fn new(api_base: impl Into<String>, business_id: impl Into<String>) -> Self {
        let api_base = api_base.into();
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            business_id: business_id.into(),
        }
    }

    /// Resolve from host-page attributes (`data-api`, `data-business-id`).
    /// Missing or blank attributes fall back to the defaults.
    pub fn from_attributes<F>(attr: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            attr(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self::new(
            get("data-api").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            get("data-business-id").unwrap_or_else(|| DEFAULT_BUSINESS_ID.to_string()),
        )
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.api_base)
    }
}

/// Everything a renderer needs to draw one widget instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WidgetView {
    pub open: bool,
    pub messages: Vec<Message>,
    /// Typing indicator, drawn after the last message.
    pub typing: bool,
    pub input: String,
    pub sending: bool,
    pub input_focused: bool,
}

impl WidgetView {
    pub fn input_disabled(&self) -> bool {
        self.sending
    }

    pub fn send_label(&self) -> &'static str {
        if self.sending { SENDING_LABEL } else { SEND_LABEL }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A request is already in flight; nothing happened.
    Busy,
    /// Input was empty after trimming; nothing happened.
    Empty,
    Replied,
    ServerError(u16),
    NetworkError,
}

impl SubmitOutcome {
    /// Whether a request went out.
    pub fn was_sent(&self) -> bool {
        !matches!(self, SubmitOutcome::Busy | SubmitOutcome::Empty)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyHandling {
    /// Not ours; the input keeps its default behaviour.
    Default,
    /// Enter: default suppressed and a submit attempted.
    Submitted(SubmitOutcome),
}

#[derive(Clone)]
pub struct Widget {
    id: Uuid,
    config: Arc<WidgetConfig>,
    transport: Arc<dyn ChatTransport>,
    state: Arc<watch::Sender<WidgetView>>,
}

impl std::fmt::Debug for Widget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Widget")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Widget {
    pub fn new(config: WidgetConfig, transport: Arc<dyn ChatTransport>) -> Self {
        let (state, _) = watch::channel(WidgetView::default());
        Self {
            id: Uuid::new_v4(),
            config: Arc::new(config),
            transport,
            state: Arc::new(state),
        }
    }

    /// Widget talking to the relay over HTTP.
    pub fn connect(config: WidgetConfig, timeout: Duration) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(&config, timeout)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn view(&self) -> WidgetView {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WidgetView> {
        self.state.subscribe()
    }

    /// Open or close the chat card. Returns the new open state.
    pub fn toggle(&self) -> bool {
        let mut open = false;
        self.state.send_modify(|view| {
            view.open = !view.open;
            open = view.open;
        });
        open
    }

    /// Replace the input text. Ignored while the input is disabled.
    pub fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_if_modified(|view| {
            if view.sending {
                return false;
            }
            view.input = text;
            true
        });
    }

    pub async fn click_send(&self) -> SubmitOutcome {
        self.submit().await
    }

    pub async fn key_down(&self, key: &str) -> KeyHandling {
        if key == "Enter" {
            KeyHandling::Submitted(self.submit().await)
        } else {
            KeyHandling::Default
        }
    }

    /// Send the current input, if there is any and nothing else is in flight.
    pub async fn submit(&self) -> SubmitOutcome {
        let mut skipped = SubmitOutcome::Empty;
        let mut text = None;
        self.state.send_if_modified(|view| {
            if view.sending {
                skipped = SubmitOutcome::Busy;
                return false;
            }
            let trimmed = view.input.trim();
            if trimmed.is_empty() {
                return false;
            }
            let trimmed = trimmed.to_string();
            view.messages.push(Message::user(trimmed.clone()));
            view.input.clear();
            view.input_focused = true;
            view.sending = true;
            view.typing = true;
            text = Some(trimmed);
            true
        });
        let Some(text) = text else {
            return skipped;
        };

        let mut in_flight = InFlight {
            state: self.state.as_ref(),
            finished: false,
        };

        let request = ChatRequest::new(text, self.config.business_id.clone());
        let (reply, outcome) = match self.transport.send(&request).await {
            Ok(ChatOutcome::Replied(reply)) => (
                reply
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| FALLBACK_REPLY.to_string()),
                SubmitOutcome::Replied,
            ),
            Ok(ChatOutcome::Rejected(status)) => {
                tracing::warn!(widget = %self.id, status, "relay rejected chat request");
                (TROUBLE_REPLY.to_string(), SubmitOutcome::ServerError(status))
            }
            Err(err) => {
                tracing::error!(widget = %self.id, error = %err, "chat request failed");
                (NETWORK_ERROR_REPLY.to_string(), SubmitOutcome::NetworkError)
            }
        };

        in_flight.finish(Some(Message::bot(reply)));
        outcome
    }
}

/// Returns the widget to idle even if the submit future is dropped mid-request.
struct InFlight<'a> {
    state: &'a watch::Sender<WidgetView>,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(&mut self, reply: Option<Message>) {
        self.finished = true;
        self.state.send_modify(|view| {
            view.typing = false;
            view.messages.extend(reply);
            view.sending = false;
            view.input_focused = true;
        });
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(None);
        }
    }
}
