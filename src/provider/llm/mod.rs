//! Chat completion streaming.
//!
//! Every LLM vendor is normalized to the same shape: the caller hands over a
//! [`ChatRequest`] and receives a channel of [`StreamEvent`]s. Setup
//! problems (missing credential) surface as an immediate `Err`; anything
//! that happens after the network call starts arrives as stream events, with
//! exactly one terminal event (`Done` or `Error`) closing every stream.

pub mod anthropic;
pub mod openai;
pub mod sse;

use crate::error::{IntervoxError, Result};
use crate::provider::Provider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Speaker role in a chat transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A chat completion request.
///
/// Zero-valued knobs mean "use the adapter default": empty `model`,
/// `max_tokens == 0`, `temperature <= 0.0`.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub api_key: String,
    pub base_url: Option<String>,
}

impl ChatRequest {
    pub(crate) fn effective_max_tokens(&self) -> u32 {
        if self.max_tokens == 0 {
            crate::defaults::MAX_TOKENS
        } else {
            self.max_tokens
        }
    }

    pub(crate) fn effective_temperature(&self) -> f32 {
        if self.temperature <= 0.0 {
            crate::defaults::DIALOGUE_TEMPERATURE
        } else {
            self.temperature
        }
    }
}

/// One event on a chat stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A content delta. May be empty; order is the generation order.
    Content(String),
    /// The stream failed mid-flight. Nothing follows, no automatic retry.
    Error(String),
    /// Normal end of stream. Nothing follows.
    Done,
}

impl StreamEvent {
    /// True for `Done` and `Error` — the events that close a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }
}

/// A streaming chat vendor.
#[async_trait]
pub trait LlmProvider: Provider {
    /// Start a streaming completion.
    ///
    /// Returns the receiving end of the event stream. The stream carries
    /// zero or more `Content` events followed by exactly one terminal event.
    async fn chat_stream(&self, req: ChatRequest) -> Result<mpsc::Receiver<StreamEvent>>;
}

#[async_trait]
impl<T: LlmProvider + ?Sized> LlmProvider for std::sync::Arc<T> {
    async fn chat_stream(&self, req: ChatRequest) -> Result<mpsc::Receiver<StreamEvent>> {
        (**self).chat_stream(req).await
    }
}

/// Scripted chat provider for tests and wiring checks.
///
/// Emits its configured fragments as `Content` events (optionally spaced by
/// a delay), then a single terminal event.
pub struct MockLlmProvider {
    name: String,
    fragments: Vec<String>,
    delay: Option<std::time::Duration>,
    fail_after: Option<usize>,
    require_key: bool,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            name: "mock-llm".to_string(),
            fragments: Vec::new(),
            delay: None,
            fail_after: None,
            require_key: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Content deltas to emit, in order.
    pub fn with_fragments<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fragments = fragments.into_iter().map(Into::into).collect();
        self
    }

    /// Pause between fragments, to exercise consumers under latency.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Emit a terminal `Error` after this many fragments instead of `Done`.
    pub fn fail_after(mut self, fragments: usize) -> Self {
        self.fail_after = Some(fragments);
        self
    }

    /// Reject requests without an API key, like real vendors do.
    pub fn require_api_key(mut self) -> Self {
        self.require_key = true;
        self
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for MockLlmProvider {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn chat_stream(&self, req: ChatRequest) -> Result<mpsc::Receiver<StreamEvent>> {
        if self.require_key && req.api_key.is_empty() {
            return Err(IntervoxError::MissingApiKey {
                provider: self.name.clone(),
            });
        }

        let (tx, rx) = mpsc::channel(crate::defaults::STREAM_EVENT_BUFFER);
        let fragments = self.fragments.clone();
        let delay = self.delay;
        let fail_after = self.fail_after;

        tokio::spawn(async move {
            for (i, fragment) in fragments.into_iter().enumerate() {
                if fail_after == Some(i) {
                    let _ = tx.send(StreamEvent::Error("mock failure".to_string())).await;
                    return;
                }
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(StreamEvent::Content(fragment)).await.is_err() {
                    return;
                }
            }
            let terminal = match fail_after {
                Some(_) => StreamEvent::Error("mock failure".to_string()),
                None => StreamEvent::Done,
            };
            let _ = tx.send(terminal).await;
        });

        Ok(rx)
    }
}
