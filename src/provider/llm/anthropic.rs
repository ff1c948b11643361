//! Anthropic messages API streaming.
//!
//! Anthropic's SSE dialect differs from the OpenAI one in two ways that
//! matter here: the system prompt travels in a dedicated top-level field
//! rather than the message list, and stream framing uses typed events
//! (`content_block_delta`, `message_stop`, `error`) instead of a `[DONE]`
//! sentinel.

use crate::defaults;
use crate::error::{IntervoxError, Result};
use crate::provider::Provider;
use crate::provider::llm::openai::excerpt;
use crate::provider::llm::sse::SseLineBuffer;
use crate::provider::llm::{ChatMessage, ChatRequest, LlmProvider, Role, StreamEvent};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn endpoint(req: &ChatRequest) -> String {
        let base = req
            .base_url
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(ANTHROPIC_BASE_URL);
        format!("{}/messages", base.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct MessagesBody {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// Split the system prompt out of the transcript, as the API requires.
/// Multiple system messages are joined with blank lines.
fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<ChatMessage>) {
    let mut system_parts = Vec::new();
    let mut rest = Vec::new();
    for message in messages {
        match message.role {
            Role::System => system_parts.push(message.content.clone()),
            _ => rest.push(message.clone()),
        }
    }
    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, rest)
}

#[derive(Deserialize)]
struct SseEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<SseDelta>,
    #[serde(default)]
    error: Option<SseError>,
}

#[derive(Deserialize)]
struct SseDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct SseError {
    #[serde(default)]
    message: String,
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat_stream(&self, req: ChatRequest) -> Result<mpsc::Receiver<StreamEvent>> {
        if req.api_key.is_empty() {
            return Err(IntervoxError::MissingApiKey {
                provider: "anthropic".to_string(),
            });
        }

        let model = if req.model.is_empty() {
            defaults::ANTHROPIC_CHAT_MODEL.to_string()
        } else {
            req.model.clone()
        };
        let url = Self::endpoint(&req);
        let (system, messages) = split_system(&req.messages);
        let client = self.client.clone();

        let (tx, rx) = mpsc::channel(defaults::STREAM_EVENT_BUFFER);

        tokio::spawn(async move {
            let body = MessagesBody {
                model,
                max_tokens: req.effective_max_tokens(),
                temperature: req.effective_temperature(),
                system,
                messages,
                stream: true,
            };

            let response = match client
                .post(&url)
                .header("x-api-key", &req.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    let _ = tx
                        .send(StreamEvent::Error(format!("request failed: {e}")))
                        .await;
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let _ = tx
                    .send(StreamEvent::Error(format!(
                        "anthropic returned HTTP {}: {}",
                        status.as_u16(),
                        excerpt(&body)
                    )))
                    .await;
                return;
            }

            let mut lines = SseLineBuffer::new();
            let mut stream = response.bytes_stream();

            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error(format!("stream read failed: {e}")))
                            .await;
                        return;
                    }
                };

                for payload in lines.push(&chunk) {
                    let event: SseEvent = match serde_json::from_str(&payload) {
                        Ok(event) => event,
                        Err(e) => {
                            debug!(error = %e, "skipping unparseable SSE payload");
                            continue;
                        }
                    };
                    match event.kind.as_str() {
                        "content_block_delta" => {
                            if let Some(text) = event.delta.and_then(|d| d.text)
                                && !text.is_empty()
                                && tx.send(StreamEvent::Content(text)).await.is_err()
                            {
                                return;
                            }
                        }
                        "message_stop" => {
                            let _ = tx.send(StreamEvent::Done).await;
                            return;
                        }
                        "error" => {
                            let message = event
                                .error
                                .map(|e| e.message)
                                .filter(|m| !m.is_empty())
                                .unwrap_or_else(|| "unknown stream error".to_string());
                            let _ = tx.send(StreamEvent::Error(message)).await;
                            return;
                        }
                        // message_start, content_block_start/stop, ping, ...
                        _ => {}
                    }
                }
            }

            let _ = tx.send(StreamEvent::Done).await;
        });

        Ok(rx)
    }
}
