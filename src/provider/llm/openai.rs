//! OpenAI-compatible chat streaming.
//!
//! Covers OpenAI itself plus every vendor speaking the same
//! `/chat/completions` SSE dialect: DeepSeek natively, Gemini through
//! Google's OpenAI-compatibility endpoint.

use crate::defaults;
use crate::error::{IntervoxError, Result};
use crate::provider::Provider;
use crate::provider::llm::sse::SseLineBuffer;
use crate::provider::llm::{ChatRequest, LlmProvider, StreamEvent};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Chat adapter for any OpenAI-compatible endpoint.
pub struct OpenAiCompatible {
    name: String,
    base_url: String,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatible {
    pub fn openai(client: reqwest::Client) -> Self {
        Self::custom("openai", OPENAI_BASE_URL, defaults::OPENAI_CHAT_MODEL, client)
    }

    pub fn deepseek(client: reqwest::Client) -> Self {
        Self::custom(
            "deepseek",
            DEEPSEEK_BASE_URL,
            defaults::DEEPSEEK_CHAT_MODEL,
            client,
        )
    }

    /// Gemini, via Google's OpenAI-compatibility endpoint.
    pub fn gemini(client: reqwest::Client) -> Self {
        Self::custom(
            "gemini",
            GEMINI_BASE_URL,
            defaults::GEMINI_CHAT_MODEL,
            client,
        )
    }

    pub fn custom(
        name: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            default_model: default_model.into(),
            client,
        }
    }

    fn endpoint(&self, req: &ChatRequest) -> String {
        let base = req
            .base_url
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.base_url);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [crate::provider::llm::ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl Provider for OpenAiCompatible {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatible {
    async fn chat_stream(&self, req: ChatRequest) -> Result<mpsc::Receiver<StreamEvent>> {
        if req.api_key.is_empty() {
            return Err(IntervoxError::MissingApiKey {
                provider: self.name.clone(),
            });
        }

        let model = if req.model.is_empty() {
            self.default_model.clone()
        } else {
            req.model.clone()
        };
        let url = self.endpoint(&req);
        let provider = self.name.clone();
        let client = self.client.clone();

        let (tx, rx) = mpsc::channel(defaults::STREAM_EVENT_BUFFER);

        tokio::spawn(async move {
            let body = ChatBody {
                model: &model,
                messages: &req.messages,
                max_tokens: req.effective_max_tokens(),
                temperature: req.effective_temperature(),
                stream: true,
            };

            let response = match client
                .post(&url)
                .bearer_auth(&req.api_key)
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
                        "{provider} returned HTTP {}: {}",
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
                    if payload == "[DONE]" {
                        let _ = tx.send(StreamEvent::Done).await;
                        return;
                    }
                    let parsed: ChatChunk = match serde_json::from_str(&payload) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            debug!(%provider, error = %e, "skipping unparseable SSE payload");
                            continue;
                        }
                    };
                    if let Some(content) = parsed
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content)
                        && !content.is_empty()
                        && tx.send(StreamEvent::Content(content)).await.is_err()
                    {
                        return;
                    }
                }
            }

            // Body ended without a [DONE] sentinel; treat as a normal finish.
            let _ = tx.send(StreamEvent::Done).await;
        });

        Ok(rx)
    }
}

/// Trim vendor error bodies so log lines and events stay readable.
pub(crate) fn excerpt(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    body[..end].trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::llm::ChatMessage;

    fn provider() -> OpenAiCompatible {
        OpenAiCompatible::openai(reqwest::Client::new())
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_network_call() {
        let req = ChatRequest {
            messages: vec![ChatMessage::user("hi")],
            ..ChatRequest::default()
        };
        let err = provider().chat_stream(req).await.unwrap_err();
        assert!(matches!(err, IntervoxError::MissingApiKey { .. }));
    }

    #[test]
    fn endpoint_uses_default_base_url() {
        let req = ChatRequest::default();
        assert_eq!(
            provider().endpoint(&req),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn endpoint_honors_request_override() {
        let req = ChatRequest {
            base_url: Some("https://proxy.example.com/v1/".to_string()),
            ..ChatRequest::default()
        };
        assert_eq!(
            provider().endpoint(&req),
            "https://proxy.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn compat_constructors_report_vendor_names() {
        let client = reqwest::Client::new();
        assert_eq!(OpenAiCompatible::openai(client.clone()).name(), "openai");
        assert_eq!(
            OpenAiCompatible::deepseek(client.clone()).name(),
            "deepseek"
        );
        assert_eq!(OpenAiCompatible::gemini(client).name(), "gemini");
    }

    #[test]
    fn gemini_routes_through_compatibility_endpoint() {
        let provider = OpenAiCompatible::gemini(reqwest::Client::new());
        let req = ChatRequest::default();
        assert!(
            provider
                .endpoint(&req)
                .starts_with("https://generativelanguage.googleapis.com/v1beta/openai")
        );
    }

    #[test]
    fn delta_chunk_parses_content() {
        let payload = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        let parsed: ChatChunk = serde_json::from_str(payload).unwrap();
        assert_eq!(
            parsed.choices[0].delta.content.as_deref(),
            Some("Hel")
        );
    }

    #[test]
    fn delta_chunk_without_content_is_valid() {
        let payload = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        let parsed: ChatChunk = serde_json::from_str(payload).unwrap();
        assert!(parsed.choices[0].delta.content.is_none());
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long).len(), 200);
        assert_eq!(excerpt("short"), "short");
    }
}
