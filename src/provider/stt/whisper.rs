//! Whisper transcription over the OpenAI audio API.

use crate::defaults;
use crate::error::{IntervoxError, Result};
use crate::provider::Provider;
use crate::provider::llm::openai::excerpt;
use crate::provider::stt::{SttProvider, Transcript, TranscriptRequest};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub struct WhisperProvider {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl WhisperProvider {
    pub fn new(client: reqwest::Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    fn endpoint(req: &TranscriptRequest) -> String {
        let base = req
            .base_url
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(OPENAI_BASE_URL);
        format!("{}/audio/transcriptions", base.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

impl Provider for WhisperProvider {
    fn name(&self) -> &str {
        "whisper"
    }
}

#[async_trait]
impl SttProvider for WhisperProvider {
    async fn transcribe(&self, req: TranscriptRequest) -> Result<Transcript> {
        if req.api_key.is_empty() {
            return Err(IntervoxError::MissingApiKey {
                provider: "whisper".to_string(),
            });
        }
        if req.audio.is_empty() {
            return Err(IntervoxError::InvalidRequest {
                message: "empty audio payload".to_string(),
            });
        }

        let model = if req.model.is_empty() {
            defaults::WHISPER_MODEL.to_string()
        } else {
            req.model.clone()
        };
        let language = if req.language.is_empty() {
            defaults::WHISPER_LANGUAGE.to_string()
        } else {
            req.language.clone()
        };
        let filename = if req.filename.is_empty() {
            "audio.wav".to_string()
        } else {
            req.filename.clone()
        };
        let url = Self::endpoint(&req);

        let part = reqwest::multipart::Part::bytes(req.audio)
            .file_name(filename)
            .mime_str("application/octet-stream")
            .map_err(|e| IntervoxError::Transcription {
                provider: "whisper".to_string(),
                message: format!("multipart build failed: {e}"),
            })?;
        let form = reqwest::multipart::Form::new()
            .text("model", model)
            .text("language", language)
            .part("file", part);

        let response = self
            .client
            .post(url)
            .bearer_auth(&req.api_key)
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| IntervoxError::Transcription {
                provider: "whisper".to_string(),
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntervoxError::ProviderHttp {
                provider: "whisper".to_string(),
                status: status.as_u16(),
                body: excerpt(&body).to_string(),
            });
        }

        let parsed: TranscriptionResponse =
            response
                .json()
                .await
                .map_err(|e| IntervoxError::Transcription {
                    provider: "whisper".to_string(),
                    message: format!("invalid response body: {e}"),
                })?;

        Ok(Transcript {
            text: parsed.text,
            language: parsed.language.unwrap_or_default(),
            duration_secs: parsed.duration.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> WhisperProvider {
        WhisperProvider::new(reqwest::Client::new(), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_network_call() {
        let req = TranscriptRequest {
            audio: vec![0u8; 4],
            ..TranscriptRequest::default()
        };
        let err = provider().transcribe(req).await.unwrap_err();
        assert!(matches!(err, IntervoxError::MissingApiKey { .. }));
    }

    #[tokio::test]
    async fn empty_audio_is_rejected() {
        let req = TranscriptRequest {
            api_key: "sk-123".to_string(),
            ..TranscriptRequest::default()
        };
        let err = provider().transcribe(req).await.unwrap_err();
        assert!(matches!(err, IntervoxError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn unreachable_endpoint_surfaces_as_transcription_error() {
        // Gets past validation and the multipart build; fails at transport.
        let req = TranscriptRequest {
            audio: vec![0u8; 4],
            api_key: "sk-123".to_string(),
            base_url: Some("http://127.0.0.1:9".to_string()),
            ..TranscriptRequest::default()
        };
        let err = provider().transcribe(req).await.unwrap_err();
        assert!(matches!(err, IntervoxError::Transcription { .. }));
    }

    #[test]
    fn endpoint_honors_base_url_override() {
        let req = TranscriptRequest {
            base_url: Some("https://stt.example.com/v1/".to_string()),
            ..TranscriptRequest::default()
        };
        assert_eq!(
            WhisperProvider::endpoint(&req),
            "https://stt.example.com/v1/audio/transcriptions"
        );
    }

    #[test]
    fn response_parses_optional_fields() {
        let full: TranscriptionResponse =
            serde_json::from_str(r#"{"text":"hi","language":"en","duration":1.5}"#).unwrap();
        assert_eq!(full.text, "hi");
        assert_eq!(full.language.as_deref(), Some("en"));
        assert_eq!(full.duration, Some(1.5));

        let minimal: TranscriptionResponse = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert!(minimal.language.is_none());
        assert!(minimal.duration.is_none());
    }
}
