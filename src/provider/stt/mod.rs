//! Speech transcription.

pub mod whisper;

use crate::error::{IntervoxError, Result};
use crate::provider::Provider;
use async_trait::async_trait;

/// A transcription request carrying the full audio payload.
#[derive(Debug, Clone, Default)]
pub struct TranscriptRequest {
    pub audio: Vec<u8>,
    pub filename: String,
    pub language: String,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

/// A finished transcription.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize)]
pub struct Transcript {
    pub text: String,
    pub language: String,
    pub duration_secs: f64,
}

/// A speech-to-text vendor.
#[async_trait]
pub trait SttProvider: Provider {
    async fn transcribe(&self, req: TranscriptRequest) -> Result<Transcript>;
}

#[async_trait]
impl<T: SttProvider + ?Sized> SttProvider for std::sync::Arc<T> {
    async fn transcribe(&self, req: TranscriptRequest) -> Result<Transcript> {
        (**self).transcribe(req).await
    }
}

/// Fixed-output transcriber for tests and wiring checks.
pub struct MockSttProvider {
    name: String,
    text: String,
}

impl MockSttProvider {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            name: "mock-stt".to_string(),
            text: text.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Provider for MockSttProvider {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl SttProvider for MockSttProvider {
    async fn transcribe(&self, req: TranscriptRequest) -> Result<Transcript> {
        if req.audio.is_empty() {
            return Err(IntervoxError::InvalidRequest {
                message: "empty audio payload".to_string(),
            });
        }
        Ok(Transcript {
            text: self.text.clone(),
            language: req.language,
            duration_secs: 0.0,
        })
    }
}
