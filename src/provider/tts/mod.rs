//! Speech synthesis.
//!
//! Adapters stream synthesized audio into a byte sink as it arrives from the
//! vendor, so playback can begin before synthesis completes. `Ok(())` means
//! the full payload reached the sink; any error means the unit failed as a
//! whole and its audio must be discarded.

pub mod edgetts;
pub mod elevenlabs;
pub mod openai;

use crate::error::{IntervoxError, Result};
use crate::provider::Provider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Audio container/codec for synthesized speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    #[default]
    Mp3,
    Pcm,
    Opus,
}

impl AudioEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => "mp3",
            AudioEncoding::Pcm => "pcm",
            AudioEncoding::Opus => "opus",
        }
    }
}

/// A single synthesis request.
///
/// Zero-valued knobs mean "use the adapter default": empty `voice`,
/// `speed <= 0.0`, `sample_rate == 0`.
#[derive(Debug, Clone, Default)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub language: String,
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    pub speed: f32,
    pub instructions: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

impl SynthesisRequest {
    pub(crate) fn effective_speed(&self) -> f32 {
        if self.speed <= 0.0 {
            crate::defaults::TTS_SPEED
        } else {
            self.speed
        }
    }
}

/// A speech synthesis vendor.
#[async_trait]
pub trait TtsProvider: Provider {
    /// Whether requests must carry an API key.
    ///
    /// Free vendors (EdgeTTS) return `false`; for everyone else a missing
    /// key is a setup error raised before any network call.
    fn requires_api_key(&self) -> bool {
        true
    }

    /// Synthesize `req.text`, streaming audio bytes into `sink`.
    async fn synthesize(&self, req: &SynthesisRequest, sink: mpsc::Sender<Vec<u8>>) -> Result<()>;
}

#[async_trait]
impl<T: TtsProvider + ?Sized> TtsProvider for std::sync::Arc<T> {
    fn requires_api_key(&self) -> bool {
        (**self).requires_api_key()
    }

    async fn synthesize(&self, req: &SynthesisRequest, sink: mpsc::Sender<Vec<u8>>) -> Result<()> {
        (**self).synthesize(req, sink).await
    }
}

pub(crate) fn check_api_key(provider: &str, req: &SynthesisRequest) -> Result<()> {
    if req.api_key.is_empty() {
        return Err(IntervoxError::MissingApiKey {
            provider: provider.to_string(),
        });
    }
    Ok(())
}

/// Deterministic synthesis stub for tests and wiring checks.
///
/// "Audio" is the unit text's bytes, so consumers can assert ordering by
/// content. Per-call latencies and failure triggers let tests model slow
/// vendors and partial failures.
pub struct MockTtsProvider {
    name: String,
    latencies: std::sync::Mutex<std::collections::VecDeque<std::time::Duration>>,
    fail_on: Option<String>,
}

impl MockTtsProvider {
    pub fn new() -> Self {
        Self {
            name: "mock-tts".to_string(),
            latencies: std::sync::Mutex::new(std::collections::VecDeque::new()),
            fail_on: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Latencies applied to calls in arrival order; later calls run
    /// immediately once the queue is exhausted.
    pub fn with_latencies<I>(self, latencies: I) -> Self
    where
        I: IntoIterator<Item = std::time::Duration>,
    {
        {
            let mut queue = self
                .latencies
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            queue.extend(latencies);
        }
        self
    }

    /// Fail any request whose text contains `needle`.
    pub fn fail_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }
}

impl Default for MockTtsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for MockTtsProvider {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl TtsProvider for MockTtsProvider {
    fn requires_api_key(&self) -> bool {
        false
    }

    async fn synthesize(&self, req: &SynthesisRequest, sink: mpsc::Sender<Vec<u8>>) -> Result<()> {
        let latency = {
            let mut queue = self
                .latencies
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            queue.pop_front()
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(needle) = &self.fail_on
            && req.text.contains(needle)
        {
            return Err(IntervoxError::Synthesis {
                provider: self.name.clone(),
                message: format!("mock failure on '{needle}'"),
            });
        }

        sink.send(req.text.clone().into_bytes())
            .await
            .map_err(|_| IntervoxError::Synthesis {
                provider: self.name.clone(),
                message: "sink closed".to_string(),
            })?;
        Ok(())
    }
}
