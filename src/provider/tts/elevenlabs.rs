//! ElevenLabs streaming synthesis.
//!
//! `POST /v1/text-to-speech/{voice_id}/stream` with the `xi-api-key` header;
//! the response body is the audio stream itself.

use crate::defaults;
use crate::error::{IntervoxError, Result};
use crate::provider::Provider;
use crate::provider::llm::openai::excerpt;
use crate::provider::tts::{SynthesisRequest, TtsProvider, check_api_key};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Default voice id ("Rachel"), used when the request names none.
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

pub struct ElevenLabsProvider {
    client: reqwest::Client,
}

impl ElevenLabsProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn endpoint(req: &SynthesisRequest) -> String {
        let base = req
            .base_url
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(ELEVENLABS_BASE_URL);
        let voice = if req.voice.is_empty() {
            DEFAULT_VOICE_ID
        } else {
            &req.voice
        };
        format!(
            "{}/text-to-speech/{}/stream",
            base.trim_end_matches('/'),
            voice
        )
    }
}

#[derive(Serialize)]
struct SynthesisBody<'a> {
    text: &'a str,
    model_id: &'a str,
}

impl Provider for ElevenLabsProvider {
    fn name(&self) -> &str {
        "elevenlabs"
    }
}

#[async_trait]
impl TtsProvider for ElevenLabsProvider {
    async fn synthesize(&self, req: &SynthesisRequest, sink: mpsc::Sender<Vec<u8>>) -> Result<()> {
        check_api_key("elevenlabs", req)?;

        let body = SynthesisBody {
            text: &req.text,
            model_id: defaults::ELEVENLABS_TTS_MODEL,
        };

        let response = self
            .client
            .post(Self::endpoint(req))
            .header("xi-api-key", &req.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| IntervoxError::Synthesis {
                provider: "elevenlabs".to_string(),
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntervoxError::ProviderHttp {
                provider: "elevenlabs".to_string(),
                status: status.as_u16(),
                body: excerpt(&body).to_string(),
            });
        }

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| IntervoxError::Synthesis {
                provider: "elevenlabs".to_string(),
                message: format!("stream read failed: {e}"),
            })?;
            if !chunk.is_empty()
                && sink.send(chunk.to_vec()).await.is_err()
            {
                return Ok(());
            }
        }

        Ok(())
    }
}
