//! OpenAI-compatible speech synthesis.
//!
//! `POST {base}/audio/speech` returns the audio payload as a chunked body,
//! which is forwarded to the sink as it arrives. Fish Audio exposes the same
//! dialect behind its own base URL.

use crate::defaults;
use crate::error::{IntervoxError, Result};
use crate::provider::Provider;
use crate::provider::llm::openai::excerpt;
use crate::provider::tts::{SynthesisRequest, TtsProvider, check_api_key};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const FISHAUDIO_BASE_URL: &str = "https://api.fish.audio/v1";

pub struct OpenAiSpeech {
    name: String,
    base_url: String,
    model: String,
    default_voice: String,
    client: reqwest::Client,
}

impl OpenAiSpeech {
    pub fn openai(client: reqwest::Client) -> Self {
        Self {
            name: "openai".to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: defaults::OPENAI_TTS_MODEL.to_string(),
            default_voice: defaults::OPENAI_TTS_VOICE.to_string(),
            client,
        }
    }

    /// Fish Audio speaks the OpenAI speech dialect; voices are reference ids.
    pub fn fishaudio(client: reqwest::Client) -> Self {
        Self {
            name: "fishaudio".to_string(),
            base_url: FISHAUDIO_BASE_URL.to_string(),
            model: String::new(),
            default_voice: String::new(),
            client,
        }
    }

    fn endpoint(&self, req: &SynthesisRequest) -> String {
        let base = req
            .base_url
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.base_url);
        format!("{}/audio/speech", base.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct SpeechBody<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    voice: &'a str,
    response_format: &'a str,
    speed: f32,
    #[serde(skip_serializing_if = "str::is_empty")]
    instructions: &'a str,
}

impl Provider for OpenAiSpeech {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl TtsProvider for OpenAiSpeech {
    async fn synthesize(&self, req: &SynthesisRequest, sink: mpsc::Sender<Vec<u8>>) -> Result<()> {
        check_api_key(&self.name, req)?;

        let voice = if req.voice.is_empty() {
            &self.default_voice
        } else {
            &req.voice
        };
        let body = SpeechBody {
            model: &self.model,
            input: &req.text,
            voice,
            response_format: req.encoding.as_str(),
            speed: req.effective_speed(),
            instructions: &req.instructions,
        };

        let response = self
            .client
            .post(self.endpoint(req))
            .bearer_auth(&req.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| IntervoxError::Synthesis {
                provider: self.name.clone(),
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntervoxError::ProviderHttp {
                provider: self.name.clone(),
                status: status.as_u16(),
                body: excerpt(&body).to_string(),
            });
        }

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| IntervoxError::Synthesis {
                provider: self.name.clone(),
                message: format!("stream read failed: {e}"),
            })?;
            if !chunk.is_empty()
                && sink.send(chunk.to_vec()).await.is_err()
            {
                // Receiver gone — the turn was cancelled.
                return Ok(());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tts::AudioEncoding;

    #[tokio::test]
    async fn missing_api_key_fails_before_any_network_call() {
        let provider = OpenAiSpeech::openai(reqwest::Client::new());
        let (tx, _rx) = mpsc::channel(1);
        let req = SynthesisRequest {
            text: "hello".to_string(),
            ..SynthesisRequest::default()
        };

        let err = provider.synthesize(&req, tx).await.unwrap_err();
        assert!(matches!(err, IntervoxError::MissingApiKey { .. }));
    }

    #[test]
    fn endpoint_honors_base_url_override() {
        let provider = OpenAiSpeech::fishaudio(reqwest::Client::new());
        let req = SynthesisRequest {
            base_url: Some("https://fish.example.com/v1".to_string()),
            ..SynthesisRequest::default()
        };
        assert_eq!(
            provider.endpoint(&req),
            "https://fish.example.com/v1/audio/speech"
        );

        let req = SynthesisRequest::default();
        assert_eq!(
            provider.endpoint(&req),
            "https://api.fish.audio/v1/audio/speech"
        );
    }

    #[test]
    fn body_omits_empty_optional_fields() {
        let body = SpeechBody {
            model: "",
            input: "hi",
            voice: "",
            response_format: AudioEncoding::Mp3.as_str(),
            speed: 1.0,
            instructions: "",
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("model"));
        assert!(!json.contains("voice"));
        assert!(!json.contains("instructions"));
        assert!(json.contains(r#""response_format":"mp3""#));
    }

    #[test]
    fn providers_report_vendor_names() {
        let client = reqwest::Client::new();
        let openai = OpenAiSpeech::openai(client.clone());
        let fish = OpenAiSpeech::fishaudio(client);
        assert_eq!(openai.name(), "openai");
        assert_eq!(fish.name(), "fishaudio");
        assert!(openai.requires_api_key());
        assert!(fish.requires_api_key());
    }
}
