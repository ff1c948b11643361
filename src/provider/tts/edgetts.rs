//! Microsoft Edge read-aloud synthesis (unofficial, no credential).
//!
//! Speaks the Edge browser's WebSocket protocol: a `speech.config` text
//! message selects the output format, an SSML message carries the text, and
//! the server answers with binary frames whose payload starts after a
//! 2-byte big-endian header-length prefix. A text frame containing
//! `Path:turn.end` closes the turn.

use crate::error::{IntervoxError, Result};
use crate::provider::Provider;
use crate::provider::tts::{AudioEncoding, SynthesisRequest, TtsProvider};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const EDGE_WS_URL: &str =
    "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1";
const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";

pub struct EdgeTtsProvider {
    ws_url: String,
}

impl EdgeTtsProvider {
    pub fn new() -> Self {
        Self {
            ws_url: EDGE_WS_URL.to_string(),
        }
    }
}

impl Default for EdgeTtsProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn pick_voice(req: &SynthesisRequest) -> &str {
    if !req.voice.is_empty() {
        return &req.voice;
    }
    if req.language.starts_with("zh") {
        crate::defaults::EDGETTS_VOICE
    } else {
        "en-US-AriaNeural"
    }
}

fn output_format(encoding: AudioEncoding) -> &'static str {
    match encoding {
        AudioEncoding::Mp3 => "audio-24khz-48kbitrate-mono-mp3",
        AudioEncoding::Pcm => "raw-24khz-16bit-mono-pcm",
        AudioEncoding::Opus => "webm-24khz-16bit-mono-opus",
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}

fn build_ssml(req: &SynthesisRequest) -> String {
    let language = if req.language.is_empty() {
        "en-US"
    } else {
        &req.language
    };
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{}'>\
         <voice name='{}'>{}</voice></speak>",
        language,
        pick_voice(req),
        escape_xml(&req.text)
    )
}

/// Strip the binary frame's header, returning the audio payload.
///
/// Layout: 2-byte big-endian header length, the header itself, then audio.
/// Frames too short to carry audio yield `None`.
fn audio_payload(frame: &[u8]) -> Option<&[u8]> {
    if frame.len() < 2 {
        return None;
    }
    let header_len = usize::from(frame[0]) << 8 | usize::from(frame[1]);
    if frame.len() <= 2 + header_len {
        return None;
    }
    Some(&frame[2 + header_len..])
}

impl Provider for EdgeTtsProvider {
    fn name(&self) -> &str {
        "edgetts"
    }
}

#[async_trait]
impl TtsProvider for EdgeTtsProvider {
    fn requires_api_key(&self) -> bool {
        false
    }

    async fn synthesize(&self, req: &SynthesisRequest, sink: mpsc::Sender<Vec<u8>>) -> Result<()> {
        let connect_id = uuid::Uuid::new_v4().simple().to_string();
        let url = format!(
            "{}?TrustedClientToken={}&ConnectionId={}",
            self.ws_url, TRUSTED_CLIENT_TOKEN, connect_id
        );

        let (mut ws, _) = connect_async(&url)
            .await
            .map_err(|e| IntervoxError::Synthesis {
                provider: "edgetts".to_string(),
                message: format!("websocket dial failed: {e}"),
            })?;

        let config = format!(
            "Content-Type:application/json; charset=utf-8\r\nPath:speech.config\r\n\r\n\
             {{\"context\":{{\"synthesis\":{{\"audio\":{{\"metadataoptions\":\
             {{\"sentenceBoundaryEnabled\":\"false\",\"wordBoundaryEnabled\":\"false\"}},\
             \"outputFormat\":\"{}\"}}}}}}}}",
            output_format(req.encoding)
        );
        ws.send(Message::Text(config.into()))
            .await
            .map_err(|e| IntervoxError::Synthesis {
                provider: "edgetts".to_string(),
                message: format!("send config failed: {e}"),
            })?;

        let request_id = uuid::Uuid::new_v4().simple().to_string();
        let ssml_message = format!(
            "X-RequestId:{}\r\nContent-Type:application/ssml+xml\r\nPath:ssml\r\n\r\n{}",
            request_id,
            build_ssml(req)
        );
        ws.send(Message::Text(ssml_message.into()))
            .await
            .map_err(|e| IntervoxError::Synthesis {
                provider: "edgetts".to_string(),
                message: format!("send ssml failed: {e}"),
            })?;

        while let Some(frame) = ws.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                // Server-side close ends the audio; anything else is a failure.
                Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => break,
                Err(e) => {
                    return Err(IntervoxError::Synthesis {
                        provider: "edgetts".to_string(),
                        message: format!("read failed: {e}"),
                    });
                }
            };

            match frame {
                Message::Binary(data) => {
                    if let Some(audio) = audio_payload(&data)
                        && !audio.is_empty()
                        && sink.send(audio.to_vec()).await.is_err()
                    {
                        // Receiver gone — the turn was cancelled.
                        return Ok(());
                    }
                }
                Message::Text(text) => {
                    if text.contains("Path:turn.end") {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        let _ = ws.close(None).await;
        Ok(())
    }
}
