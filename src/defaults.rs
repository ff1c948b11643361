//! Default configuration constants for intervox.
//!
//! This module provides shared constants used across providers and the
//! interview engine to ensure consistency and eliminate duplication.

/// Default LLM provider when neither the interview nor the user settings
/// name one.
pub const DEFAULT_LLM_PROVIDER: &str = "openai";

/// Default token budget for a single chat completion.
///
/// 4096 tokens comfortably covers a spoken interview answer while bounding
/// vendor cost on runaway generations.
pub const MAX_TOKENS: u32 = 4096;

/// Sampling temperature for dialogue turns.
///
/// 0.7 keeps follow-up questions varied without drifting off the
/// interview script.
pub const DIALOGUE_TEMPERATURE: f32 = 0.7;

/// Sampling temperature for evaluation generation.
///
/// Evaluations should be consistent across re-runs, so they sample cooler
/// than dialogue.
pub const EVALUATION_TEMPERATURE: f32 = 0.3;

/// Default OpenAI chat model.
pub const OPENAI_CHAT_MODEL: &str = "gpt-4o";

/// Default Anthropic chat model.
pub const ANTHROPIC_CHAT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default DeepSeek chat model.
pub const DEEPSEEK_CHAT_MODEL: &str = "deepseek-chat";

/// Default Gemini chat model, served through Google's OpenAI-compatible
/// endpoint.
pub const GEMINI_CHAT_MODEL: &str = "gemini-2.0-flash";

/// Default OpenAI speech synthesis model.
pub const OPENAI_TTS_MODEL: &str = "gpt-4o-mini-tts";

/// Default OpenAI synthesis voice.
pub const OPENAI_TTS_VOICE: &str = "alloy";

/// Default ElevenLabs synthesis model.
pub const ELEVENLABS_TTS_MODEL: &str = "eleven_multilingual_v2";

/// Default EdgeTTS neural voice.
pub const EDGETTS_VOICE: &str = "zh-CN-XiaoxiaoNeural";

/// Default Whisper transcription model.
pub const WHISPER_MODEL: &str = "whisper-1";

/// Default transcription language hint.
pub const WHISPER_LANGUAGE: &str = "zh";

/// Playback speed multiplier applied to every synthesis request.
pub const TTS_SPEED: f32 = 1.0;

/// Buffered capacity of a chat event stream.
///
/// Matches typical vendor delta cadence; a full buffer applies backpressure
/// to the network read rather than dropping events.
pub const STREAM_EVENT_BUFFER: usize = 32;

/// Maximum sentences synthesized concurrently within one turn.
///
/// Bounds vendor connection fan-out; delivery order is restored downstream
/// regardless of this value.
pub const SYNTHESIS_CONCURRENCY: usize = 4;

/// Connect timeout for vendor HTTP clients, in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Whole-request timeout for non-streaming vendor calls, in seconds.
///
/// Streaming calls deliberately carry no total deadline; they are bounded by
/// turn cancellation instead.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluation_samples_cooler_than_dialogue() {
        assert!(EVALUATION_TEMPERATURE < DIALOGUE_TEMPERATURE);
    }

    #[test]
    fn synthesis_concurrency_is_nonzero() {
        assert!(SYNTHESIS_CONCURRENCY >= 1);
    }
}
