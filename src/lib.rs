//! intervox - Real-time dialogue orchestration for an AI interviewer
//!
//! Streams LLM replies to a WebSocket client while synthesizing speech for
//! each finished sentence in parallel, delivering audio strictly in sentence
//! order.

// Error handling discipline: propagate, don't panic.
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod config;
pub mod defaults;
pub mod error;
pub mod interview;
pub mod pipeline;
pub mod provider;
pub mod server;
pub mod session;
pub mod store;

// Core seams (vendor adapters plug in here)
pub use provider::Provider;
pub use provider::llm::{ChatMessage, ChatRequest, LlmProvider, StreamEvent};
pub use provider::registry::Registry;
pub use provider::stt::SttProvider;
pub use provider::tts::{SynthesisRequest, TtsProvider};

// Pipeline
pub use pipeline::{AudioChunk, SentenceSegmenter, SpeakableUnit, SynthesisPipeline};

// Orchestration
pub use interview::InterviewEngine;
pub use store::{InterviewStore, UserSettings};

// Error handling
pub use error::{IntervoxError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.2.0+abc1234"` when git hash is available, `"0.2.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
