//! Vendor provider contracts and registries.
//!
//! Each capability (chat streaming, speech synthesis, transcription) is a
//! trait with one adapter per vendor. Adapters normalize wildly different
//! wire protocols (SSE, chunked HTTP bodies, WebSocket framing) into uniform
//! channel-based streams. Credentials arrive per-request (bring your own
//! key); adapters hold no secrets.

pub mod llm;
pub mod registry;
pub mod stt;
pub mod tts;

use crate::config::LimitConfig;
use crate::error::{IntervoxError, Result};
use std::time::Duration;

/// Common surface shared by every vendor adapter.
pub trait Provider: Send + Sync {
    /// Stable registry key, e.g. `"openai"` or `"edgetts"`.
    fn name(&self) -> &str;
}

impl<T: Provider + ?Sized> Provider for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the shared HTTP client used by vendor adapters.
///
/// Only a connect timeout is applied here. Whole-request deadlines would kill
/// long-lived streaming responses, so non-streaming callers add their own.
pub fn http_client(limits: &LimitConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(limits.connect_timeout_secs))
        .build()
        .map_err(|e| IntervoxError::Other(format!("Failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_client_builds_with_default_limits() {
        let client = http_client(&LimitConfig::default());
        assert!(client.is_ok());
    }
}
