//! Error types for intervox.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntervoxError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Provider setup errors — fail before any network I/O
    #[error("No {kind} provider registered under '{name}'")]
    ProviderNotFound { kind: String, name: String },

    #[error("Missing API key for provider '{provider}'")]
    MissingApiKey { provider: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // Vendor transport errors
    #[error("Provider '{provider}' returned HTTP {status}: {body}")]
    ProviderHttp {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Stream from '{provider}' failed: {message}")]
    Stream { provider: String, message: String },

    #[error("Synthesis via '{provider}' failed: {message}")]
    Synthesis { provider: String, message: String },

    #[error("Transcription via '{provider}' failed: {message}")]
    Transcription { provider: String, message: String },

    // Interview lifecycle errors
    #[error("Interview {id} not found")]
    InterviewNotFound { id: i64 },

    #[error("Interview {id} has already ended")]
    InterviewEnded { id: i64 },

    #[error("Evaluation for interview {id} not found")]
    EvaluationNotFound { id: i64 },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl IntervoxError {
    /// True for errors that occur before any vendor network call is made.
    ///
    /// Setup errors are the caller's fault (bad name, missing credential) and
    /// are reported immediately instead of surfacing as stream events.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            IntervoxError::ProviderNotFound { .. }
                | IntervoxError::MissingApiKey { .. }
                | IntervoxError::InvalidRequest { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, IntervoxError>;
