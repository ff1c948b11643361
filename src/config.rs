use crate::error::IntervoxError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub providers: ProviderConfig,
    pub limits: LimitConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Default provider selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub default_llm: String,
    pub default_tts: String,
    pub default_stt: String,
}

/// Vendor call limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub synthesis_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default_llm: crate::defaults::DEFAULT_LLM_PROVIDER.to_string(),
            default_tts: "edgetts".to_string(),
            default_stt: "whisper".to_string(),
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: crate::defaults::CONNECT_TIMEOUT_SECS,
            request_timeout_secs: crate::defaults::REQUEST_TIMEOUT_SECS,
            synthesis_concurrency: crate::defaults::SYNTHESIS_CONCURRENCY,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing, contains invalid TOML, or
    /// carries out-of-range values. Missing fields use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Err(IntervoxError::ConfigFileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if matches!(
                    e.downcast_ref::<IntervoxError>(),
                    Some(IntervoxError::ConfigFileNotFound { .. })
                ) {
                    Ok(Self::default())
                } else {
                    Err(e.context(format!("Failed to load config from {}", path.display())))
                }
            }
        }
    }

    fn validate(&self) -> Result<(), IntervoxError> {
        if self.limits.synthesis_concurrency == 0 {
            return Err(IntervoxError::ConfigInvalidValue {
                key: "limits.synthesis_concurrency".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - INTERVOX_HOST → server.host
    /// - INTERVOX_PORT → server.port
    /// - INTERVOX_LLM → providers.default_llm
    /// - INTERVOX_TTS → providers.default_tts
    /// - INTERVOX_STT → providers.default_stt
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("INTERVOX_HOST")
            && !host.is_empty()
        {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("INTERVOX_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }

        if let Ok(llm) = std::env::var("INTERVOX_LLM")
            && !llm.is_empty()
        {
            self.providers.default_llm = llm;
        }

        if let Ok(tts) = std::env::var("INTERVOX_TTS")
            && !tts.is_empty()
        {
            self.providers.default_tts = tts;
        }

        if let Ok(stt) = std::env::var("INTERVOX_STT")
            && !stt.is_empty()
        {
            self.providers.default_stt = stt;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/intervox/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("intervox")
            .join("config.toml")
    }
}
