use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::transcribe::DEFAULT_LANGUAGE;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Web server settings
    pub server: ServerConfig,

    /// Transcript request settings
    pub transcript: TranscriptConfig,

    /// YouTube provider settings
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Answer failed fetches on the JSON API with 502 instead of 200
    pub strict_api_errors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Caption language requested from the provider
    pub default_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// User agent sent to youtube.com
    pub user_agent: String,

    /// Accept-Language header sent to youtube.com
    pub accept_language: String,

    /// Per-request timeout; no timeout when unset
    pub request_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            strict_api_errors: false,
        }
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            accept_language: "en-US".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub async fn load() -> Result<Self> {
        match Self::config_path() {
            Ok(config_path) if config_path.exists() => Self::load_from(&config_path),
            Ok(config_path) => {
                tracing::debug!(
                    "No config file at {}, using defaults",
                    config_path.display()
                );
                Ok(Self::default())
            }
            Err(e) => {
                tracing::debug!("{}, using default configuration", e);
                Ok(Self::default())
            }
        }
    }

    /// Load and validate configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-fetcher").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            anyhow::bail!("server.host must not be empty");
        }

        if self.server.port == 0 {
            anyhow::bail!("server.port must be a non-zero port number");
        }

        if self.transcript.default_language.trim().is_empty() {
            anyhow::bail!("transcript.default_language must not be empty");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen Address: {}:{}", self.server.host, self.server.port);
        println!("  Strict API Errors: {}", self.server.strict_api_errors);
        println!("  Default Language: {}", self.transcript.default_language);
        println!("  Accept-Language: {}", self.provider.accept_language);
        match self.provider.request_timeout_secs {
            Some(secs) => println!("  Request Timeout: {}s", secs),
            None => println!("  Request Timeout: none"),
        }
    }
}
