//! TOML configuration: gateway session, download folders, logging.
//!
//! Every section and field is optional; a missing file behaves like an empty one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LIVE_PORT: u16 = 7496;
pub const PAPER_PORT: u16 = 7498;

/// Debug output for this workspace only; HTTP and TLS crates stay at info.
pub const DEFAULT_LOG_FILTER: &str = "info,ibintra=debug,ibintra_core=debug";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub download: DownloadConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.host.trim().is_empty() {
            return Err(ConfigError::Invalid("gateway.host is empty".into()));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(ConfigError::Invalid("gateway.timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}

/// Live accounts are opened read-only; paper accounts on their own port.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountMode {
    #[default]
    Live,
    Paper,
}

impl AccountMode {
    pub fn default_port(&self) -> u16 {
        match self {
            AccountMode::Live => LIVE_PORT,
            AccountMode::Paper => PAPER_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub mode: AccountMode,
    /// Overrides the mode's default port.
    pub port: Option<u16>,
    pub client_id: u32,
    /// The local gateway serves a self-signed certificate.
    pub accept_invalid_certs: bool,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            mode: AccountMode::Live,
            port: None,
            client_id: 1,
            accept_invalid_certs: true,
            timeout_secs: 60,
        }
    }
}

impl GatewayConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.mode.default_port())
    }

    pub fn base_url(&self) -> String {
        format!("https://{}:{}/v1/api", self.host, self.port())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DownloadConfig {
    pub recent_dir: PathBuf,
    pub historical_dir: PathBuf,
    pub recent_days: i64,
    /// Put `download{YYYY-MM-DD}` in most-recent filenames.
    pub start_date_marker: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            recent_dir: PathBuf::from("data/recent"),
            historical_dir: PathBuf::from("data"),
            recent_days: 5,
            start_date_marker: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_FILTER.to_string(),
            file: Some(PathBuf::from("log/ibintra.log")),
        }
    }
}
