//! Configuration management for the Nylas CLI

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::Provider;
use crate::APP_NAME;

/// Nylas API region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Us,
    Eu,
}

impl Region {
    /// API base URL for this region
    pub fn base_url(&self) -> &'static str {
        match self {
            Region::Us => "https://api.us.nylas.com",
            Region::Eu => "https://api.eu.nylas.com",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Eu => "eu",
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::Us
    }
}

/// Main configuration structure, stored as YAML at
/// `~/.config/nylas-cli/config.yaml`. Missing fields get defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API region (us or eu)
    #[serde(default)]
    pub region: Region,

    /// Port the local OAuth callback listener binds on
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,

    /// Poll interval for watch-style commands (seconds)
    #[serde(default = "default_watch_interval")]
    pub watch_interval_secs: u64,

    /// Provider used when `auth login` is run without --provider
    #[serde(default)]
    pub default_provider: Provider,

    /// API client settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: Region::default(),
            callback_port: default_callback_port(),
            watch_interval_secs: default_watch_interval(),
            default_provider: Provider::default(),
            api: ApiConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// API client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Override the region base URL (mainly for testing against mocks)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Client-side rate limit (requests per second)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_second: u32,

    /// Retries for idempotent requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout(),
            rate_limit_per_second: default_rate_limit(),
            retry_count: default_retry_count(),
        }
    }
}

/// Output format for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Text
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default = "default_true")]
    pub color: bool,

    /// Timezone used when rendering timestamps (e.g. "America/New_York")
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            color: true,
            timezone: default_timezone(),
        }
    }
}

// Default value functions
fn default_callback_port() -> u16 {
    8080
}

fn default_watch_interval() -> u64 {
    300
}

fn default_timeout() -> u64 {
    30
}

fn default_rate_limit() -> u32 {
    10
}

fn default_retry_count() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    std::env::var("TZ").unwrap_or_else(|_| "UTC".to_string())
}

/// Get the config directory (XDG: ~/.config/nylas-cli)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(APP_NAME)
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = config_dir().join("config.yaml");
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path, merging defaults for
    /// any missing field. A missing file yields the full defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = serde_yaml_bw::from_str(&contents)?;
            info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            info!("No config file found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = config_dir().join("config.yaml");
        self.save_to(&config_path)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents =
            serde_yaml_bw::to_string(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Effective API base URL (override wins over the region default)
    pub fn api_base_url(&self) -> String {
        self.api
            .base_url
            .clone()
            .unwrap_or_else(|| self.region.base_url().to_string())
    }
}
