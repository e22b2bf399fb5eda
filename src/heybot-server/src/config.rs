//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use heybot_slack::SlackAppConfig;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the listen address.
pub const ENV_LISTEN_ADDR: &str = "HEYBOT_LISTEN_ADDR";

/// Environment variable overriding the credential store directory.
pub const ENV_STORE_DIR: &str = "HEYBOT_STORE_DIR";

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Root directory of the file credential store.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,

    /// Slack app settings.
    #[serde(default)]
    pub slack: SlackAppConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_store_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".heybot")
        .join("store")
}

fn default_max_body_size() -> usize {
    1024 * 1024 // 1MB
}

fn default_request_timeout() -> u64 {
    30
}

fn default_shutdown_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            store_dir: default_store_dir(),
            max_body_size: default_max_body_size(),
            request_timeout: default_request_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            slack: SlackAppConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file, then apply Slack app overrides
    /// from the environment.
    pub fn load_with_env(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        Self::load_with_lookup(path, |key| std::env::var(key).ok())
    }

    /// Load configuration from a JSON file, then apply Slack app overrides
    /// through an arbitrary variable lookup.
    pub fn load_with_lookup(
        path: impl AsRef<std::path::Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.slack.apply_lookup(lookup);
        Ok(config)
    }

    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load defaults overridden through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup(ENV_LISTEN_ADDR) {
            config.listen_addr = addr;
        }

        if let Some(dir) = lookup(ENV_STORE_DIR) {
            config.store_dir = PathBuf::from(dir);
        }

        config.slack.apply_lookup(&lookup);
        config
    }

    /// Get request timeout as Duration.
    pub fn request_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}
