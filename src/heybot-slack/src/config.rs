//! Configuration for the Slack app.
//!
//! [`ClientCredentials`] holds the app identity and secrets, loaded once at
//! process start and shared read-only. [`SlackAppConfig`] holds the
//! non-secret settings (store table, timeouts, offline mode) and can be
//! embedded in a serialized server configuration.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BotError, BotResult};

/// Environment variable names.
pub const ENV_CLIENT_ID: &str = "SLACK_APP_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SLACK_APP_CLIENT_SECRET";
pub const ENV_SIGNING_SECRET: &str = "SLACK_APP_SIGNING_SECRET";
pub const ENV_TABLE_NAME: &str = "ACCESS_TOKEN_TABLE";
pub const ENV_OFFLINE: &str = "IS_OFFLINE";
pub const ENV_API_BASE_URL: &str = "SLACK_API_BASE_URL";

/// Default Slack Web API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

/// Default table holding workspace credentials.
pub const DEFAULT_TABLE_NAME: &str = "access-tokens";

/// App identity and secrets issued by the platform.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Public app identifier.
    id: String,
    /// App secret used for the OAuth exchange.
    secret: SecretString,
    /// Shared secret used to sign inbound requests.
    signing_secret: SecretString,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .field("signing_secret", &"[REDACTED]")
            .finish()
    }
}

impl ClientCredentials {
    /// Create credentials from their parts.
    pub fn new(
        id: impl Into<String>,
        secret: impl Into<String>,
        signing_secret: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            secret: SecretString::new(secret.into().into()),
            signing_secret: SecretString::new(signing_secret.into().into()),
        }
    }

    /// Load credentials from environment variables.
    ///
    /// Reads:
    /// - `SLACK_APP_CLIENT_ID`
    /// - `SLACK_APP_CLIENT_SECRET`
    /// - `SLACK_APP_SIGNING_SECRET`
    ///
    /// Missing values load as empty strings. A missing signing secret is
    /// reported per request as a configuration error rather than here, so
    /// an offline deployment can run without any secrets.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load credentials through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key).unwrap_or_else(|| {
                warn!("{} is not set", key);
                String::new()
            })
        };

        Self::new(
            read(ENV_CLIENT_ID),
            read(ENV_CLIENT_SECRET),
            read(ENV_SIGNING_SECRET),
        )
    }

    /// Get the public app identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the app secret.
    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }

    /// Get the signing secret.
    pub fn signing_secret(&self) -> &str {
        self.signing_secret.expose_secret()
    }

    /// Validate that everything needed for a signed, installable app is set.
    pub fn validate(&self) -> BotResult<()> {
        if self.id.is_empty() {
            return Err(BotError::Configuration("Client ID is empty".to_string()));
        }
        if self.secret.expose_secret().is_empty() {
            return Err(BotError::Configuration(
                "Client secret is empty".to_string(),
            ));
        }
        if self.signing_secret.expose_secret().is_empty() {
            return Err(BotError::Configuration(
                "Signing secret is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Non-secret settings of the Slack app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackAppConfig {
    /// Table (namespace) holding workspace credentials.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Substitute request verification and the credential store with
    /// offline stand-ins.
    #[serde(default)]
    pub offline: bool,

    /// Slack Web API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Timeout for the OAuth exchange in seconds.
    #[serde(default = "default_exchange_timeout")]
    pub exchange_timeout_secs: u64,

    /// Timeout for a single store call in seconds.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,

    /// Maximum accepted clock skew of a signed request in seconds.
    #[serde(default = "default_replay_window")]
    pub replay_window_secs: u64,

    /// Serve the install and authorize pages without signature checks.
    /// These routes are opened by a browser, which cannot sign requests.
    #[serde(default)]
    pub unsigned_browser_routes: bool,
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_exchange_timeout() -> u64 {
    10
}

fn default_store_timeout() -> u64 {
    5
}

fn default_replay_window() -> u64 {
    300
}

impl Default for SlackAppConfig {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            offline: false,
            api_base_url: default_api_base_url(),
            exchange_timeout_secs: default_exchange_timeout(),
            store_timeout_secs: default_store_timeout(),
            replay_window_secs: default_replay_window(),
            unsigned_browser_routes: false,
        }
    }
}

impl SlackAppConfig {
    /// Apply overrides from environment variables.
    pub fn apply_env(&mut self) {
        self.apply_lookup(|key| std::env::var(key).ok());
    }

    /// Apply overrides through an arbitrary variable lookup.
    pub fn apply_lookup(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(table) = lookup(ENV_TABLE_NAME) {
            self.table_name = table;
        }
        if let Some(offline) = lookup(ENV_OFFLINE) {
            self.offline = offline.eq_ignore_ascii_case("true") || offline == "1";
        }
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = url.trim_end_matches('/').to_string();
        }
    }

    /// Get the exchange timeout as Duration.
    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_secs)
    }

    /// Get the store timeout as Duration.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}
