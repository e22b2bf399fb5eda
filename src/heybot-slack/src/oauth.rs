//! OAuth authorization-code exchange for workspace installation.
//!
//! The platform redirects the installing user to the authorize route with a
//! short-lived `code`. The code is exchanged once, via
//! `GET {api}/oauth.access?client_id=..&client_secret=..&code=..`, for a
//! payload carrying the workspace's bot access token.
//!
//! Transport success and platform success are kept apart: the exchanger
//! returns any well-formed payload, including `{"ok": false}`. Callers check
//! [`AuthorizationResult::ensure_ok`] before persisting anything.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ClientCredentials;
use crate::error::{BotError, BotResult};

/// Bot scopes requested on installation.
pub const REQUIRED_SCOPES: &[&str] = &["bot"];

/// Payload returned by `oauth.access`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthorizationResult {
    /// Whether the platform accepted the exchange.
    #[serde(default)]
    pub ok: bool,
    /// Error code (if ok is false).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// User access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Scopes granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Workspace ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    /// Workspace name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    /// Bot credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<OAuthBot>,
}

/// Bot credential nested in the exchange payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OAuthBot {
    /// Bot user ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_user_id: Option<String>,
    /// Bot access token (xoxb-...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_access_token: Option<String>,
}

impl AuthorizationResult {
    /// Reject a payload the platform flagged as failed.
    pub fn ensure_ok(self) -> BotResult<Self> {
        if self.ok {
            return Ok(self);
        }
        let error = self.error.as_deref().unwrap_or("unknown error");
        Err(BotError::ExchangeFailed(format!(
            "platform rejected the authorization code: {}",
            error
        )))
    }

    /// Get the bot access token, if present.
    pub fn bot_access_token(&self) -> Option<&str> {
        self.bot.as_ref()?.bot_access_token.as_deref()
    }
}

/// Exchanges an authorization code for a workspace credential payload.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange `code`. Transport and parse failures are `ExchangeFailed`;
    /// the platform's own `ok` flag is left for the caller.
    async fn exchange_code(&self, code: &str) -> BotResult<AuthorizationResult>;
}

/// `oauth.access` client.
#[derive(Debug, Clone)]
pub struct OAuthExchanger {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<ClientCredentials>,
}

impl OAuthExchanger {
    /// Create an exchanger against `base_url` (e.g. `https://slack.com/api`).
    ///
    /// `timeout` bounds the whole exchange, connect through body.
    pub fn new(
        credentials: Arc<ClientCredentials>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> BotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/oauth.access", self.base_url)
    }
}

#[async_trait]
impl TokenExchange for OAuthExchanger {
    async fn exchange_code(&self, code: &str) -> BotResult<AuthorizationResult> {
        if code.is_empty() {
            return Err(BotError::BadRequest(
                "authorization code is empty".to_string(),
            ));
        }

        debug!("Exchanging authorization code at {}", self.endpoint());

        let response = self
            .client
            .get(self.endpoint())
            .query(&[
                ("client_id", self.credentials.id()),
                ("client_secret", self.credentials.secret()),
                ("code", code),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Token exchange returned status {}", status);
            return Err(BotError::ExchangeFailed(format!(
                "token exchange failed with status {}: {}",
                status, body
            )));
        }

        let result: AuthorizationResult = serde_json::from_str(&body).map_err(|e| {
            BotError::ExchangeFailed(format!("malformed response body: {}", e))
        })?;

        debug!(
            "Token exchange completed (ok: {}, team: {})",
            result.ok,
            result.team_id.as_deref().unwrap_or("unknown")
        );
        Ok(result)
    }
}
