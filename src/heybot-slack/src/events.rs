//! Events API envelopes and the hand-off to event processing.
//!
//! The platform posts two kinds of envelope to the event route:
//! - `url_verification` - subscription handshake; the challenge is echoed
//! - `event_callback` - an event for an installed workspace
//!
//! Delivered events are passed, together with the workspace credential, to
//! an [`EventDispatcher`]. Reply generation lives behind that trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::BotResult;
use crate::store::WorkspaceCredential;

/// Envelope posted to the event route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Subscription handshake.
    UrlVerification {
        /// Value to echo back.
        challenge: String,
    },
    /// Event delivered for an installed workspace.
    EventCallback {
        /// Workspace the event belongs to.
        team_id: String,
        /// The inner event.
        #[serde(default)]
        event: serde_json::Value,
        /// Event ID.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },
    /// Any other envelope type.
    #[serde(other)]
    Unknown,
}

/// Message event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    /// User who sent the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Text of the message.
    #[serde(default)]
    pub text: String,
    /// Channel where the message was sent.
    pub channel: String,
    /// Timestamp of the message.
    #[serde(default)]
    pub ts: String,
    /// Subtype of message (e.g., "bot_message").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Bot ID (if message is from a bot).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
}

impl MessageEvent {
    /// Check if this is a bot message (should be ignored).
    pub fn is_bot_message(&self) -> bool {
        self.bot_id.is_some() || self.subtype.as_deref() == Some("bot_message")
    }
}

/// Type of an inner event, `"unknown"` if absent.
pub fn event_type(event: &serde_json::Value) -> &str {
    event
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("unknown")
}

/// Receives verified events with the credential of their workspace.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    /// Process `event` on behalf of the workspace owning `credential`.
    async fn dispatch(
        &self,
        event: serde_json::Value,
        credential: WorkspaceCredential,
    ) -> BotResult<()>;
}

/// Dispatcher that only records what it receives.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDispatcher;

#[async_trait]
impl EventDispatcher for LoggingDispatcher {
    async fn dispatch(
        &self,
        event: serde_json::Value,
        credential: WorkspaceCredential,
    ) -> BotResult<()> {
        match event_type(&event) {
            "message" => {
                let message: MessageEvent = serde_json::from_value(event)?;
                if message.is_bot_message() {
                    debug!("Ignoring bot message in channel {}", message.channel);
                    return Ok(());
                }
                info!(
                    "Message for team {} in channel {} from {}",
                    credential.team_id,
                    message.channel,
                    message.user.as_deref().unwrap_or("unknown")
                );
            }
            other => warn!("Unexpected event type: {}", other),
        }
        Ok(())
    }
}
