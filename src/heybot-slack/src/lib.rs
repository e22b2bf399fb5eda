//! Slack app core for heybot.
//!
//! This crate provides the webhook side of a Slack app:
//! - Request verification (HMAC-SHA256 signature and replay window)
//! - OAuth installation (`oauth.access` code exchange)
//! - Workspace credential storage
//! - Routing of install, authorize and event requests
//!
//! # Architecture
//!
//! [`RequestRouter`] receives an [`InboundRequest`], verifies it through a
//! [`VerifyRequest`] strategy and runs the flow selected by its path. Each
//! collaborator sits behind a trait, so offline stand-ins
//! ([`OfflineVerifier`], [`OfflineStore`]) are chosen once at construction.
//!
//! # Example
//!
//! ```rust,ignore
//! use heybot_slack::{ClientCredentials, MemoryBackend, RequestRouter, SlackAppConfig};
//!
//! let credentials = Arc::new(ClientCredentials::from_env());
//! let mut config = SlackAppConfig::default();
//! config.apply_env();
//!
//! let router = RequestRouter::from_config(credentials, &config, Arc::new(MemoryBackend::new()))?;
//! let app = heybot_slack::http::routes(Arc::new(router));
//! ```
//!
//! # Configuration
//!
//! Required environment variables:
//! - `SLACK_APP_CLIENT_ID` - OAuth client ID
//! - `SLACK_APP_CLIENT_SECRET` - OAuth client secret
//! - `SLACK_APP_SIGNING_SECRET` - Signing secret for request verification
//!
//! Optional:
//! - `ACCESS_TOKEN_TABLE` - Credential table name (default `access-tokens`)
//! - `IS_OFFLINE` - Disable verification and mock the store
//! - `SLACK_API_BASE_URL` - Web API base URL

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod oauth;
pub mod pages;
pub mod request;
pub mod router;
pub mod store;
pub mod verify;

// Re-export main types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ClientCredentials, SlackAppConfig};
pub use error::{BotError, BotResult};
pub use events::{EventDispatcher, EventEnvelope, LoggingDispatcher};
pub use oauth::{AuthorizationResult, OAuthExchanger, TokenExchange};
pub use pages::{HtmlPages, PageRenderer};
pub use request::{BotResponse, InboundRequest, Verification, VerifiedRequest};
pub use router::{RequestRouter, Route};
pub use store::{
    CredentialBackend, CredentialStore, FileBackend, MemoryBackend, OfflineStore, TableStore,
    WorkspaceCredential,
};
pub use verify::{OfflineVerifier, SignatureVerifier, VerifyRequest, compute_signature};
