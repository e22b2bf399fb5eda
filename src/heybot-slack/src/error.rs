//! Error types for request verification and the installation lifecycle.
//!
//! Every component returns a typed [`BotError`]; the request router is the
//! only place that turns one into a response. Deployment faults
//! (`Configuration`) are kept apart from client rejections so operators can
//! tell a missing signing secret from a forged or replayed request.

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while handling an inbound platform request.
#[derive(Error, Debug)]
pub enum BotError {
    /// Deployment fault (missing or invalid configuration).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Request timestamp is missing or outside the replay window.
    #[error("Replay rejected: {0}")]
    ReplayRejected(String),

    /// Request signature is missing or does not match.
    #[error("Signature mismatch: {0}")]
    SignatureMismatch(String),

    /// OAuth code exchange failed (transport, parse or platform error).
    #[error("OAuth exchange failed: {0}")]
    ExchangeFailed(String),

    /// Exchange payload cannot be persisted as a workspace credential.
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Durable store failure.
    #[error("Credential store error: {0}")]
    Store(String),

    /// No credential stored for the workspace.
    #[error("No credential found for team {0}")]
    NotFound(String),

    /// Malformed request (missing parameter, unparseable body).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Event envelope type we do not handle.
    #[error("Unexpected event type: {0}")]
    UnsupportedEvent(String),
}

impl BotError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ReplayRejected(_) => StatusCode::BAD_REQUEST,
            Self::SignatureMismatch(_) => StatusCode::BAD_REQUEST,
            Self::ExchangeFailed(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidCredential(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedEvent(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::ReplayRejected(_) => "replay_rejected",
            Self::SignatureMismatch(_) => "signature_mismatch",
            Self::ExchangeFailed(_) => "exchange_failed",
            Self::InvalidCredential(_) => "invalid_credential",
            Self::Store(_) => "store_error",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::UnsupportedEvent(_) => "unsupported_event",
        }
    }

    /// Whether the request was rejected by verification.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::ReplayRejected(_) | Self::SignatureMismatch(_)
        )
    }

    /// Build the JSON error body for this error.
    pub fn to_error_body(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BotError::ExchangeFailed(format!("request timed out: {}", err))
        } else if err.is_connect() {
            BotError::ExchangeFailed(format!("connection failed: {}", err))
        } else if err.is_decode() {
            BotError::ExchangeFailed(format!("malformed response body: {}", err))
        } else {
            BotError::ExchangeFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::BadRequest(format!("invalid JSON: {}", err))
    }
}

/// Result type for bot operations.
pub type BotResult<T> = std::result::Result<T, BotError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error detail.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}
