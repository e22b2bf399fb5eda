//! Inbound request verification.
//!
//! Slack signs every request it sends with the app's signing secret:
//!
//! ```text
//! basestring = "v0:" + X-Slack-Request-Timestamp + ":" + raw body
//! X-Slack-Signature = "v0=" + hex(HMAC-SHA256(signing_secret, basestring))
//! ```
//!
//! A request is trusted only when its timestamp is inside the replay window
//! and its signature matches. The comparison is constant time.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{BotError, BotResult};
use crate::request::{InboundRequest, Verification, VerifiedRequest};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request timestamp.
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

/// Signature scheme version.
pub const SIGNATURE_VERSION: &str = "v0";

/// Default replay window in seconds.
pub const DEFAULT_REPLAY_WINDOW_SECS: u64 = 300;

/// Decides whether an inbound request may be trusted.
pub trait VerifyRequest: Send + Sync {
    /// Verify `request` against `signing_secret`.
    fn verify(&self, request: InboundRequest, signing_secret: &str) -> BotResult<VerifiedRequest>;
}

/// HMAC-SHA256 signature and timestamp verification.
pub struct SignatureVerifier {
    clock: Arc<dyn Clock>,
    replay_window_secs: u64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("replay_window_secs", &self.replay_window_secs)
            .finish()
    }
}

impl SignatureVerifier {
    /// Create a verifier using the system clock and the default window.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a verifier reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            replay_window_secs: DEFAULT_REPLAY_WINDOW_SECS,
        }
    }

    /// Set the replay window.
    pub fn with_replay_window(mut self, secs: u64) -> Self {
        self.replay_window_secs = secs;
        self
    }

    fn check_timestamp<'a>(&self, request: &'a InboundRequest) -> BotResult<&'a str> {
        let timestamp = request.header(TIMESTAMP_HEADER).ok_or_else(|| {
            BotError::ReplayRejected("missing request timestamp header".to_string())
        })?;

        let issued_at: i64 = timestamp.trim().parse().map_err(|_| {
            BotError::ReplayRejected(format!("invalid request timestamp: {}", timestamp))
        })?;

        let skew = self.clock.now_unix().abs_diff(issued_at);
        if skew > self.replay_window_secs {
            return Err(BotError::ReplayRejected(format!(
                "request timestamp is {}s away from server time",
                skew
            )));
        }

        Ok(timestamp)
    }
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifyRequest for SignatureVerifier {
    fn verify(&self, request: InboundRequest, signing_secret: &str) -> BotResult<VerifiedRequest> {
        let timestamp = self.check_timestamp(&request)?;

        if signing_secret.is_empty() {
            return Err(BotError::Configuration(
                "Slack signing secret is not set".to_string(),
            ));
        }

        let supplied = request
            .header(SIGNATURE_HEADER)
            .ok_or_else(|| BotError::SignatureMismatch("missing signature header".to_string()))?;

        let supplied = supplied
            .strip_prefix(SIGNATURE_VERSION)
            .and_then(|s| s.strip_prefix('='))
            .and_then(|hex_sig| hex::decode(hex_sig).ok())
            .ok_or_else(|| BotError::SignatureMismatch("malformed signature header".to_string()))?;

        let mac = signing_mac(signing_secret, timestamp, &request.body)?;
        if mac.verify_slice(&supplied).is_err() {
            warn!("Request signature did not match for path {}", request.path);
            return Err(BotError::SignatureMismatch(
                "request signature did not match".to_string(),
            ));
        }

        debug!("Verified request signature for path {}", request.path);
        Ok(VerifiedRequest::new(request, Verification::Signature))
    }
}

/// Trusts every request. Only for local development, selected explicitly
/// through offline configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineVerifier;

impl VerifyRequest for OfflineVerifier {
    fn verify(&self, request: InboundRequest, _signing_secret: &str) -> BotResult<VerifiedRequest> {
        debug!("Request verification skipped for offline execution");
        Ok(VerifiedRequest::new(request, Verification::Skipped))
    }
}

/// Compute the `v0=...` signature Slack would send for a request.
pub fn compute_signature(signing_secret: &str, timestamp: &str, body: &[u8]) -> BotResult<String> {
    let mac = signing_mac(signing_secret, timestamp, body)?;
    Ok(format!(
        "{}={}",
        SIGNATURE_VERSION,
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn signing_mac(signing_secret: &str, timestamp: &str, body: &[u8]) -> BotResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .map_err(|e| BotError::Configuration(format!("invalid signing secret: {}", e)))?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
}
