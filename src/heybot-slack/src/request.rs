//! Inbound requests and the structured responses returned for them.

use std::collections::{BTreeMap, HashMap};

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;

use crate::error::BotError;

/// A request received from the deployment host.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InboundRequest {
    /// Route discriminator (e.g. `/event`).
    pub path: String,
    /// Query parameters (used by the authorization callback).
    pub query: HashMap<String, String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Raw request body.
    pub body: Bytes,
}

impl InboundRequest {
    /// Create a request for the given path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the raw body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header. Invalid header names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            header::HeaderName::try_from(name),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Add a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Get a header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// How a request came to be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Signature and timestamp were checked against the signing secret.
    Signature,
    /// Verification was skipped by an explicit offline configuration.
    Skipped,
}

/// A request that passed verification.
///
/// Can only be produced by a verifier; the wrapped request is never
/// modified.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedRequest {
    request: InboundRequest,
    verification: Verification,
}

impl VerifiedRequest {
    pub(crate) fn new(request: InboundRequest, verification: Verification) -> Self {
        Self {
            request,
            verification,
        }
    }

    /// Get the verified request.
    pub fn request(&self) -> &InboundRequest {
        &self.request
    }

    /// How the request was verified.
    pub fn verification(&self) -> Verification {
        self.verification
    }

    /// Unwrap the verified request.
    pub fn into_inner(self) -> InboundRequest {
        self.request
    }
}

/// Structured response handed back to the host.
///
/// Serializes as `{statusCode, headers, body}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Response headers.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: String,
}

impl BotResponse {
    /// Create a response with the given status and body.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// A `200` HTML page.
    pub fn html(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body).with_header("Content-Type", "text/html")
    }

    /// An empty `404` response.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "")
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<&BotError> for BotResponse {
    fn from(err: &BotError) -> Self {
        let body = serde_json::to_string(&err.to_error_body())
            .unwrap_or_else(|_| format!(r#"{{"error":{{"code":"{}"}}}}"#, err.error_code()));

        Self::new(err.status_code(), body).with_header("Content-Type", "application/json")
    }
}

impl IntoResponse for BotResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, self.body).into_response();

        // `(status, String)` defaults to text/plain; explicit headers win.
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            let (Ok(name), Ok(value)) = (
                header::HeaderName::try_from(name.as_str()),
                HeaderValue::from_str(value),
            ) else {
                continue;
            };
            headers.insert(name, value);
        }

        response
    }
}
