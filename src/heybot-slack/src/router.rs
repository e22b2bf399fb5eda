//! Request routing.
//!
//! Every inbound request is verified first, then dispatched on its path:
//!
//! | Path          | Flow                                                  |
//! |---------------|-------------------------------------------------------|
//! | `/install`    | install page carrying the app's client ID             |
//! | `/authorized` | exchange `?code=` for a credential and store it       |
//! | `/event`      | answer handshakes, dispatch events with a credential  |
//! | anything else | logged, `404`                                         |
//!
//! The router is the only place where a [`BotError`] becomes a response;
//! [`RequestRouter::handle`] always returns a [`BotResponse`].

use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{debug, error, info, warn};

use crate::config::{ClientCredentials, SlackAppConfig};
use crate::error::{BotError, BotResult};
use crate::events::{EventDispatcher, EventEnvelope, LoggingDispatcher, event_type};
use crate::oauth::{OAuthExchanger, TokenExchange};
use crate::pages::{HtmlPages, PageRenderer};
use crate::request::{BotResponse, InboundRequest, Verification, VerifiedRequest};
use crate::store::{CredentialBackend, CredentialStore, OfflineStore, TableStore, WorkspaceCredential};
use crate::verify::{OfflineVerifier, SignatureVerifier, VerifyRequest};

/// Content type the platform expects on a challenge response.
const CHALLENGE_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Route selected by the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Installation prompt.
    Install,
    /// OAuth redirect callback.
    Authorize,
    /// Events API delivery.
    Event,
    /// Unrecognized path.
    Other,
}

impl Route {
    /// Select the route for `path`. A trailing slash is ignored.
    pub fn from_path(path: &str) -> Self {
        let path = path.trim_end_matches('/');
        match path {
            "/install" => Self::Install,
            "/authorize" | "/authorized" => Self::Authorize,
            "/event" | "/events" => Self::Event,
            _ => Self::Other,
        }
    }

    /// Routes opened by a user's browser rather than posted by the platform.
    pub fn is_browser_route(self) -> bool {
        matches!(self, Self::Install | Self::Authorize)
    }
}

/// Verifies inbound requests and runs the install, authorize and event
/// flows.
#[derive(Clone)]
pub struct RequestRouter {
    credentials: Arc<ClientCredentials>,
    verifier: Arc<dyn VerifyRequest>,
    exchanger: Arc<dyn TokenExchange>,
    store: Arc<dyn CredentialStore>,
    dispatcher: Arc<dyn EventDispatcher>,
    pages: Arc<dyn PageRenderer>,
    unsigned_browser_routes: bool,
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter")
            .field("credentials", &self.credentials)
            .field("unsigned_browser_routes", &self.unsigned_browser_routes)
            .finish()
    }
}

impl RequestRouter {
    /// Create a router from its collaborators. Events go to a
    /// [`LoggingDispatcher`] and pages come from [`HtmlPages`] until
    /// replaced.
    pub fn new(
        credentials: Arc<ClientCredentials>,
        verifier: Arc<dyn VerifyRequest>,
        exchanger: Arc<dyn TokenExchange>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            credentials,
            verifier,
            exchanger,
            store,
            dispatcher: Arc::new(LoggingDispatcher),
            pages: Arc::new(HtmlPages),
            unsigned_browser_routes: false,
        }
    }

    /// Build the production or offline router described by `config`.
    ///
    /// Offline mode swaps in [`OfflineVerifier`] and [`OfflineStore`];
    /// `backend` is then unused.
    pub fn from_config(
        credentials: Arc<ClientCredentials>,
        config: &SlackAppConfig,
        backend: Arc<dyn CredentialBackend>,
    ) -> BotResult<Self> {
        let exchanger = OAuthExchanger::new(
            Arc::clone(&credentials),
            config.api_base_url.clone(),
            config.exchange_timeout(),
        )?;

        let (verifier, store): (Arc<dyn VerifyRequest>, Arc<dyn CredentialStore>) =
            if config.offline {
                warn!("Offline mode: request verification is disabled and the store is mocked");
                (Arc::new(OfflineVerifier), Arc::new(OfflineStore::new()))
            } else {
                (
                    Arc::new(
                        SignatureVerifier::new().with_replay_window(config.replay_window_secs),
                    ),
                    Arc::new(
                        TableStore::new(backend, config.table_name.clone())
                            .with_timeout(config.store_timeout()),
                    ),
                )
            };

        Ok(Self::new(credentials, verifier, Arc::new(exchanger), store)
            .with_unsigned_browser_routes(config.unsigned_browser_routes))
    }

    /// Replace the event dispatcher.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Replace the page renderer.
    pub fn with_pages(mut self, pages: Arc<dyn PageRenderer>) -> Self {
        self.pages = pages;
        self
    }

    /// Serve the install and authorize routes without signature checks.
    pub fn with_unsigned_browser_routes(mut self, enabled: bool) -> Self {
        self.unsigned_browser_routes = enabled;
        self
    }

    /// Handle one inbound request. Never fails: every error becomes a
    /// structured response.
    pub async fn handle(&self, request: InboundRequest) -> BotResponse {
        let route = Route::from_path(&request.path);
        debug!("Handling {:?} request for path {}", route, request.path);

        match self.route(route, request).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    BotError::Configuration(_) => error!("Verification failed: {}", e),
                    e if e.is_verification_failure() => warn!("Verification failed: {}", e),
                    e => error!("Failed to handle event: {}", e),
                }
                BotResponse::from(&e)
            }
        }
    }

    async fn route(&self, route: Route, request: InboundRequest) -> BotResult<BotResponse> {
        let verified = self.verify(route, request)?;

        match route {
            Route::Install => Ok(BotResponse::html(self.pages.install(self.credentials.id()))),
            Route::Authorize => self.authorize(&verified).await,
            Route::Event => self.receive_event(&verified).await,
            Route::Other => {
                warn!("Unexpected request path: {}", verified.request().path);
                Ok(BotResponse::not_found())
            }
        }
    }

    fn verify(&self, route: Route, request: InboundRequest) -> BotResult<VerifiedRequest> {
        if self.unsigned_browser_routes && route.is_browser_route() {
            return Ok(VerifiedRequest::new(request, Verification::Skipped));
        }
        self.verifier
            .verify(request, self.credentials.signing_secret())
    }

    async fn authorize(&self, verified: &VerifiedRequest) -> BotResult<BotResponse> {
        let query = &verified.request().query;

        if let Some(denied) = query.get("error") {
            return Err(BotError::BadRequest(format!(
                "authorization was denied: {}",
                denied
            )));
        }

        let code = query
            .get("code")
            .filter(|code| !code.is_empty())
            .ok_or_else(|| BotError::BadRequest("missing authorization code".to_string()))?;

        let result = self.exchanger.exchange_code(code).await?.ensure_ok()?;
        let credential = WorkspaceCredential::from(&result);
        let team_id = credential.team_id.clone();
        let team_name = if credential.team_name.is_empty() {
            "your workspace".to_string()
        } else {
            credential.team_name.clone()
        };

        self.store.put(credential).await?;

        info!("OAuth successful for team: {} ({})", team_name, team_id);
        Ok(BotResponse::html(self.pages.authorized(&team_name)))
    }

    async fn receive_event(&self, verified: &VerifiedRequest) -> BotResult<BotResponse> {
        let body: serde_json::Value = serde_json::from_slice(&verified.request().body)?;
        let kind = event_type(&body).to_string();

        // An envelope without a type is unsupported, not malformed.
        if body.get("type").and_then(|t| t.as_str()).is_none() {
            return Err(BotError::UnsupportedEvent(kind));
        }

        match serde_json::from_value::<EventEnvelope>(body)? {
            EventEnvelope::UrlVerification { challenge } => {
                debug!("Answering url_verification challenge");
                Ok(BotResponse::new(StatusCode::OK, challenge)
                    .with_header("Content-Type", CHALLENGE_CONTENT_TYPE))
            }
            EventEnvelope::EventCallback {
                team_id,
                event,
                event_id,
            } => {
                let credential = self.store.get(&team_id).await?;

                debug!(
                    "Dispatching {} event {} for team {}",
                    event_type(&event),
                    event_id.as_deref().unwrap_or("-"),
                    team_id
                );

                // Delivered events are acknowledged even if processing fails,
                // otherwise the platform redelivers them.
                if let Err(e) = self.dispatcher.dispatch(event, credential).await {
                    error!("Event dispatch failed for team {}: {}", team_id, e);
                }

                Ok(BotResponse::new(StatusCode::OK, ""))
            }
            EventEnvelope::Unknown => Err(BotError::UnsupportedEvent(kind)),
        }
    }
}
