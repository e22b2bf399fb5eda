//! End-to-end tests for the install, authorize and event flows.
//!
//! Requests are signed with a fixed clock; the OAuth endpoint is served
//! by wiremock and credentials live in an in-memory or file backend.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use heybot_slack::{
    BotError, BotResult, ClientCredentials, CredentialBackend, CredentialStore, EventDispatcher,
    FileBackend, FixedClock, InboundRequest, MemoryBackend, OAuthExchanger, RequestRouter,
    SignatureVerifier, SlackAppConfig, TableStore, WorkspaceCredential, compute_signature,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW: i64 = 1_531_420_618;
const SIGNING_SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
const CLIENT_ID: &str = "123.456";
const TABLE: &str = "access-tokens";

// ============================================================================
// FIXTURES
// ============================================================================

/// Store wrapper counting calls into the real store.
struct CountingStore {
    inner: TableStore,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl CountingStore {
    fn new(backend: Arc<dyn CredentialBackend>) -> Self {
        Self {
            inner: TableStore::new(backend, TABLE),
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn get(&self, team_id: &str) -> BotResult<WorkspaceCredential> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(team_id).await
    }

    async fn put(&self, credential: WorkspaceCredential) -> BotResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(credential).await
    }
}

/// Dispatcher recording every event it receives.
#[derive(Default)]
struct RecordingDispatcher {
    received: Mutex<Vec<(serde_json::Value, WorkspaceCredential)>>,
    fail: bool,
}

impl RecordingDispatcher {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[async_trait]
impl EventDispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        event: serde_json::Value,
        credential: WorkspaceCredential,
    ) -> BotResult<()> {
        self.received.lock().unwrap().push((event, credential));
        if self.fail {
            return Err(BotError::ExchangeFailed("chat.postMessage failed".into()));
        }
        Ok(())
    }
}

/// Backend whose every call fails.
struct FailingBackend;

#[async_trait]
impl CredentialBackend for FailingBackend {
    async fn get_item(
        &self,
        _table: &str,
        _team_id: &str,
    ) -> BotResult<Option<WorkspaceCredential>> {
        Err(BotError::Store("backend unavailable".into()))
    }

    async fn put_item(&self, _table: &str, _credential: &WorkspaceCredential) -> BotResult<()> {
        Err(BotError::Store("backend unavailable".into()))
    }
}

struct Harness {
    router: RequestRouter,
    store: Arc<CountingStore>,
    dispatcher: Arc<RecordingDispatcher>,
}

fn harness_with(
    signing_secret: &str,
    api_base_url: &str,
    backend: Arc<dyn CredentialBackend>,
    dispatcher: RecordingDispatcher,
) -> Harness {
    let credentials = Arc::new(ClientCredentials::new(
        CLIENT_ID,
        "client-secret",
        signing_secret,
    ));
    let exchanger =
        OAuthExchanger::new(credentials.clone(), api_base_url, Duration::from_secs(5)).unwrap();
    let store = Arc::new(CountingStore::new(backend));
    let dispatcher = Arc::new(dispatcher);

    let router = RequestRouter::new(
        credentials,
        Arc::new(SignatureVerifier::with_clock(Arc::new(FixedClock(NOW)))),
        Arc::new(exchanger),
        store.clone(),
    )
    .with_dispatcher(dispatcher.clone());

    Harness {
        router,
        store,
        dispatcher,
    }
}

fn harness() -> Harness {
    harness_with(
        SIGNING_SECRET,
        "http://127.0.0.1:9",
        Arc::new(MemoryBackend::new()),
        RecordingDispatcher::default(),
    )
}

fn signed(path: &str, body: &str) -> InboundRequest {
    signed_at(path, body, NOW)
}

fn signed_at(path: &str, body: &str, timestamp: i64) -> InboundRequest {
    let ts = timestamp.to_string();
    let signature = compute_signature(SIGNING_SECRET, &ts, body.as_bytes()).unwrap();
    InboundRequest::new(path)
        .with_header("X-Slack-Request-Timestamp", &ts)
        .with_header("X-Slack-Signature", &signature)
        .with_body(body.to_string())
}

fn error_code(body: &str) -> String {
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    json["error"]["code"].as_str().unwrap_or_default().to_string()
}

fn credential(team_id: &str, token: &str) -> WorkspaceCredential {
    WorkspaceCredential {
        team_id: team_id.to_string(),
        team_name: "Acme".to_string(),
        bot_access_token: token.to_string(),
        scope: "chat:write".to_string(),
    }
}

async fn oauth_server(payload: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth.access"))
        .and(query_param("client_id", CLIENT_ID))
        .and(query_param("client_secret", "client-secret"))
        .and(query_param("code", "good-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .expect(1)
        .mount(&server)
        .await;
    server
}

// ============================================================================
// VERIFICATION
// ============================================================================

mod verification {
    use super::*;

    #[tokio::test]
    async fn test_unset_signing_secret_is_configuration_error() {
        let h = harness_with(
            "",
            "http://127.0.0.1:9",
            Arc::new(MemoryBackend::new()),
            RecordingDispatcher::default(),
        );
        let body = r#"{"type":"url_verification","challenge":"abc123"}"#;

        let response = h.router.handle(signed("/event", body)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(&response.body), "configuration_error");
    }

    #[tokio::test]
    async fn test_wrong_signature_is_mismatch() {
        let h = harness();
        let request = InboundRequest::new("/event")
            .with_header("X-Slack-Request-Timestamp", &NOW.to_string())
            .with_header("X-Slack-Signature", &format!("v0={}", "0".repeat(64)))
            .with_body(r#"{"type":"url_verification","challenge":"abc123"}"#);

        let response = h.router.handle(request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&response.body), "signature_mismatch");
    }

    #[tokio::test]
    async fn test_tampered_body_is_mismatch() {
        let h = harness();
        let mut request = signed("/event", r#"{"type":"url_verification","challenge":"a"}"#);
        request.body = r#"{"type":"url_verification","challenge":"b"}"#.into();

        let response = h.router.handle(request).await;

        assert_eq!(error_code(&response.body), "signature_mismatch");
    }

    #[tokio::test]
    async fn test_stale_request_is_replay_rejected() {
        let h = harness();
        let body = r#"{"type":"url_verification","challenge":"abc123"}"#;

        let response = h.router.handle(signed_at("/event", body, NOW - 301)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&response.body), "replay_rejected");
    }

    #[tokio::test]
    async fn test_rejected_request_never_reaches_store() {
        let h = harness();
        let request = InboundRequest::new("/event")
            .with_body(r#"{"type":"event_callback","team_id":"T1"}"#);

        let response = h.router.handle(request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.store.gets.load(Ordering::SeqCst), 0);
        assert_eq!(h.dispatcher.count(), 0);
    }
}

// ============================================================================
// EVENT ROUTE
// ============================================================================

mod event_route {
    use super::*;

    #[tokio::test]
    async fn test_url_verification_echoes_challenge() {
        let h = harness();
        let body = r#"{"type":"url_verification","challenge":"abc123"}"#;

        let response = h.router.handle(signed("/event", body)).await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "abc123");
        assert_eq!(
            response.headers.get("Content-Type").map(String::as_str),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(h.store.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_team_is_server_error_without_dispatch() {
        let h = harness();
        let body = r#"{"type":"event_callback","team_id":"UNKNOWN"}"#;

        let response = h.router.handle(signed("/event", body)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(&response.body), "not_found");
        assert_eq!(h.store.gets.load(Ordering::SeqCst), 1);
        assert_eq!(h.dispatcher.count(), 0);
    }

    #[tokio::test]
    async fn test_event_dispatched_with_stored_credential() {
        let h = harness();
        h.store.put(credential("T1", "xoxb-1")).await.unwrap();
        let body = r#"{
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev1",
            "event": {"type": "message", "user": "U1", "channel": "C1", "text": "hey"}
        }"#;

        let response = h.router.handle(signed("/event", body)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let received = h.dispatcher.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0["text"], "hey");
        assert_eq!(received[0].1.bot_access_token, "xoxb-1");
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_still_acknowledged() {
        let h = harness_with(
            SIGNING_SECRET,
            "http://127.0.0.1:9",
            Arc::new(MemoryBackend::new()),
            RecordingDispatcher::failing(),
        );
        h.store.put(credential("T1", "xoxb-1")).await.unwrap();
        let body = r#"{"type":"event_callback","team_id":"T1","event":{"type":"message"}}"#;

        let response = h.router.handle(signed("/event", body)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_envelope_is_unsupported() {
        let h = harness();
        let body = r#"{"type":"app_rate_limited","team_id":"T1"}"#;

        let response = h.router.handle(signed("/event", body)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(&response.body), "unsupported_event");
        assert!(response.body.contains("app_rate_limited"));
    }

    #[tokio::test]
    async fn test_store_failure_is_server_error_without_dispatch() {
        let h = harness_with(
            SIGNING_SECRET,
            "http://127.0.0.1:9",
            Arc::new(FailingBackend),
            RecordingDispatcher::default(),
        );
        let body = r#"{"type":"event_callback","team_id":"T1","event":{"type":"message"}}"#;

        let response = h.router.handle(signed("/event", body)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(&response.body), "store_error");
        assert_eq!(h.dispatcher.count(), 0);
    }

    #[tokio::test]
    async fn test_envelope_without_type_is_unsupported() {
        let h = harness();

        for body in [r#"{}"#, r#"{"challenge":"x"}"#] {
            let response = h.router.handle(signed("/event", body)).await;

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(error_code(&response.body), "unsupported_event");
        }
        assert_eq!(h.store.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let h = harness();

        let response = h.router.handle(signed("/event", "{not json")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&response.body), "bad_request");
    }
}

// ============================================================================
// INSTALL AND AUTHORIZE ROUTES
// ============================================================================

mod install_flow {
    use super::*;

    #[tokio::test]
    async fn test_install_page_carries_client_id() {
        let h = harness();

        let response = h.router.handle(signed("/install", "")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body.contains("client_id=123.456"));
        assert_eq!(
            response.headers.get("Content-Type").map(String::as_str),
            Some("text/html")
        );
    }

    #[tokio::test]
    async fn test_authorize_stores_credential() {
        let server = oauth_server(serde_json::json!({
            "ok": true,
            "access_token": "xoxp-user",
            "scope": "chat:write",
            "team_id": "T1",
            "team_name": "Acme",
            "bot": {"bot_user_id": "UBOT", "bot_access_token": "xoxb-1"}
        }))
        .await;
        let h = harness_with(
            SIGNING_SECRET,
            &server.uri(),
            Arc::new(MemoryBackend::new()),
            RecordingDispatcher::default(),
        );

        let response = h
            .router
            .handle(signed("/authorized", "").with_query("code", "good-code"))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body.contains("Acme"));

        let stored = h.store.get("T1").await.unwrap();
        assert_eq!(stored, credential("T1", "xoxb-1"));
    }

    #[tokio::test]
    async fn test_authorize_platform_rejection_stores_nothing() {
        let server = oauth_server(serde_json::json!({"ok": false, "error": "invalid_code"})).await;
        let h = harness_with(
            SIGNING_SECRET,
            &server.uri(),
            Arc::new(MemoryBackend::new()),
            RecordingDispatcher::default(),
        );

        let response = h
            .router
            .handle(signed("/authorized", "").with_query("code", "good-code"))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(error_code(&response.body), "exchange_failed");
        assert!(response.body.contains("invalid_code"));
        assert_eq!(h.store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authorize_without_bot_token_is_invalid_credential() {
        let server = oauth_server(serde_json::json!({
            "ok": true,
            "team_id": "T1",
            "team_name": "Acme"
        }))
        .await;
        let h = harness_with(
            SIGNING_SECRET,
            &server.uri(),
            Arc::new(MemoryBackend::new()),
            RecordingDispatcher::default(),
        );

        let response = h
            .router
            .handle(signed("/authorized", "").with_query("code", "good-code"))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(error_code(&response.body), "invalid_credential");
        assert!(matches!(
            h.store.get("T1").await,
            Err(BotError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_authorize_store_failure_shows_no_success_page() {
        let server = oauth_server(serde_json::json!({
            "ok": true,
            "scope": "chat:write",
            "team_id": "T1",
            "team_name": "Acme",
            "bot": {"bot_access_token": "xoxb-1"}
        }))
        .await;
        let h = harness_with(
            SIGNING_SECRET,
            &server.uri(),
            Arc::new(FailingBackend),
            RecordingDispatcher::default(),
        );

        let response = h
            .router
            .handle(signed("/authorized", "").with_query("code", "good-code"))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(&response.body), "store_error");
        assert!(!response.body.contains("Acme"));
        assert_eq!(h.store.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_authorize_upstream_failure_is_exchange_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth.access"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let h = harness_with(
            SIGNING_SECRET,
            &server.uri(),
            Arc::new(MemoryBackend::new()),
            RecordingDispatcher::default(),
        );

        let response = h
            .router
            .handle(signed("/authorized", "").with_query("code", "good-code"))
            .await;

        assert_eq!(error_code(&response.body), "exchange_failed");
        assert_eq!(h.store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authorize_missing_code_is_bad_request() {
        let h = harness();

        let response = h.router.handle(signed("/authorized", "")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&response.body), "bad_request");
    }

    #[tokio::test]
    async fn test_authorize_denied_is_bad_request() {
        let h = harness();

        let response = h
            .router
            .handle(signed("/authorized", "").with_query("error", "access_denied"))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.body.contains("access_denied"));
    }

    #[tokio::test]
    async fn test_unsigned_browser_routes() {
        let h = harness();
        let router = h.router.with_unsigned_browser_routes(true);

        let install = router.handle(InboundRequest::new("/install")).await;
        assert_eq!(install.status(), StatusCode::OK);

        let event = router
            .handle(
                InboundRequest::new("/event")
                    .with_body(r#"{"type":"url_verification","challenge":"abc123"}"#),
            )
            .await;
        assert_eq!(event.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let h = harness();

        let response = h.router.handle(signed("/admin", "")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(h.store.gets.load(Ordering::SeqCst), 0);
    }
}

// ============================================================================
// PERSISTENCE AND OFFLINE MODE
// ============================================================================

mod persistence {
    use super::*;

    #[tokio::test]
    async fn test_installation_survives_router_restart() {
        let dir = tempfile::tempdir().unwrap();
        let server = oauth_server(serde_json::json!({
            "ok": true,
            "scope": "chat:write",
            "team_id": "T1",
            "team_name": "Acme",
            "bot": {"bot_access_token": "xoxb-1"}
        }))
        .await;

        let first = harness_with(
            SIGNING_SECRET,
            &server.uri(),
            Arc::new(FileBackend::new(dir.path()).unwrap()),
            RecordingDispatcher::default(),
        );
        let response = first
            .router
            .handle(signed("/authorized", "").with_query("code", "good-code"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let second = harness_with(
            SIGNING_SECRET,
            "http://127.0.0.1:9",
            Arc::new(FileBackend::new(dir.path()).unwrap()),
            RecordingDispatcher::default(),
        );
        let body = r#"{"type":"event_callback","team_id":"T1","event":{"type":"app_mention"}}"#;
        let response = second.router.handle(signed("/event", body)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let received = second.dispatcher.received.lock().unwrap();
        assert_eq!(received[0].1.bot_access_token, "xoxb-1");
    }

    #[tokio::test]
    async fn test_offline_router_skips_verification_and_mocks_store() {
        let credentials = Arc::new(ClientCredentials::new(CLIENT_ID, "client-secret", ""));
        let config = SlackAppConfig {
            offline: true,
            ..SlackAppConfig::default()
        };
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let router =
            RequestRouter::from_config(credentials, &config, Arc::new(MemoryBackend::new()))
                .unwrap()
                .with_dispatcher(dispatcher.clone());

        let body = r#"{"type":"event_callback","team_id":"TANY","event":{"type":"message"}}"#;
        let response = router
            .handle(InboundRequest::new("/event").with_body(body))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let received = dispatcher.received.lock().unwrap();
        assert_eq!(received[0].1.team_id, "TANY");
        assert_eq!(received[0].1.bot_access_token, "xoxb-offline");
    }
}
