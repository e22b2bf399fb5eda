//! heybot server - HTTP host for the heybot Slack app.
//!
//! This crate provides:
//! - Configuration loading (JSON file or environment)
//! - The axum application around [`heybot_slack::RequestRouter`]
//! - Request tracing, body limits and timeouts
//! - Graceful shutdown

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use heybot_slack::{ClientCredentials, CredentialBackend, FileBackend, MemoryBackend, RequestRouter};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::ServerConfig;

/// One shutdown trigger shared by several waiters.
///
/// The trigger future runs once, on a spawned task; every clone resolves
/// [`ShutdownSignal::wait`] when it completes.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Spawn `trigger` and fan its completion out to all clones.
    pub fn new<F>(trigger: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            trigger.await;
            let _ = tx.send(true);
        });
        Self { rx }
    }

    /// Resolve once the trigger has fired.
    pub async fn wait(mut self) {
        // The sender is only dropped after sending, so an error also means
        // the trigger fired.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }
}

/// Run the server until the process is stopped.
pub async fn run(config: ServerConfig, credentials: ClientCredentials) -> anyhow::Result<()> {
    run_with_shutdown(config, credentials, std::future::pending()).await
}

/// Run the server with graceful shutdown support.
pub async fn run_with_shutdown<F>(
    config: ServerConfig,
    credentials: ClientCredentials,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if let Err(e) = credentials.validate() {
        warn!("Slack app credentials are incomplete: {}", e);
    }

    let router = build_request_router(&config, credentials)?;
    let app = create_router(Arc::new(router), &config);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Starting heybot server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shut down");
    Ok(())
}

/// Build the request router, backed by the file store unless running
/// offline.
pub fn build_request_router(
    config: &ServerConfig,
    credentials: ClientCredentials,
) -> anyhow::Result<RequestRouter> {
    let backend: Arc<dyn CredentialBackend> = if config.slack.offline {
        Arc::new(MemoryBackend::new())
    } else {
        Arc::new(FileBackend::new(&config.store_dir)?)
    };

    Ok(RequestRouter::from_config(
        Arc::new(credentials),
        &config.slack,
        backend,
    )?)
}

/// Create the application router.
pub fn create_router(router: Arc<RequestRouter>, config: &ServerConfig) -> Router {
    heybot_slack::http::routes(router)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout_duration(),
        ))
        .layer(TraceLayer::new_for_http())
}
