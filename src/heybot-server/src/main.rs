//! heybot server binary.

use std::process::ExitCode;

use clap::Parser;
use heybot_slack::ClientCredentials;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use heybot_server::{ServerConfig, ShutdownSignal, run_with_shutdown};

/// heybot server
#[derive(Parser)]
#[command(name = "heybot-server")]
#[command(about = "Slack app host serving install, OAuth and event routes")]
#[command(version)]
struct Args {
    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address
    #[arg(short, long)]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    /// Skip request verification and mock the credential store.
    /// Local development only.
    #[arg(long)]
    offline: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

async fn shutdown_signal(shutdown_timeout: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown (timeout: {}s)...", shutdown_timeout);
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown (timeout: {}s)...", shutdown_timeout);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the environment may be set directly.
    let dotenv = dotenvy::dotenv();

    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    if let Ok(path) = dotenv {
        info!("Loaded environment from {:?}", path);
    }

    let mut config = if let Some(config_path) = args.config {
        match ServerConfig::load_with_env(&config_path) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load config from {}: {}", config_path, e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        ServerConfig::from_env()
    };

    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if args.offline {
        config.slack.offline = true;
    }
    if config.slack.offline {
        warn!("Running offline: requests are not verified");
    }

    let credentials = ClientCredentials::from_env();

    info!("Starting heybot server on {}", config.listen_addr);
    info!("Press Ctrl+C to stop");

    let shutdown_timeout = config.shutdown_timeout;
    let shutdown = ShutdownSignal::new(shutdown_signal(shutdown_timeout));
    let server = run_with_shutdown(config, credentials, shutdown.clone().wait());

    // Stop waiting for in-flight requests once the shutdown timeout runs out.
    let result = tokio::select! {
        result = server => result,
        _ = async {
            shutdown.wait().await;
            tokio::time::sleep(std::time::Duration::from_secs(shutdown_timeout)).await;
        } => {
            warn!("Shutdown timed out after {}s", shutdown_timeout);
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}
