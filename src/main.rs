//! Pylon binary entry point.
//!
//! Wires the telemetry listener, the ingest router thread and the HTTP query
//! API together. Core functionality is provided by the `pylon` library crate.

use clap::Parser;
use pylon::{
    config::AppConfig,
    ingest::{IngestRouter, run_listener},
    server::{AppState, create_router},
    settings::SettingsStore,
    store::LogQuery,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pylon - structural telemetry log engine
#[derive(Parser, Debug)]
#[command(name = "pylon", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, env = "PYLON_CONFIG")]
    config: Option<String>,

    /// Server bind address (overrides config file)
    #[arg(long, env = "PYLON_SERVER_BIND")]
    server_bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "PYLON_SERVER_PORT")]
    server_port: Option<u16>,

    /// Data directory (overrides config file)
    #[arg(long, env = "PYLON_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pylon=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Pylon - Structural Telemetry Log Engine");

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(bind) = cli.server_bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.server_port {
        config.server.port = port;
    }
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }
    config.validate()?;

    tracing::info!(
        "Server: {}:{}, Ingest: {}:{}, Data dir: {}",
        config.server.bind,
        config.server.port,
        config.ingest.bind,
        config.ingest.port,
        config.storage.data_dir.display(),
    );

    // Settings live beside the log files
    let settings = SettingsStore::open(config.settings_path())?;

    // Single-writer router thread owning every log file
    let (router_join, ingest) =
        IngestRouter::spawn(&config.storage.data_dir, config.ingest.queue_capacity);

    // Telemetry listener feeding the router's bounded queue
    let ingest_addr: SocketAddr =
        format!("{}:{}", config.ingest.bind, config.ingest.port).parse()?;
    let telemetry = tokio::net::TcpListener::bind(ingest_addr).await?;
    tracing::info!("Telemetry listener on: {}", ingest_addr);
    tokio::spawn(run_listener(telemetry, ingest.clone()));

    // Web server state
    let app_state = AppState {
        query: LogQuery::new(&config.storage.data_dir),
        settings,
        stats: ingest.stats().clone(),
    };
    let app = create_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    tracing::info!("Web server listening on: http://{}", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain queued frames before exiting so nothing accepted is lost.
    tracing::info!("Shutting down ingest router...");
    ingest.shutdown();
    if router_join.join().is_err() {
        tracing::error!("Ingest router thread panicked");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
