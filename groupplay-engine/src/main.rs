//! GroupPlay server
//!
//! Loads configuration, wires the playback engine to the subprocess
//! resolver and local paced sinks, and serves the HTTP command surface.

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use groupplay_common::config::{resolve_config_path, ConfigOverrides, LoggingConfig, TomlConfig};
use groupplay_common::events::EventBus;
use groupplay_engine::adapters::{EventBusNotifier, ExtractorSearch, LocalConnections, ProcessResolver};
use groupplay_engine::api;
use groupplay_engine::{PlaybackController, PlayerRegistry};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "groupplay")]
#[command(about = "Per-group sequential media playback server")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "GROUPPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port (overrides config)
    #[arg(short, long, env = "GROUPPLAY_PORT")]
    port: Option<u16>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Log filter, e.g. `groupplay_engine=debug` (overrides config)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;
    config.apply_overrides(ConfigOverrides {
        port: args.port,
        bind_address: args.bind,
        log_level: args.log_level,
    });
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.logging)?;

    info!("Starting GroupPlay on port {}", config.port);
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let events = Arc::new(EventBus::new(config.event_capacity));
    let notifier = Arc::new(EventBusNotifier::new(Arc::clone(&events)));
    let resolver = Arc::new(ProcessResolver::new(
        config.resolver.clone(),
        config.playback.clone(),
    ));
    let connections = Arc::new(LocalConnections::new(config.playback.byte_rate()));

    let registry = Arc::new(PlayerRegistry::new(resolver.clone(), notifier.clone()));
    let controller = Arc::new(
        PlaybackController::new(
            registry,
            resolver,
            connections,
            Arc::new(ExtractorSearch),
            notifier,
        )
        .with_default_volume(config.playback.default_volume),
    );
    info!("Playback engine initialized");

    let app_state = api::AppState {
        controller,
        events,
        port: config.port,
    };
    let app = api::create_router(app_state)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address))?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.clone().into());

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
