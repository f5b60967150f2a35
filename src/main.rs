//! Splitmetric A/B Experimentation Engine
//!
//! Event ingestion and analytics pipeline handling:
//! - Batch validation and per-event-type aggregation into durable counters
//! - Statistical significance verdicts for variant comparisons
//! - Background workers for session expiry and snapshot persistence

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};

use api::{router, AppState};
use split_core::limits::DEFAULT_CONFIDENCE_LEVEL;
use stats_store::{MemoryStore, StatsStore};
use telemetry::{health, init_tracing_from_env};
use worker::{WorkerConfig, WorkerScheduler};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// Snapshot file for durable counters; empty disables persistence.
    #[serde(default = "default_snapshot_path")]
    snapshot_path: String,

    /// Confidence level for the significance read surface.
    #[serde(default = "default_confidence_level")]
    confidence_level: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_snapshot_path() -> String {
    "data/stats-snapshot.json".to_string()
}

fn default_confidence_level() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            snapshot_path: default_snapshot_path(),
            confidence_level: default_confidence_level(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    info!("Starting Splitmetric engine v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config()?;
    info!(
        host = %config.host,
        port = config.port,
        snapshot_path = %config.snapshot_path,
        "Loaded configuration"
    );

    // Initialize the stats store
    let store: Arc<dyn StatsStore> = if config.snapshot_path.is_empty() {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(MemoryStore::with_snapshot(&config.snapshot_path))
    };
    health().store.set_healthy();

    // Start background workers
    let scheduler = Arc::new(WorkerScheduler::new(WorkerConfig::default(), store.clone()));
    let _worker_handles = scheduler.start();
    health().workers.set_healthy();

    // Create application state and router
    let state = AppState::new(store.clone()).with_confidence_level(config.confidence_level);
    let app = router(state);

    // Start HTTP server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Cleanup
    info!("Shutting down...");

    // Persist counters one last time
    if let Err(e) = store.persist().await {
        error!("Failed to persist store on shutdown: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("SPLIT")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Manual overrides for flat environment variables
    if let Ok(port) = std::env::var("SPLIT_PORT") {
        config.port = port.parse().context("Invalid SPLIT_PORT")?;
    }
    if let Ok(path) = std::env::var("SPLIT_SNAPSHOT_PATH") {
        config.snapshot_path = path;
    }
    if let Ok(level) = std::env::var("SPLIT_CONFIDENCE_LEVEL") {
        config.confidence_level = level.parse().context("Invalid SPLIT_CONFIDENCE_LEVEL")?;
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
