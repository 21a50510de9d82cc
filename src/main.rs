use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gateward::abuse::AbuseTracker;
use gateward::config::GatewardConfig;
use gateward::http::{AppState, HttpServer};
use gateward::ratelimit::{PolicySet, RateLimiter};
use gateward::store::MemoryStore;

/// Store-backed admission control service.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the service configuration file
    #[arg(long)]
    config: Option<String>,

    /// Override the configured bind address
    #[arg(long)]
    bind_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting Gateward Admission Control Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => GatewardConfig::from_file(path)?,
        None => GatewardConfig::default(),
    };
    if let Some(addr) = args.bind_addr {
        config.server.http_addr = addr;
    }
    if let Ok(value) = std::env::var("GATEWARD_ENFORCE") {
        config.admission.enforce = value != "false" && value != "0";
    }
    info!(
        http_addr = %config.server.http_addr,
        enforce = config.admission.enforce,
        "Configuration loaded"
    );

    // Load endpoint policies
    let policies = match &config.admission.policy_path {
        Some(path) => PolicySet::from_file(path)?,
        None => {
            warn!("No policy file configured, starting with an empty policy set");
            PolicySet::new()
        }
    };
    info!(endpoints = policies.len(), "Endpoint policies loaded");

    // The bundled binary serves from the in-process store; production
    // deployments plug their own backend in through the Store trait.
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState {
        limiter: RateLimiter::new(store.clone()),
        abuse: AbuseTracker::new(store),
        policies,
        enforce: config.admission.enforce,
    });
    info!("Admission engine initialized");

    // Run the server with graceful shutdown on Ctrl+C
    let server = HttpServer::new(config.server.http_addr, state);
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Gateward Admission Control Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
