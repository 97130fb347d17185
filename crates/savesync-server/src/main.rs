//! savesyncd - SaveSync request handler
//!
//! Loads the server configuration, opens the manifest database and serves
//! the sync API until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use savesync_server::{http, GatewayClaimsValidator, HmacCapabilityIssuer, ServerConfig, SyncHandler};
use savesync_store::{DatabasePool, SqliteManifestStore};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "savesyncd")]
#[command(about = "SaveSync sync request handler")]
#[command(version)]
struct Cli {
    /// Path to the server configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

// ============================================================================
// Configuration
// ============================================================================

fn load_config(path: Option<PathBuf>) -> Result<ServerConfig> {
    let path = path.unwrap_or_else(ServerConfig::default_path);
    let config = if path.exists() {
        ServerConfig::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?
    } else {
        ServerConfig::default()
    };
    let config = config.with_env();

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        bail!("Invalid configuration ({}):\n  {}", path.display(), details.join("\n  "));
    }

    Ok(config)
}

fn init_tracing(default_level: &str, json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

// ============================================================================
// Signal handling
// ============================================================================

/// Cancels `token` on SIGINT or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    init_tracing(&config.log_level, cli.json_logs);
    info!("SaveSync request handler starting (savesyncd)");

    // Step 1: Open the manifest database
    let pool = DatabasePool::new(&config.database_path)
        .await
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    let store = SqliteManifestStore::new(pool.pool().clone());

    // Step 2: Capability issuer and credential validation
    let issuer = HmacCapabilityIssuer::new(
        &config.object_store_base_url,
        config.signing_secret.as_bytes().to_vec(),
    )
    .context("Failed to set up capability signing")?;

    let handler = Arc::new(SyncHandler::new(
        Arc::new(store),
        Arc::new(issuer),
        Arc::new(GatewayClaimsValidator::new()),
        config.capability_ttl(),
    ));

    // Step 3: Bind and serve until a shutdown signal
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let result = http::serve(listener, handler, shutdown_token).await;

    match &result {
        Ok(()) => info!("savesyncd shut down gracefully"),
        Err(e) => error!(error = %e, "savesyncd exiting with error"),
    }

    result
}
