//! # scanhub
//!
//! Scanhub server binary — wires config, metrics, and the HTTP/WebSocket
//! server together and runs until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use scanhub_server::config::ServerConfig;
use scanhub_server::server::ScanhubServer;
use tracing_subscriber::EnvFilter;

/// Scanhub demo dashboard server.
#[derive(Parser, Debug)]
#[command(name = "scanhub", about = "Scanhub demo dashboard server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Directory holding the demo files (created if missing).
    #[arg(long, default_value = "demo_files")]
    demo_dir: PathBuf,

    /// Directory holding the static dashboard assets.
    #[arg(long, default_value = "assets")]
    assets_dir: PathBuf,

    /// Maximum concurrent WebSocket connections.
    #[arg(long, default_value = "50")]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        demo_dir: args.demo_dir,
        assets_dir: args.assets_dir,
        max_connections: args.max_connections,
        ..ServerConfig::default()
    };

    let metrics = scanhub_server::metrics::install_recorder();
    let server = ScanhubServer::new(config, metrics);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("scanhub listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().shutdown();
    let _ = handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
