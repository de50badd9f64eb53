//! necho - N-Echo server
//!
//! A TCP server that answers `{n, message}` with the message repeated n times.

use clap::Parser;
use necho_server::{Config, Server};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "necho")]
#[command(about = "N-Echo TCP server", long_about = None)]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file and environment)
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if NECHO_CONFIG is set, then env overrides)
    let config_path = std::env::var("NECHO_CONFIG").ok();
    let mut config = match Config::load() {
        Ok(c) => {
            if let Some(path) = &config_path {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    if let Some(port) = args.port {
        config.network.bind_addr.set_port(port);
    }

    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        return Err(e.into());
    }

    tracing::info!("Starting necho server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Backlog: {}", config.network.backlog);
    tracing::info!("  Wire mode: {}", config.protocol.wire_mode);
    tracing::info!("  Max message size: {} bytes", config.protocol.max_message_size);

    let server = match Server::bind(config.server_config()) {
        Ok(server) => Arc::new(server),
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e.into());
        }
    };

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    tracing::info!(
        "Server stopped ({} connections still open)",
        server.stats().connections_active.load(Ordering::Relaxed)
    );
    Ok(())
}
