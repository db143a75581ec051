//! linerpc - line-delimited JSON-RPC server
//!
//! Accepts TCP connections and answers the built-in methods
//! (`ping`, `echo`, `server.info`).

use linerpc_server::{BuiltinHandler, Config, Server, ServerConfig, ServerInfo};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if LINERPC_CONFIG is set, then env overrides)
    let config_path = std::env::var("LINERPC_CONFIG").ok();
    let config = match Config::load() {
        Ok(c) => {
            if let Some(path) = &config_path {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if config_path.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::default()
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("Configuration error: {}", e);
        return Err(e.into());
    }

    tracing::info!("Starting linerpc server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Max connections: {}", config.network.max_connections);
    tracing::info!(
        "  Max line: {} bytes (read size {})",
        config.connection.max_buffer_size,
        config.connection.read_buffer_size
    );
    tracing::info!(
        "  Require jsonrpc version: {}",
        config.codec.require_version
    );

    let handler = BuiltinHandler::new(ServerInfo {
        max_line_bytes: config.connection.max_buffer_size,
        ..ServerInfo::default()
    });
    let server = Arc::new(Server::new(ServerConfig::from_config(&config), handler));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    tracing::info!("Server stopped");
    Ok(())
}
