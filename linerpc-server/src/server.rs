//! TCP server implementation.

use crate::config::{Config, ConnectionConfig};
use crate::connection::Connection;
use crate::error::ServerError;
use crate::handler::RequestHandler;
use dashmap::DashMap;
use linerpc_protocol::JsonCodec;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Settings applied to every accepted connection.
    pub connection: ConnectionConfig,
    /// Codec shared by every connection.
    pub codec: Arc<JsonCodec>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            max_connections: config.network.max_connections,
            connection: config.connection.clone(),
            codec: Arc::new(JsonCodec::new(config.codec.clone())),
        }
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server for linerpc.
pub struct Server {
    config: ServerConfig,
    handler: Arc<dyn RequestHandler>,
    connections: Arc<DashMap<String, Arc<Connection>>>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server.
    pub fn new(config: ServerConfig, handler: impl RequestHandler) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            handler: Arc::new(handler),
            connections: Arc::new(DashMap::new()),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the configured address and runs until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Runs the accept loop on an already bound listener.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((tcp_stream, addr)) => {
                            if self.connections.len() >= self.config.max_connections {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            let connection_id = format!("conn-{}", uuid::Uuid::new_v4());
                            let connection = match Connection::builder(connection_id.clone())
                                .transport(tcp_stream)
                                .codec(self.config.codec.clone())
                                .config(self.config.connection.clone())
                                .init()
                            {
                                Ok(connection) => Arc::new(connection),
                                Err(e) => {
                                    tracing::warn!("Failed to set up connection from {}: {}", addr, e);
                                    self.stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                    continue;
                                }
                            };

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);
                            self.connections.insert(connection_id.clone(), connection.clone());
                            tracing::info!("[{}] Client connected: {}", connection_id, addr);

                            let handler = self.handler.clone();
                            let stats = self.stats.clone();
                            let connections = self.connections.clone();
                            let conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                Self::handle_connection(
                                    connection,
                                    handler,
                                    stats.clone(),
                                    conn_shutdown,
                                )
                                .await;

                                connections.remove(&connection_id);
                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::info!("[{}] Client disconnected: {}", connection_id, addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.close_all().await;
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Dispatches one connection's requests until its stream ends.
    async fn handle_connection(
        connection: Arc<Connection>,
        handler: Arc<dyn RequestHandler>,
        stats: Arc<ServerStats>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let connection_id = connection.connection_id().to_string();
        let mut requests = connection.received();

        loop {
            let item = tokio::select! {
                item = requests.recv() => item,
                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", connection_id);
                    break;
                }
            };

            let request = match item {
                Some(Ok(request)) => request,
                Some(Err(e)) => {
                    tracing::warn!("[{}] Stream terminated: {}", connection_id, e);
                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                None => break,
            };

            stats.requests_total.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "[{}] Request: {} (id={:?})",
                connection_id,
                request.method(),
                request.id()
            );

            let Some(response) = handler.handle(&request) else {
                continue;
            };

            tracing::debug!(
                "[{}] Response: {} (id={:?})",
                connection_id,
                if response.is_ok() { "OK" } else { "ERROR" },
                response.id
            );
            if let Err(e) = connection.send(&response).await {
                tracing::warn!("[{}] Failed to encode response: {}", connection_id, e);
                stats.errors_total.fetch_add(1, Ordering::Relaxed);
            }
        }

        drop(requests);
        connection.close().await;
    }

    /// Sends `payload` to every live connection. Returns how many were addressed.
    pub async fn notify_all<T: Serialize + ?Sized>(&self, payload: &T) -> Result<usize, ServerError> {
        let targets: Vec<Arc<Connection>> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for connection in &targets {
            connection.send(payload).await?;
        }
        Ok(targets.len())
    }

    /// Closes every live connection.
    pub async fn close_all(&self) {
        let targets: Vec<Arc<Connection>> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for connection in targets {
            connection.close().await;
        }
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
