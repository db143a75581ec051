//! Connection façade: binds a transport to the read pipeline, the multicast
//! hub, and the writer.

use crate::config::ConnectionConfig;
use crate::error::ConnectionError;
use crate::hub::{MulticastHub, Starter, Subscription, Termination};
use crate::reader::ReadLoop;
use crate::transport::{BoxTransport, Transport};
use crate::writer::Writer;
use linerpc_protocol::{JsonCodec, LineFramer, ProtocolError};
use parking_lot::Mutex;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport bound; reads start with the first subscriber.
    Active,
    /// Transport is being shut down.
    Closing,
    /// Transport released. Terminal.
    Closed,
}

/// State shared by the connection handle and its reader task.
pub(crate) struct ConnectionCore {
    connection_id: String,
    state: Mutex<ConnectionState>,
    writer: Writer,
}

impl ConnectionCore {
    pub(crate) fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Closes the transport. Only the first caller does any work.
    pub(crate) async fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            if *state != ConnectionState::Active {
                return;
            }
            *state = ConnectionState::Closing;
        }

        self.writer.close().await;
        *self.state.lock() = ConnectionState::Closed;
        tracing::info!("[{}] Connection closed", self.connection_id);
    }
}

/// Builder for [`Connection`]. A builder without a transport is the
/// uninitialized state.
pub struct ConnectionBuilder {
    connection_id: String,
    transport: Option<BoxTransport>,
    codec: Arc<JsonCodec>,
    config: ConnectionConfig,
}

impl ConnectionBuilder {
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            transport: None,
            codec: Arc::new(JsonCodec::default()),
            config: ConnectionConfig::default(),
        }
    }

    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn boxed_transport(mut self, transport: BoxTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the codec used both to decode requests and to encode sends.
    pub fn codec(mut self, codec: Arc<JsonCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the transport. Nothing is read until [`Connection::received`] is
    /// first called; the reader then runs on the runtime current at init.
    pub fn init(self) -> Result<Connection, ConnectionError> {
        if self.connection_id.is_empty() {
            return Err(ConnectionError::InvalidArgument("connection_id"));
        }
        let transport = self
            .transport
            .ok_or(ConnectionError::InvalidArgument("transport"))?;
        if self.config.validate().is_err() {
            return Err(ConnectionError::InvalidArgument("config"));
        }
        let runtime = Handle::try_current().map_err(|_| ConnectionError::NoRuntime)?;

        let remote_endpoint = transport.remote_endpoint();
        let (read_half, write_half) = tokio::io::split(transport);

        let core = Arc::new(ConnectionCore {
            connection_id: self.connection_id.clone(),
            state: Mutex::new(ConnectionState::Active),
            writer: Writer::new(self.connection_id.clone(), write_half),
        });

        let (stop_tx, stop_rx) = watch::channel(false);
        let read_loop = ReadLoop {
            reader: read_half,
            framer: LineFramer::new(self.config.max_buffer_size),
            codec: self.codec.clone(),
            read_buffer_size: self.config.read_buffer_size,
            stop: stop_rx,
            core: core.clone(),
        };
        let starter: Starter = Box::new(move |hub: Arc<MulticastHub>| {
            runtime.spawn(read_loop.run(hub));
        });
        let hub = MulticastHub::new(
            self.connection_id.clone(),
            starter,
            stop_tx,
            self.config.subscriber_capacity,
        );

        tracing::debug!(
            "[{}] Connection initialized (remote: {:?})",
            self.connection_id,
            remote_endpoint
        );

        Ok(Connection {
            core,
            hub,
            codec: self.codec,
            remote_endpoint,
        })
    }
}

/// A line-delimited JSON-RPC connection.
///
/// Requests are read by a single task and multicast to every
/// [`Subscription`] returned by [`received`](Connection::received). The
/// reader starts with the first subscriber and stops, closing the transport,
/// when the last one is dropped or the stream ends.
///
/// Failure policy: a flood violation or an undecodable line ends the stream
/// with an error for all subscribers. Transport read errors end it silently,
/// exactly like EOF, so a reset peer is indistinguishable from a clean close.
/// That hides real faults from consumers and is worth revisiting.
pub struct Connection {
    core: Arc<ConnectionCore>,
    hub: Arc<MulticastHub>,
    codec: Arc<JsonCodec>,
    remote_endpoint: Option<SocketAddr>,
}

impl Connection {
    pub fn builder(connection_id: impl Into<String>) -> ConnectionBuilder {
        ConnectionBuilder::new(connection_id)
    }

    /// Binds a transport with the default codec and config.
    pub fn init(
        transport: impl Transport,
        connection_id: impl Into<String>,
    ) -> Result<Self, ConnectionError> {
        ConnectionBuilder::new(connection_id)
            .transport(transport)
            .init()
    }

    pub fn connection_id(&self) -> &str {
        self.core.connection_id()
    }

    pub fn remote_endpoint(&self) -> Option<SocketAddr> {
        self.remote_endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.core.state.lock()
    }

    /// Subscribes to decoded requests.
    ///
    /// The first call spawns the reader. Once the stream has ended, new
    /// subscriptions only observe how it ended; history is never replayed.
    pub fn received(&self) -> Subscription {
        self.hub.subscribe()
    }

    /// Number of subscriptions currently receiving requests.
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// How the request stream ended, if it has.
    pub fn termination(&self) -> Option<Termination> {
        self.hub.termination()
    }

    /// Writes `payload` as one JSON line.
    ///
    /// Best effort: transport failures, including a closed transport, are
    /// swallowed. Errors only for a payload that is absent (serializes to
    /// `null`) or cannot be serialized.
    pub async fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), ConnectionError> {
        let value = serde_json::to_value(payload).map_err(ProtocolError::from)?;
        if value.is_null() {
            return Err(ConnectionError::InvalidArgument("payload"));
        }
        let bytes = self.codec.encode(&value)?;
        self.core.writer.write_line(&bytes).await;
        Ok(())
    }

    /// Stops the reader, releases subscribers, and closes the transport.
    /// Idempotent.
    pub async fn close(&self) {
        self.hub.cancel();
        self.core.shutdown().await;
    }
}
