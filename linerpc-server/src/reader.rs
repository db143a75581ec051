//! Per-connection read loop: transport → framer → codec → hub.

use crate::connection::ConnectionCore;
use crate::error::StreamError;
use crate::hub::{MulticastHub, Termination};
use crate::transport::BoxTransport;
use linerpc_protocol::{JsonCodec, LineFramer, TimestampedRequest};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, ReadHalf};
use tokio::sync::watch;

/// Everything the reader task owns. Built at connection init, started by the
/// hub on first subscription.
pub(crate) struct ReadLoop {
    pub(crate) reader: ReadHalf<BoxTransport>,
    pub(crate) framer: LineFramer,
    pub(crate) codec: Arc<JsonCodec>,
    pub(crate) read_buffer_size: usize,
    pub(crate) stop: watch::Receiver<bool>,
    pub(crate) core: Arc<ConnectionCore>,
}

impl ReadLoop {
    pub(crate) async fn run(self, hub: Arc<MulticastHub>) {
        let ReadLoop {
            mut reader,
            mut framer,
            codec,
            read_buffer_size,
            mut stop,
            core,
        } = self;
        let connection_id = core.connection_id();
        let mut buf = vec![0u8; read_buffer_size];

        let termination = 'read: loop {
            let n = tokio::select! {
                biased;

                _ = stopped(&mut stop) => {
                    tracing::debug!("[{}] Reader stopped", connection_id);
                    break 'read Termination::Completed;
                }

                result = reader.read(&mut buf) => match result {
                    Ok(0) => {
                        tracing::debug!("[{}] Connection closed by peer", connection_id);
                        break 'read Termination::Completed;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        // Read faults end the stream as if it were a clean close.
                        tracing::debug!("[{}] Read error: {}", connection_id, e);
                        break 'read Termination::Completed;
                    }
                },
            };

            tracing::debug!("[{}] Received {} bytes", connection_id, n);
            if let Err(e) = framer.push(&buf[..n]) {
                tracing::warn!("[{}] Flood violation: {}", connection_id, e);
                break 'read Termination::Failed(StreamError::FloodViolation {
                    connection_id: connection_id.to_string(),
                    threshold: framer.threshold(),
                });
            }

            while let Some(line) = framer.next_line() {
                let request = match line.and_then(|line| codec.decode(&line)) {
                    Ok(request) => request,
                    Err(e) => {
                        tracing::warn!("[{}] Undecodable frame: {}", connection_id, e);
                        break 'read Termination::Failed(StreamError::decode(connection_id, &e));
                    }
                };

                tracing::debug!(
                    "[{}] Request: {} (id={:?})",
                    connection_id,
                    request.method,
                    request.id
                );

                tokio::select! {
                    biased;
                    _ = stopped(&mut stop) => break 'read Termination::Completed,
                    _ = hub.publish(TimestampedRequest::now(request)) => {}
                }
            }
        };

        tokio::select! {
            biased;
            _ = stopped(&mut stop) => {}
            _ = hub.finish(termination) => {}
        }

        drop(reader);
        core.shutdown().await;
    }
}

/// Resolves once the stop flag is set or its sender is gone.
pub(crate) async fn stopped(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}
