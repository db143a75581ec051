//! Best-effort line writer.

use crate::reader::stopped;
use crate::transport::BoxTransport;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::sync::{watch, Mutex};

/// Write half of a connection's transport.
///
/// Writes are serialized so concurrent senders never interleave bytes within
/// a line. Failures are logged and dropped. Closing pre-empts a write that is
/// stuck on a peer that stopped reading.
pub(crate) struct Writer {
    connection_id: String,
    half: Mutex<Option<WriteHalf<BoxTransport>>>,
    closing: watch::Sender<bool>,
}

impl Writer {
    pub(crate) fn new(connection_id: impl Into<String>, half: WriteHalf<BoxTransport>) -> Self {
        Self {
            connection_id: connection_id.into(),
            half: Mutex::new(Some(half)),
            closing: watch::channel(false).0,
        }
    }

    /// Writes one encoded line. Never fails; a closed transport makes this a no-op.
    pub(crate) async fn write_line(&self, bytes: &[u8]) {
        let mut closing = self.closing.subscribe();

        let mut guard = tokio::select! {
            biased;
            _ = stopped(&mut closing) => {
                tracing::debug!(
                    "[{}] Transport closing, dropping {} bytes",
                    self.connection_id,
                    bytes.len()
                );
                return;
            }
            guard = self.half.lock() => guard,
        };
        let writer = match guard.as_mut() {
            Some(writer) => writer,
            None => {
                tracing::debug!(
                    "[{}] Transport closed, dropping {} bytes",
                    self.connection_id,
                    bytes.len()
                );
                return;
            }
        };

        let result = tokio::select! {
            biased;
            _ = stopped(&mut closing) => {
                tracing::debug!("[{}] Write abandoned, transport closing", self.connection_id);
                return;
            }
            result = async {
                writer.write_all(bytes).await?;
                writer.flush().await
            } => result,
        };
        if let Err(e) = result {
            tracing::debug!("[{}] Write failed: {}", self.connection_id, e);
        }
    }

    /// Shuts down and releases the write half. Returns false if already closed.
    ///
    /// Pending writes give up the half as soon as the close is signalled.
    pub(crate) async fn close(&self) -> bool {
        self.closing.send_replace(true);
        let half = self.half.lock().await.take();
        match half {
            Some(mut writer) => {
                if let Err(e) = writer.shutdown().await {
                    tracing::debug!("[{}] Shutdown failed: {}", self.connection_id, e);
                }
                true
            }
            None => false,
        }
    }
}
