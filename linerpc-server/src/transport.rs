//! Byte stream abstraction for connections.

use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;

/// A connected, ordered, reliable byte stream.
///
/// Accept/connect happens before a transport reaches a connection; the
/// connection only reads, writes, and closes it.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Peer address, if the transport has one.
    fn remote_endpoint(&self) -> Option<SocketAddr>;
}

impl Transport for TcpStream {
    fn remote_endpoint(&self) -> Option<SocketAddr> {
        self.peer_addr().ok()
    }
}

/// In-memory pipe, used for tests and in-process peers.
impl Transport for DuplexStream {
    fn remote_endpoint(&self) -> Option<SocketAddr> {
        None
    }
}

/// Boxed transport as stored by a connection.
pub type BoxTransport = Box<dyn Transport>;
