//! Server and connection error types.

use linerpc_protocol::{ErrorCode, ProtocolError};
use thiserror::Error;

/// Terminal failure of a connection's request stream.
///
/// Cloned to every subscriber attached when the stream fails, so it carries
/// rendered reasons rather than source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("[{connection_id}] message exceeded {threshold} bytes without a newline")]
    FloodViolation {
        connection_id: String,
        threshold: usize,
    },

    #[error("[{connection_id}] failed to decode frame: {reason}")]
    Decode {
        connection_id: String,
        code: ErrorCode,
        reason: String,
    },
}

impl StreamError {
    pub(crate) fn decode(connection_id: &str, err: &ProtocolError) -> Self {
        StreamError::Decode {
            connection_id: connection_id.to_string(),
            code: err.error_code(),
            reason: err.to_string(),
        }
    }

    pub fn connection_id(&self) -> &str {
        match self {
            StreamError::FloodViolation { connection_id, .. }
            | StreamError::Decode { connection_id, .. } => connection_id,
        }
    }

    /// Converts to the JSON-RPC code a peer would be told.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            StreamError::FloodViolation { .. } => ErrorCode::InvalidRequest,
            StreamError::Decode { code, .. } => *code,
        }
    }
}

/// Errors raised synchronously at the connection API boundary.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("no Tokio runtime to run the reader on")]
    NoRuntime,
}

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("server shutting down")]
    ShuttingDown,
}
