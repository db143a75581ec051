//! # linerpc-protocol
//!
//! Wire protocol for linerpc: JSON-RPC requests, one per line.
//!
//! This crate provides:
//! - Newline framing with a flood threshold
//! - JSON-RPC request/response types
//! - The JSON codec shared by readers and writers
//! - Error codes

pub mod codec;
pub mod error;
pub mod framer;
pub mod message;

pub use codec::{CodecConfig, JsonCodec};
pub use error::{ErrorCode, ProtocolError};
pub use framer::LineFramer;
pub use message::{RequestId, RpcErrorObject, RpcRequest, RpcResponse, TimestampedRequest};

/// Value of the `jsonrpc` field.
pub const JSONRPC_VERSION: &str = "2.0";

/// Default port for the linerpc server.
pub const DEFAULT_PORT: u16 = 7402;

/// Default flood threshold: maximum undelimited input (8 KiB).
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 8 * 1024;
