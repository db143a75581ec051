//! # linerpc-server
//!
//! Connection handling and TCP server for linerpc.
//!
//! This crate provides:
//! - `Connection`: a transport bound to a line framer, a lazily started
//!   multicast of decoded requests, and a best-effort writer
//! - Request dispatch through the `RequestHandler` trait
//! - A TCP server with a live connection registry
//! - YAML/env configuration

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod hub;
pub mod server;
pub mod transport;

mod reader;
mod writer;

pub use config::{Config, ConfigError, ConnectionConfig, NetworkConfig};
pub use connection::{Connection, ConnectionBuilder, ConnectionState};
pub use error::{ConnectionError, ServerError, StreamError};
pub use handler::{BuiltinHandler, RequestHandler, ServerInfo};
pub use hub::{Subscription, Termination};
pub use server::{Server, ServerConfig, ServerStats};
pub use transport::{BoxTransport, Transport};
