//! Request handlers.

use linerpc_protocol::{ErrorCode, RpcErrorObject, RpcResponse, TimestampedRequest, JSONRPC_VERSION};
use serde_json::{json, Value};

/// Turns a decoded request into an optional reply.
///
/// Returning `None` sends nothing back. Handlers run on the connection's
/// dispatch task, so they should not block.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, request: &TimestampedRequest) -> Option<RpcResponse>;
}

impl<F> RequestHandler for F
where
    F: Fn(&TimestampedRequest) -> Option<RpcResponse> + Send + Sync + 'static,
{
    fn handle(&self, request: &TimestampedRequest) -> Option<RpcResponse> {
        self(request)
    }
}

/// Server identity reported by `server.info`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub max_line_bytes: usize,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "linerpc".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            max_line_bytes: linerpc_protocol::DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

/// Handler for the methods every server answers.
#[derive(Debug, Clone, Default)]
pub struct BuiltinHandler {
    info: ServerInfo,
}

impl BuiltinHandler {
    pub fn new(info: ServerInfo) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    fn dispatch(&self, request: &TimestampedRequest) -> Result<Value, RpcErrorObject> {
        match request.method() {
            "ping" => Ok(json!("pong")),
            "echo" => Ok(request.params().clone()),
            "server.info" => Ok(json!({
                "name": self.info.name,
                "version": self.info.version,
                "protocol": JSONRPC_VERSION,
                "max_line_bytes": self.info.max_line_bytes,
            })),
            method => Err(RpcErrorObject::new(
                ErrorCode::MethodNotFound,
                format!("method not found: {}", method),
            )),
        }
    }
}

impl RequestHandler for BuiltinHandler {
    fn handle(&self, request: &TimestampedRequest) -> Option<RpcResponse> {
        let result = self.dispatch(request);

        // Notifications never get a reply, not even an error.
        let id = request.id()?.clone();
        Some(match result {
            Ok(value) => RpcResponse::ok(Some(id), value),
            Err(error) => RpcResponse::error(Some(id), error),
        })
    }
}
