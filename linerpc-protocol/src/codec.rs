//! JSON codec shared by the decode pipeline and the writer.

use crate::error::ProtocolError;
use crate::message::RpcRequest;
use crate::JSONRPC_VERSION;
use serde::{Deserialize, Serialize};

/// Codec settings, fixed for the lifetime of a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Reject requests whose `jsonrpc` field is missing or not `"2.0"`.
    pub require_version: bool,
}

/// Maps lines to requests and values to lines.
///
/// Output is always compact JSON so an encoded value never contains a raw
/// newline.
#[derive(Debug, Clone, Default)]
pub struct JsonCodec {
    config: CodecConfig,
}

impl JsonCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Decodes one framed line into a request.
    pub fn decode(&self, line: &str) -> Result<RpcRequest, ProtocolError> {
        let request: RpcRequest = serde_json::from_str(line)?;
        if request.method.is_empty() {
            return Err(ProtocolError::MissingField("method"));
        }
        if self.config.require_version && request.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
            return Err(ProtocolError::UnsupportedVersion(request.jsonrpc));
        }
        Ok(request)
    }

    /// Encodes a value as a single line, newline included.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        let mut bytes = serde_json::to_vec(value)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{RequestId, RpcResponse};

    #[test]
    fn test_decode_request() {
        let codec = JsonCodec::default();
        let req = codec
            .decode(r#"{"id":1,"method":"ping","params":[]}"#)
            .unwrap();
        assert_eq!(req.id, Some(RequestId::from(1i64)));
        assert_eq!(req.method, "ping");
    }

    #[test]
    fn test_decode_any_numeric_id() {
        let codec = JsonCodec::default();

        let fractional = codec
            .decode(r#"{"jsonrpc":"2.0","id":1.5,"method":"ping"}"#)
            .unwrap();
        assert_eq!(fractional.id.as_ref().map(|id| id.to_string()), Some("1.5".to_string()));

        let large = codec
            .decode(r#"{"jsonrpc":"2.0","id":18446744073709551615,"method":"ping"}"#)
            .unwrap();
        assert_eq!(large.id, Some(RequestId::from(u64::MAX)));

        let negative = codec.decode(r#"{"id":-7,"method":"ping"}"#).unwrap();
        assert_eq!(negative.id, Some(RequestId::from(-7i64)));

        // Echoed back unchanged.
        let resp = RpcResponse::ok(fractional.id, serde_json::json!("pong"));
        let line = String::from_utf8(codec.encode(&resp).unwrap()).unwrap();
        assert!(line.contains(r#""id":1.5"#));
    }

    #[test]
    fn test_decode_malformed() {
        let codec = JsonCodec::default();
        assert!(matches!(
            codec.decode("{not json"),
            Err(ProtocolError::Json(_))
        ));
        // Valid JSON, but no method.
        assert!(matches!(
            codec.decode(r#"{"id":1}"#),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            codec.decode(r#"{"id":1,"method":""}"#),
            Err(ProtocolError::MissingField("method"))
        ));
    }

    #[test]
    fn test_require_version() {
        let codec = JsonCodec::new(CodecConfig {
            require_version: true,
        });
        assert!(codec
            .decode(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
            .is_ok());

        match codec.decode(r#"{"id":1,"method":"ping"}"#) {
            Err(ProtocolError::UnsupportedVersion(None)) => {}
            other => panic!("unexpected: {other:?}"),
        }
        match codec.decode(r#"{"jsonrpc":"1.0","method":"ping"}"#) {
            Err(ProtocolError::UnsupportedVersion(Some(v))) => assert_eq!(v, "1.0"),
            other => panic!("unexpected: {other:?}"),
        }

        // Lenient by default.
        assert!(JsonCodec::default()
            .decode(r#"{"jsonrpc":"1.0","method":"ping"}"#)
            .is_ok());
    }

    #[test]
    fn test_encode_is_single_line() {
        let codec = JsonCodec::default();
        let resp = RpcResponse::ok(
            Some(RequestId::from("a")),
            serde_json::json!({"text": "line one\nline two", "nested": {"k": [1, 2]}}),
        );
        let bytes = codec.encode(&resp).unwrap();

        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn test_encode_then_decode_request() {
        let codec = JsonCodec::default();
        let req = RpcRequest::new("r-9", "echo").with_params(serde_json::json!({"v": true}));
        let bytes = codec.encode(&req).unwrap();
        let line = std::str::from_utf8(&bytes).unwrap().trim();

        assert_eq!(codec.decode(line).unwrap(), req);
    }
}
