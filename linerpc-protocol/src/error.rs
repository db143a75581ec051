//! Protocol error types and JSON-RPC error codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Protocol-level errors raised while framing or decoding a line.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("line buffer overflow: {size} bytes buffered without a newline (max {max})")]
    BufferOverflow { size: usize, max: usize },

    #[error("unsupported jsonrpc version: {0:?}")]
    UnsupportedVersion(Option<String>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid UTF-8 in line")]
    InvalidUtf8,

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

impl ProtocolError {
    /// Maps the error onto the JSON-RPC code a peer would expect.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ProtocolError::Json(e) if e.is_syntax() || e.is_eof() => ErrorCode::ParseError,
            ProtocolError::InvalidUtf8 => ErrorCode::ParseError,
            ProtocolError::Json(_)
            | ProtocolError::BufferOverflow { .. }
            | ProtocolError::UnsupportedVersion(_)
            | ProtocolError::MissingField(_) => ErrorCode::InvalidRequest,
        }
    }
}

/// Standard JSON-RPC 2.0 error codes.
///
/// Serialized as their numeric value; these are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorCode {
    /// Returns the numeric code sent on the wire.
    pub fn code(&self) -> i64 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
        }
    }

    /// Looks up a code by its numeric value.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -32700 => Some(ErrorCode::ParseError),
            -32600 => Some(ErrorCode::InvalidRequest),
            -32601 => Some(ErrorCode::MethodNotFound),
            -32602 => Some(ErrorCode::InvalidParams),
            -32603 => Some(ErrorCode::InternalError),
            _ => None,
        }
    }

    /// Default human-readable message for the code.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        ErrorCode::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown error code {}", code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::ParseError.code(), -32700);
        assert_eq!(ErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(ErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(ErrorCode::InvalidParams.code(), -32602);
        assert_eq!(ErrorCode::InternalError.code(), -32603);
        assert_eq!(ErrorCode::from_code(-32000), None);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::MethodNotFound).unwrap();
        assert_eq!(json, "-32601");

        let parsed: ErrorCode = serde_json::from_str("-32700").unwrap();
        assert_eq!(parsed, ErrorCode::ParseError);

        assert!(serde_json::from_str::<ErrorCode>("12").is_err());
    }

    #[test]
    fn test_protocol_error_codes() {
        let syntax = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        assert_eq!(
            ProtocolError::Json(syntax).error_code(),
            ErrorCode::ParseError
        );
        assert_eq!(ProtocolError::InvalidUtf8.error_code(), ErrorCode::ParseError);
        assert_eq!(
            ProtocolError::MissingField("method").error_code(),
            ErrorCode::InvalidRequest
        );
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::BufferOverflow {
            size: 9000,
            max: 8192,
        };
        let msg = err.to_string();
        assert!(msg.contains("9000"));
        assert!(msg.contains("8192"));

        let err = ProtocolError::UnsupportedVersion(Some("1.0".to_string()));
        assert!(err.to_string().contains("1.0"));

        let err = ProtocolError::MissingField("method");
        assert!(err.to_string().contains("method"));
    }
}
