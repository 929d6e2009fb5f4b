//! Error types for decoding push events and wire records.
//!
//! Decoding fails closed: any payload that does not match the canonical
//! schema produces a [`ProtocolError`] and is never partially applied.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while decoding inbound payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload is not valid JSON or does not match the record shape
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A required field is present but empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Timestamp string matches none of the accepted formats
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// Numeric timestamp cannot be represented as an instant
    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),

    /// Message kind outside the known set
    #[error("unknown message kind: {0:?}")]
    UnknownKind(String),

    /// Push event with a name outside the known set
    #[error("unknown push event: {0:?}")]
    UnknownEvent(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
