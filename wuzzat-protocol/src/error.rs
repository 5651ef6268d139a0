//! Protocol error types.

use thiserror::Error;

/// Errors raised while delimiting frames on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("payload contains the frame delimiter {delimiter:#04x} at offset {offset}")]
    DelimiterInPayload { delimiter: u8, offset: usize },
}

/// Errors raised by a [`Serializer`](crate::Serializer) implementation.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    #[error("unknown serializer: {0}")]
    UnknownSerializer(String),
}

/// Errors raised while parsing a `scheme://hostname:port` address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("missing scheme in address '{0}' (expected scheme://hostname:port)")]
    MissingScheme(String),

    #[error("invalid scheme '{0}'")]
    InvalidScheme(String),

    #[error("missing hostname in address '{0}'")]
    MissingHost(String),

    #[error("missing port in address '{0}'")]
    MissingPort(String),

    #[error("invalid port '{0}'")]
    InvalidPort(String),
}
