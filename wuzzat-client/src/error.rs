//! Client error types.

use std::io;
use thiserror::Error;
use wuzzat_protocol::{AddressError, FramingError, SerializationError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),

    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("socket error: {0}")]
    Socket(#[source] io::Error),

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

impl ClientError {
    /// Returns whether reconnecting may clear this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Connect { .. } | ClientError::Socket(_) | ClientError::Framing(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        let err = ClientError::Connect {
            address: "tcp://localhost:1".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("tcp://localhost:1"));

        assert!(ClientError::Socket(io::Error::from(io::ErrorKind::BrokenPipe)).is_retryable());

        let err: ClientError = AddressError::MissingPort("tcp://x".to_string()).into();
        assert!(!err.is_retryable());

        let err: ClientError = SerializationError::UnknownSerializer("xml".to_string()).into();
        assert!(!err.is_retryable());
    }
}
