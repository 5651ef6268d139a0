//! Server error types.

use std::io;
use thiserror::Error;
use wuzzat_protocol::{AddressError, FramingError, SerializationError};

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("accept error: {0}")]
    Accept(#[source] io::Error),

    #[error("socket error: {0}")]
    Socket(#[source] io::Error),

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

impl ServerError {
    /// Returns whether the error closed the connection it occurred on.
    pub fn is_fatal_for_connection(&self) -> bool {
        matches!(self, ServerError::Socket(_) | ServerError::Framing(_))
    }
}
