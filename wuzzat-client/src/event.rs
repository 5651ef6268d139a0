//! Client state and notifications.

use crate::error::ClientError;
use std::fmt;
use std::sync::Arc;
use wuzzat_protocol::Message;

/// Connection state of a [`Client`](crate::Client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClientState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientState::Disconnected => write!(f, "disconnected"),
            ClientState::Connecting => write!(f, "connecting"),
            ClientState::Connected => write!(f, "connected"),
        }
    }
}

/// Notification delivered to client subscribers.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The socket connected; queued writes are flowing.
    Connected,
    /// The socket is gone.
    ///
    /// `established` is false when the connect attempt itself failed and true
    /// when a live connection dropped.
    Disconnected {
        error: Option<Arc<ClientError>>,
        established: bool,
    },
    /// A whole frame arrived and was deserialized.
    Data(Message),
    /// A non-fatal or about-to-be-fatal error.
    Error(Arc<ClientError>),
}

impl ClientEvent {
    /// Short event name, matching the notification names used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Connected => "connected",
            ClientEvent::Disconnected { .. } => "disconnected",
            ClientEvent::Data(_) => "data",
            ClientEvent::Error(_) => "error",
        }
    }
}
