//! Server state and notifications.

use crate::connection::Connection;
use crate::error::ServerError;
use std::fmt;
use std::sync::Arc;
use wuzzat_protocol::Message;

/// Listener lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Listening,
    Stopping,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Stopped => write!(f, "stopped"),
            ServerState::Starting => write!(f, "starting"),
            ServerState::Listening => write!(f, "listening"),
            ServerState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Notification delivered to server subscribers.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// `start()` resolved successfully.
    Started,
    /// `stop()` resolved.
    Stopped,
    /// A client connected and joined the roster.
    Connection(Arc<Connection>),
    /// A client's socket closed and it left the roster.
    Disconnection(Arc<Connection>),
    /// A whole frame arrived from `connection` and was deserialized.
    Data {
        connection: Arc<Connection>,
        message: Message,
    },
    /// An error, attributed to a connection when there is one.
    Error {
        connection: Option<Arc<Connection>>,
        error: Arc<ServerError>,
    },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Started => "started",
            ServerEvent::Stopped => "stopped",
            ServerEvent::Connection(_) => "connection",
            ServerEvent::Disconnection(_) => "disconnection",
            ServerEvent::Data { .. } => "data",
            ServerEvent::Error { .. } => "error",
        }
    }
}
