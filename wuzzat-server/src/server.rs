//! TCP server implementation.

use crate::connection::{Connection, ConnectionContext, Roster};
use crate::error::ServerError;
use crate::event::{ServerEvent, ServerState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;
use wuzzat_protocol::{
    default_serializer, Address, EventBus, FrameCodec, Serializer, DEFAULT_EVENT_CAPACITY,
    DEFAULT_READ_BUFFER_SIZE,
};

/// Server options.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Object codec for inbound frames and `Connection::send`.
    pub serializer: Arc<dyn Serializer>,
    /// Frame layout on the wire.
    pub framing: FrameCodec,
    /// Undelivered events buffered per subscriber.
    pub event_capacity: usize,
    /// Read buffer size per connection.
    pub read_buffer_size: usize,
    /// Maximum concurrent connections (`None` = unlimited).
    pub max_connections: Option<usize>,
    /// Set TCP_NODELAY on accepted sockets.
    pub nodelay: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            serializer: default_serializer(),
            framing: FrameCodec::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_connections: None,
            nodelay: true,
        }
    }
}

impl ServerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_framing(mut self, framing: FrameCodec) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_read_buffer_size(mut self, bytes: usize) -> Self {
        self.read_buffer_size = bytes.max(1);
        self
    }
}

/// Running accept loop.
struct Listener {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Framed TCP server.
///
/// `start` and `stop` are idempotent and serialized against each other; every
/// call that resolves publishes a `Started` or `Stopped` event.
pub struct Server {
    address: Address,
    options: ServerOptions,
    events: EventBus<ServerEvent>,
    roster: Arc<Roster>,
    state: watch::Sender<ServerState>,
    listener: tokio::sync::Mutex<Option<Listener>>,
    local_addr: parking_lot::Mutex<Option<SocketAddr>>,
}

impl Server {
    /// Creates a stopped server for `address` (e.g. `tcp://0.0.0.0:5666`).
    pub fn new(address: &str, options: ServerOptions) -> Result<Self, ServerError> {
        let address = Address::parse(address)?;
        Ok(Self::with_address(address, options))
    }

    pub fn with_address(address: Address, options: ServerOptions) -> Self {
        let (state, _) = watch::channel(ServerState::Stopped);
        Self {
            address,
            events: EventBus::new(options.event_capacity),
            options,
            roster: Arc::new(Roster::new()),
            state,
            listener: tokio::sync::Mutex::new(None),
            local_addr: parking_lot::Mutex::new(None),
        }
    }

    /// Subscribes to server events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Binds the listener and starts accepting connections.
    ///
    /// Resolves immediately if the server is already listening.
    pub async fn start(&self) -> Result<(), ServerError> {
        let mut slot = self.listener.lock().await;
        if slot.is_some() {
            tracing::debug!("start() called while already listening");
            self.events.emit(ServerEvent::Started);
            return Ok(());
        }

        self.state.send_replace(ServerState::Starting);
        let listener = match self.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("{}", e);
                self.state.send_replace(ServerState::Stopped);
                return Err(e);
            }
        };
        let local_addr = listener.local_addr;
        *slot = Some(listener);
        *self.local_addr.lock() = Some(local_addr);
        self.state.send_replace(ServerState::Listening);

        tracing::info!(
            "{} server listening on {} ({}, {} framing)",
            self.address.protocol(),
            local_addr,
            self.options.serializer.name(),
            self.options.framing.kind()
        );
        self.events.emit(ServerEvent::Started);
        Ok(())
    }

    async fn bind(&self) -> Result<Listener, ServerError> {
        let bind_error = |source| ServerError::Bind {
            address: self.address.to_string(),
            source,
        };
        let listener = TcpListener::bind(self.address.socket_target())
            .await
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let ctx = Arc::new(ConnectionContext {
            events: self.events.clone(),
            roster: self.roster.clone(),
            serializer: self.options.serializer.clone(),
            framing: self.options.framing,
            read_buffer_size: self.options.read_buffer_size,
            nodelay: self.options.nodelay,
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(
            listener,
            shutdown_rx,
            ctx,
            self.options.max_connections,
        ));

        Ok(Listener {
            local_addr,
            shutdown: shutdown_tx,
            task,
        })
    }

    /// Alias for [`start`](Self::start).
    pub async fn run(&self) -> Result<(), ServerError> {
        self.start().await
    }

    /// Closes the listener and every connection in the roster.
    ///
    /// Stopping a server that is not listening only publishes `Stopped`.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let mut slot = self.listener.lock().await;
        if let Some(listener) = slot.take() {
            self.state.send_replace(ServerState::Stopping);
            tracing::info!("Server shutting down");

            let _ = listener.shutdown.send(());
            if let Err(e) = listener.task.await {
                tracing::error!("Accept loop failed: {}", e);
            }

            let connections: Vec<Arc<Connection>> =
                self.roster.iter().map(|entry| entry.value().clone()).collect();
            self.roster.clear();
            for connection in &connections {
                connection.disconnect();
            }

            *self.local_addr.lock() = None;
            self.state.send_replace(ServerState::Stopped);
            tracing::info!("Server stopped ({} connections closed)", connections.len());
        } else {
            tracing::debug!("stop() called while not listening");
        }

        self.events.emit(ServerEvent::Stopped);
        Ok(())
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn hostname(&self) -> &str {
        self.address.hostname()
    }

    /// Configured port. See [`local_addr`](Self::local_addr) for the bound port.
    pub fn port(&self) -> u16 {
        self.address.port()
    }

    /// Uppercased scheme, e.g. `TCP`.
    pub fn protocol(&self) -> String {
        self.address.protocol()
    }

    /// Address the listener is bound to while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    pub fn is_listening(&self) -> bool {
        self.state() == ServerState::Listening
    }

    /// Waits until the server reaches `state`.
    pub async fn wait_for_state(&self, state: ServerState) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|current| *current == state).await;
    }

    /// Returns a snapshot of the live connections.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.roster
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn connection(&self, id: &Uuid) -> Option<Arc<Connection>> {
        self.roster.get(id).map(|entry| entry.value().clone())
    }

    pub fn connection_count(&self) -> usize {
        self.roster.len()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        // The accept loop ends when its shutdown sender is dropped.
        for entry in self.roster.iter() {
            entry.value().disconnect();
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.address.to_string())
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .field("connections", &self.connection_count())
            .finish()
    }
}

async fn accept_loop(
    listener: TcpListener,
    mut shutdown: oneshot::Receiver<()>,
    ctx: Arc<ConnectionContext>,
    max_connections: Option<usize>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    if let Some(max) = max_connections {
                        if ctx.roster.len() >= max {
                            tracing::warn!("Connection limit reached, rejecting {}", peer);
                            continue;
                        }
                    }
                    Connection::spawn(stream, peer, ctx.clone());
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                    ctx.events.emit(ServerEvent::Error {
                        connection: None,
                        error: Arc::new(ServerError::Accept(e)),
                    });
                }
            },
        }
    }
    tracing::debug!("Listener closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_address() {
        let result = Server::new("0.0.0.0:5666", ServerOptions::new());
        assert!(matches!(result, Err(ServerError::Address(_))));
    }

    #[test]
    fn test_address_properties() {
        let server = Server::new("tcp://0.0.0.0:5666", ServerOptions::new()).unwrap();
        assert_eq!(server.protocol(), "TCP");
        assert_eq!(server.hostname(), "0.0.0.0");
        assert_eq!(server.port(), 5666);
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(server.local_addr().is_none());
        assert_eq!(server.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_start_stop_transitions() {
        let server = Server::new("tcp://127.0.0.1:0", ServerOptions::new()).unwrap();
        let mut events = server.subscribe();

        server.start().await.unwrap();
        server.wait_for_state(ServerState::Listening).await;
        assert!(server.is_listening());
        let bound = server.local_addr().unwrap();
        assert_ne!(bound.port(), 0);
        assert!(matches!(events.recv().await.unwrap(), ServerEvent::Started));

        server.stop().await.unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(server.local_addr().is_none());
        assert!(matches!(events.recv().await.unwrap(), ServerEvent::Stopped));

        // The port is released.
        let rebound = TcpListener::bind(bound).await;
        assert!(rebound.is_ok());
    }
}
