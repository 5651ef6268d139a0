//! High-level client API.

use crate::driver::{Command, Driver, Shared};
use crate::error::ClientError;
use crate::event::{ClientEvent, ClientState};
use crate::options::ClientOptions;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use wuzzat_protocol::{Address, EventBus, FrameCodec, Serializer};

/// A framed TCP client with a single outbound connection.
///
/// Writes are accepted in every state. While disconnected they queue up and
/// are flushed in order once a socket connects. Dropping the client closes the
/// socket and cancels any pending reconnect.
pub struct Client {
    address: Address,
    serializer: Arc<dyn Serializer>,
    framing: FrameCodec,
    buffer_size: usize,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ClientState>,
    events: EventBus<ClientEvent>,
}

impl Client {
    /// Creates a client for `address` (e.g. `tcp://localhost:5666`).
    ///
    /// Returns the client together with an event receiver subscribed before
    /// any I/O starts. Must be called from within a tokio runtime.
    pub fn new(
        address: &str,
        options: ClientOptions,
    ) -> Result<(Self, broadcast::Receiver<ClientEvent>), ClientError> {
        let address = Address::parse(address)?;
        Ok(Self::with_address(address, options))
    }

    /// Creates a client for an already parsed address.
    pub fn with_address(
        address: Address,
        options: ClientOptions,
    ) -> (Self, broadcast::Receiver<ClientEvent>) {
        let events = EventBus::new(options.event_capacity);
        let receiver = events.subscribe();
        let shared = Arc::new(Shared::default());
        let (state_tx, state_rx) = watch::channel(ClientState::Disconnected);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let client = Self {
            address: address.clone(),
            serializer: options.serializer.clone(),
            framing: options.framing,
            buffer_size: options.buffer_size,
            shared: shared.clone(),
            commands: command_tx,
            state: state_rx,
            events: events.clone(),
        };

        if options.auto_connect {
            client.connect();
        }

        let driver = Driver::new(address, options, shared, state_tx, events, command_rx);
        tokio::spawn(driver.run());

        (client, receiver)
    }

    /// Subscribes to client events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Starts connecting unless a connection attempt or live socket already exists.
    pub fn connect(&self) {
        // The driver only stops once every handle is dropped.
        let _ = self.commands.send(Command::Connect);
    }

    /// Queues raw payload bytes as one frame.
    ///
    /// Returns false once the unflushed bytes reach the configured buffer
    /// size. The frame is queued either way.
    pub fn write(&self, payload: impl Into<Bytes>) -> bool {
        let payload = payload.into();
        match self.framing.encode(&payload) {
            Ok(frame) => self.enqueue(frame),
            Err(e) => {
                tracing::warn!("[{}] Dropping unframeable write: {}", self.address, e);
                self.events.emit(ClientEvent::Error(Arc::new(e.into())));
                false
            }
        }
    }

    /// Serializes `value` with the configured serializer and queues it.
    ///
    /// Serialization failures are reported as an `Error` event and nothing is
    /// queued.
    pub fn send(&self, value: &Value) -> bool {
        match self.serializer.serialize(value) {
            Ok(payload) => self.write(payload),
            Err(e) => self.report_serialization_error(e.into()),
        }
    }

    /// Like [`send`](Self::send) for any `Serialize` type.
    pub fn send_as<T: Serialize + ?Sized>(&self, value: &T) -> bool {
        match self.serializer.serialize_as(value) {
            Ok(payload) => self.write(payload),
            Err(e) => self.report_serialization_error(e.into()),
        }
    }

    fn report_serialization_error(&self, error: ClientError) -> bool {
        tracing::warn!("[{}] {}", self.address, error);
        self.events.emit(ClientEvent::Error(Arc::new(error)));
        false
    }

    fn enqueue(&self, frame: Bytes) -> bool {
        let below_mark = {
            let mut queue = self.shared.queue.lock();
            queue.push(frame);
            queue.queued_bytes() < self.buffer_size
        };
        self.shared.queued.notify_one();
        below_mark
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn hostname(&self) -> &str {
        self.address.hostname()
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    /// Uppercased scheme, e.g. `TCP`.
    pub fn protocol(&self) -> String {
        self.address.protocol()
    }

    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    pub fn is_disconnected(&self) -> bool {
        self.state() == ClientState::Disconnected
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ClientState::Connected
    }

    /// Waits until the client reaches `state`.
    pub async fn wait_for_state(&self, state: ClientState) {
        let mut rx = self.state.clone();
        let _ = rx.wait_for(|current| *current == state).await;
    }

    /// Returns the number of bytes queued but not yet written to a socket.
    pub fn queued_bytes(&self) -> usize {
        self.shared.queue.lock().queued_bytes()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.address.to_string())
            .field("state", &self.state())
            .field("serializer", &self.serializer.name())
            .field("framing", &self.framing.kind())
            .field("queued_bytes", &self.queued_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_address_properties() {
        let (client, _events) = Client::new(
            "tcp://localhost:5666",
            ClientOptions::new().with_auto_connect(false),
        )
        .unwrap();

        assert_eq!(client.protocol(), "TCP");
        assert_eq!(client.hostname(), "localhost");
        assert_eq!(client.port(), 5666);
        assert!(client.is_disconnected());
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let result = Client::new("localhost", ClientOptions::new());
        assert!(matches!(result, Err(ClientError::Address(_))));
    }

    #[tokio::test]
    async fn test_writes_queue_while_disconnected() {
        let (client, _events) = Client::new(
            "tcp://127.0.0.1:1",
            ClientOptions::new()
                .with_auto_connect(false)
                .with_buffer_size(16),
        )
        .unwrap();

        // 4-byte prefix + 2-byte payload per frame
        assert!(client.write(&b"w1"[..]));
        assert!(client.write(&b"w2"[..]));
        assert_eq!(client.queued_bytes(), 12);
        assert!(!client.write(&b"w3"[..]));
        assert_eq!(client.queued_bytes(), 18);
        assert!(client.is_disconnected());
    }

    #[tokio::test]
    async fn test_unframeable_write_reports_error() {
        let (client, mut events) = Client::new(
            "tcp://127.0.0.1:1",
            ClientOptions::new()
                .with_auto_connect(false)
                .with_framing(FrameCodec::delimited(0xFF)),
        )
        .unwrap();

        assert!(!client.write(vec![0x01, 0xFF]));
        assert_eq!(client.queued_bytes(), 0);
        match events.recv().await.unwrap() {
            ClientEvent::Error(err) => assert!(matches!(*err, ClientError::Framing(_))),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_serializes() {
        let (client, _events) = Client::new(
            "tcp://127.0.0.1:1",
            ClientOptions::new().with_auto_connect(false),
        )
        .unwrap();

        let value = serde_json::json!({"method": "pants", "params": [1, 2, 3, 4]});
        client.send(&value);
        let expected = serde_json::to_vec(&value).unwrap().len() + 4;
        assert_eq!(client.queued_bytes(), expected);
    }
}
