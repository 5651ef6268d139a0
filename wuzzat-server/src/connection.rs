//! Server-side view of one accepted client socket.

use crate::error::ServerError;
use crate::event::ServerEvent;
use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;
use wuzzat_protocol::{EventBus, FrameCodec, Message, Serializer};

/// Live connections keyed by connection id.
pub type Roster = DashMap<Uuid, Arc<Connection>>;

/// Everything a connection task needs from its server.
pub(crate) struct ConnectionContext {
    pub events: EventBus<ServerEvent>,
    pub roster: Arc<Roster>,
    pub serializer: Arc<dyn Serializer>,
    pub framing: FrameCodec,
    pub read_buffer_size: usize,
    pub nodelay: bool,
}

/// One accepted client socket.
///
/// Writes are queued to the task that owns the socket. Once the connection
/// closes, further writes are dropped.
pub struct Connection {
    id: Uuid,
    peer: SocketAddr,
    serializer: Arc<dyn Serializer>,
    framing: FrameCodec,
    events: EventBus<ServerEvent>,
    outbound: mpsc::UnboundedSender<Bytes>,
    closing: Notify,
    closed: AtomicBool,
    this: Weak<Connection>,
}

impl Connection {
    /// Registers an accepted socket in the roster and starts its I/O task.
    pub(crate) fn spawn(
        stream: TcpStream,
        peer: SocketAddr,
        ctx: Arc<ConnectionContext>,
    ) -> Arc<Connection> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let connection = Arc::new_cyclic(|this| Connection {
            id: Uuid::new_v4(),
            peer,
            serializer: ctx.serializer.clone(),
            framing: ctx.framing,
            events: ctx.events.clone(),
            outbound: outbound_tx,
            closing: Notify::new(),
            closed: AtomicBool::new(false),
            this: this.clone(),
        });

        if ctx.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!("[{}] Failed to set TCP_NODELAY: {}", peer, e);
            }
        }

        ctx.roster.insert(connection.id, connection.clone());
        tracing::info!("Client connected: {} (id={})", peer, connection.id);
        ctx.events.emit(ServerEvent::Connection(connection.clone()));

        tokio::spawn(run(connection.clone(), stream, outbound_rx, ctx));
        connection
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remote IP address.
    pub fn address(&self) -> IpAddr {
        self.peer.ip()
    }

    /// Remote port.
    pub fn port(&self) -> u16 {
        self.peer.port()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Frames `payload` and queues it for the socket.
    ///
    /// Returns false if nothing was queued, either because the connection is
    /// closed or because the payload cannot be framed. Framing failures are
    /// also published as an `Error` event.
    pub fn write(&self, payload: impl Into<Bytes>) -> bool {
        if self.is_closed() {
            tracing::trace!("[{}] Dropping write on closed connection", self.peer);
            return false;
        }

        let payload = payload.into();
        match self.framing.encode(&payload) {
            Ok(frame) => self.outbound.send(frame).is_ok(),
            Err(e) => {
                tracing::warn!("[{}] Dropping unframeable write: {}", self.peer, e);
                self.report(e.into());
                false
            }
        }
    }

    /// Serializes `value` with the server's serializer and writes it.
    pub fn send(&self, value: &Value) -> bool {
        match self.serializer.serialize(value) {
            Ok(payload) => self.write(payload),
            Err(e) => {
                tracing::warn!("[{}] {}", self.peer, e);
                self.report(e.into());
                false
            }
        }
    }

    /// Like [`send`](Self::send) for any `Serialize` type.
    pub fn send_as<T: Serialize + ?Sized>(&self, value: &T) -> bool {
        match self.serializer.serialize_as(value) {
            Ok(payload) => self.write(payload),
            Err(e) => {
                tracing::warn!("[{}] {}", self.peer, e);
                self.report(e.into());
                false
            }
        }
    }

    /// Closes the socket. Queued writes that have not reached the socket are
    /// discarded. Calling this more than once has no further effect.
    pub fn disconnect(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("[{}] Disconnecting", self.peer);
        self.closing.notify_one();
    }

    fn report(&self, error: ServerError) {
        self.events.emit(ServerEvent::Error {
            connection: self.this.upgrade(),
            error: Arc::new(error),
        });
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Owns the socket until either side closes it.
async fn run(
    connection: Arc<Connection>,
    stream: TcpStream,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    ctx: Arc<ConnectionContext>,
) {
    let peer = connection.peer;
    let (mut reader, mut writer) = stream.into_split();
    let mut decoder = ctx.framing.decoder();
    let mut buf = vec![0u8; ctx.read_buffer_size.max(1)];

    let result: Result<(), ServerError> = loop {
        tokio::select! {
            biased;

            _ = connection.closing.notified() => {
                tracing::debug!("[{}] Closed locally", peer);
                break Ok(());
            }

            Some(frame) = outbound.recv() => {
                // disconnect() cancels a write the peer is not draining.
                let written = tokio::select! {
                    biased;
                    _ = connection.closing.notified() => None,
                    result = writer.write_all(&frame) => Some(result),
                };
                match written {
                    None => {
                        tracing::debug!("[{}] Closed locally with a write in flight", peer);
                        break Ok(());
                    }
                    Some(Err(e)) => break Err(ServerError::Socket(e)),
                    Some(Ok(())) => {}
                }
            }

            result = reader.read(&mut buf) => match result {
                Ok(0) => {
                    tracing::debug!("[{}] Connection closed by client", peer);
                    break Ok(());
                }
                Ok(n) => {
                    tracing::debug!("[{}] Received {} bytes", peer, n);
                    decoder.extend(&buf[..n]);
                    if let Err(e) = dispatch_frames(&connection, &mut decoder, &ctx) {
                        break Err(e);
                    }
                }
                Err(e) => break Err(ServerError::Socket(e)),
            },
        }
    };

    if let Err(e) = result {
        tracing::warn!("[{}] Connection error: {}", peer, e);
        ctx.events.emit(ServerEvent::Error {
            connection: Some(connection.clone()),
            error: Arc::new(e),
        });
    }

    // Both halves drop here, closing the socket.
    drop(reader);
    drop(writer);
    connection.disconnect();

    if ctx.roster.remove(&connection.id).is_some() {
        tracing::info!("Client disconnected: {} (id={})", peer, connection.id);
    }
    ctx.events.emit(ServerEvent::Disconnection(connection));
}

/// Emits a `Data` event per complete frame. A framing error is returned and
/// ends the connection; an undecodable payload is only reported.
fn dispatch_frames(
    connection: &Arc<Connection>,
    decoder: &mut wuzzat_protocol::FrameDecoder,
    ctx: &ConnectionContext,
) -> Result<(), ServerError> {
    while let Some(payload) = decoder.decode_frame()? {
        match ctx.serializer.deserialize(&payload) {
            Ok(value) => ctx.events.emit(ServerEvent::Data {
                connection: connection.clone(),
                message: Message::new(payload, value),
            }),
            Err(e) => {
                tracing::warn!("[{}] Failed to deserialize frame: {}", connection.peer, e);
                ctx.events.emit(ServerEvent::Error {
                    connection: Some(connection.clone()),
                    error: Arc::new(e.into()),
                });
            }
        }
    }
    Ok(())
}
