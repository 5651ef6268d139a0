//! Background task that owns the client socket and drives its state machine.
//!
//! All socket I/O, the frame decoder, and the reconnect timer live on this one
//! task. The [`Client`](crate::Client) handle only enqueues frames and sends
//! commands.

use crate::error::ClientError;
use crate::event::{ClientEvent, ClientState};
use crate::options::{ClientOptions, MAX_READ_BUFFER_SIZE, MIN_READ_BUFFER_SIZE};
use crate::queue::OutboundQueue;
use parking_lot::Mutex;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::Instant;
use wuzzat_protocol::{Address, EventBus, FrameDecoder, Message};

type ConnectFuture = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send>>;

/// Commands sent from the handle to the driver.
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
}

/// State shared between the handle and the driver.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub queue: Mutex<OutboundQueue>,
    /// Signalled whenever a frame is enqueued.
    pub queued: Notify,
}

pub(crate) struct Driver {
    address: Address,
    options: ClientOptions,
    shared: Arc<Shared>,
    state: watch::Sender<ClientState>,
    events: EventBus<ClientEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    socket: Option<TcpStream>,
    connecting: Option<ConnectFuture>,
    decoder: FrameDecoder,
    reconnect_at: Option<Instant>,
    read_buf: Vec<u8>,
}

impl Driver {
    pub(crate) fn new(
        address: Address,
        options: ClientOptions,
        shared: Arc<Shared>,
        state: watch::Sender<ClientState>,
        events: EventBus<ClientEvent>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let decoder = options.framing.decoder();
        let read_buf = vec![
            0u8;
            options
                .read_buffer_size
                .clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE)
        ];
        Self {
            address,
            options,
            shared,
            state,
            events,
            commands,
            socket: None,
            connecting: None,
            decoder,
            reconnect_at: None,
            read_buf,
        }
    }

    /// Runs until every client handle is dropped.
    pub(crate) async fn run(mut self) {
        loop {
            let has_output = self.socket.is_some() && !self.shared.queue.lock().is_empty();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => self.connect(),
                    None => break,
                },
                result = poll_connect(&mut self.connecting) => self.on_connect_result(result),
                _ = sleep_until(self.reconnect_at) => {
                    tracing::debug!("[{}] Reconnecting", self.address);
                    self.reconnect_at = None;
                    self.connect();
                }
                result = readable(&self.socket) => match result {
                    Ok(()) => self.on_readable(),
                    Err(e) => self.on_socket_error(e),
                },
                result = writable(&self.socket), if has_output => match result {
                    Ok(()) => self.flush(),
                    Err(e) => self.on_socket_error(e),
                },
                _ = self.shared.queued.notified() => {}
            }
        }

        tracing::debug!("[{}] Client dropped, closing", self.address);
        self.socket = None;
        self.connecting = None;
        self.state.send_replace(ClientState::Disconnected);
    }

    fn current_state(&self) -> ClientState {
        *self.state.borrow()
    }

    fn set_state(&self, state: ClientState) {
        self.state.send_replace(state);
    }

    /// Starts a connect attempt unless one is in progress or a socket is live.
    fn connect(&mut self) {
        if self.current_state() != ClientState::Disconnected {
            tracing::debug!(
                "[{}] connect() ignored while {}",
                self.address,
                self.current_state()
            );
            return;
        }

        // This attempt stands in for any retry still pending.
        self.reconnect_at = None;
        self.set_state(ClientState::Connecting);
        tracing::debug!("[{}] Connecting...", self.address);

        let host = self.address.hostname().to_string();
        let port = self.address.port();
        self.connecting = Some(Box::pin(TcpStream::connect((host, port))));
    }

    fn on_connect_result(&mut self, result: io::Result<TcpStream>) {
        self.connecting = None;

        match result {
            Ok(stream) => {
                if self.options.nodelay {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!("[{}] Failed to set TCP_NODELAY: {}", self.address, e);
                    }
                }
                self.socket = Some(stream);
                self.decoder.clear();
                self.set_state(ClientState::Connected);

                let queued = self.shared.queue.lock().queued_bytes();
                tracing::info!(
                    "{} connection established with {} ({} bytes queued)",
                    self.address.protocol(),
                    self.address,
                    queued
                );
                self.events.emit(ClientEvent::Connected);
            }
            Err(e) => {
                tracing::warn!("Connection with {} failed: {}", self.address, e);
                let error = Arc::new(ClientError::Connect {
                    address: self.address.to_string(),
                    source: e,
                });
                self.on_disconnected(Some(error), false);
            }
        }
    }

    /// Drains whatever the socket has buffered into the frame decoder.
    fn on_readable(&mut self) {
        loop {
            let result = match self.socket.as_ref() {
                Some(socket) => socket.try_read(&mut self.read_buf),
                None => return,
            };

            match result {
                Ok(0) => {
                    tracing::info!("Connection with {} lost", self.address);
                    self.on_disconnected(None, true);
                    return;
                }
                Ok(n) => {
                    tracing::debug!("[{}] Received {} bytes", self.address, n);
                    self.decoder.extend(&self.read_buf[..n]);
                    if !self.dispatch_frames() {
                        return;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.on_socket_error(e);
                    return;
                }
            }
        }
    }

    /// Emits a `Data` event per decoded frame. Returns false if the socket was
    /// dropped because of a framing error.
    fn dispatch_frames(&mut self) -> bool {
        loop {
            match self.decoder.decode_frame() {
                Ok(Some(payload)) => match self.options.serializer.deserialize(&payload) {
                    Ok(value) => self
                        .events
                        .emit(ClientEvent::Data(Message::new(payload, value))),
                    Err(e) => {
                        tracing::warn!("[{}] Failed to deserialize frame: {}", self.address, e);
                        self.events.emit(ClientEvent::Error(Arc::new(e.into())));
                    }
                },
                Ok(None) => return true,
                Err(e) => {
                    tracing::warn!("[{}] Framing error: {}", self.address, e);
                    let error = Arc::new(ClientError::Framing(e));
                    self.events.emit(ClientEvent::Error(error.clone()));
                    self.on_disconnected(Some(error), true);
                    return false;
                }
            }
        }
    }

    /// Writes queued frames until the queue is empty or the socket would block.
    fn flush(&mut self) {
        let outcome = {
            let Some(socket) = self.socket.as_ref() else {
                return;
            };
            let mut queue = self.shared.queue.lock();
            let mut written = 0usize;
            let mut outcome = Ok(());

            while let Some(chunk) = queue.front() {
                match socket.try_write(chunk) {
                    Ok(0) => {
                        outcome = Err(io::Error::from(io::ErrorKind::WriteZero));
                        break;
                    }
                    Ok(n) => {
                        written += n;
                        queue.advance(n);
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                }
            }

            if written > 0 {
                tracing::debug!(
                    "[{}] Wrote {} bytes ({} queued)",
                    self.address,
                    written,
                    queue.queued_bytes()
                );
            }
            outcome
        };

        if let Err(e) = outcome {
            self.on_socket_error(e);
        }
    }

    fn on_socket_error(&mut self, e: io::Error) {
        tracing::warn!("[{}] Socket error: {}", self.address, e);
        let error = Arc::new(ClientError::Socket(e));
        self.events.emit(ClientEvent::Error(error.clone()));
        self.on_disconnected(Some(error), true);
    }

    /// Destroys the socket, re-corks the queue, and schedules a retry.
    fn on_disconnected(&mut self, error: Option<Arc<ClientError>>, established: bool) {
        self.socket = None;
        self.connecting = None;
        self.decoder.clear();
        self.shared.queue.lock().rewind();
        self.set_state(ClientState::Disconnected);

        self.events.emit(ClientEvent::Disconnected { error, established });

        if let Some(delay) = self.options.auto_reconnect {
            tracing::debug!(
                "[{}] Retrying in {}ms",
                self.address,
                delay.as_millis()
            );
            self.reconnect_at = Some(Instant::now() + delay);
        }
    }
}

async fn poll_connect(connecting: &mut Option<ConnectFuture>) -> io::Result<TcpStream> {
    match connecting.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn readable(socket: &Option<TcpStream>) -> io::Result<()> {
    match socket {
        Some(socket) => socket.readable().await,
        None => std::future::pending().await,
    }
}

async fn writable(socket: &Option<TcpStream>) -> io::Result<()> {
    match socket {
        Some(socket) => socket.writable().await,
        None => std::future::pending().await,
    }
}
