//! Client configuration.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use wuzzat_protocol::{
    default_serializer, FrameCodec, FramingKind, Serializer, SerializerKind,
    DEFAULT_EVENT_CAPACITY, DEFAULT_MAX_FRAME_SIZE, DEFAULT_READ_BUFFER_SIZE,
};

/// Default outbound high-water mark in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Options fixed at client construction.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Call `connect()` from the constructor.
    pub auto_connect: bool,
    /// Fixed delay before retrying after every disconnect. `None` disables retries.
    pub auto_reconnect: Option<Duration>,
    /// Outbound high-water mark in bytes.
    pub buffer_size: usize,
    /// Object codec for `send`.
    pub serializer: Arc<dyn Serializer>,
    /// Frame layout on the wire.
    pub framing: FrameCodec,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Undelivered events buffered per subscriber.
    pub event_capacity: usize,
    /// Set TCP_NODELAY on connected sockets.
    pub nodelay: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auto_connect: true,
            auto_reconnect: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            serializer: default_serializer(),
            framing: FrameCodec::default(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            nodelay: true,
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }

    pub fn with_auto_reconnect(mut self, delay: Duration) -> Self {
        self.auto_reconnect = Some(delay);
        self
    }

    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_framing(mut self, framing: FrameCodec) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

/// Serializable form of [`ClientOptions`], for configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub auto_connect: bool,
    /// Reconnect delay in milliseconds (absent = disabled).
    pub auto_reconnect_ms: Option<u64>,
    pub buffer_size: usize,
    pub serializer: SerializerKind,
    pub framing: FramingKind,
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auto_connect: true,
            auto_reconnect_ms: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            serializer: SerializerKind::default(),
            framing: FramingKind::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ClientConfig {
    /// Builds runtime options from this configuration.
    pub fn to_options(&self) -> ClientOptions {
        ClientOptions {
            auto_connect: self.auto_connect,
            auto_reconnect: self.auto_reconnect_ms.map(Duration::from_millis),
            buffer_size: self.buffer_size,
            serializer: self.serializer.build(),
            framing: FrameCodec::from_kind(self.framing).with_max_frame_size(self.max_frame_size),
            ..ClientOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = ClientOptions::default();
        assert!(options.auto_connect);
        assert!(options.auto_reconnect.is_none());
        assert_eq!(options.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(options.serializer.name(), "json");
        assert_eq!(options.framing.kind(), FramingKind::LengthPrefixed);
        assert_eq!(options.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_read_buffer_clamping() {
        let options = ClientOptions::new().with_read_buffer_size(100);
        assert_eq!(options.read_buffer_size, MIN_READ_BUFFER_SIZE);

        let options = ClientOptions::new().with_read_buffer_size(10 * 1024 * 1024);
        assert_eq!(options.read_buffer_size, MAX_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_config_to_options() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"auto_connect": false, "auto_reconnect_ms": 1000, "buffer_size": 5000000, "serializer": "msgpack"}"#,
        )
        .unwrap();

        let options = config.to_options();
        assert!(!options.auto_connect);
        assert_eq!(options.auto_reconnect, Some(Duration::from_millis(1000)));
        assert_eq!(options.buffer_size, 5_000_000);
        assert_eq!(options.serializer.name(), "msgpack");
        assert_eq!(options.framing.max_frame_size(), DEFAULT_MAX_FRAME_SIZE);
    }
}
