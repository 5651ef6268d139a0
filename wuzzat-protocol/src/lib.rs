//! # wuzzat-protocol
//!
//! Wire-level building blocks shared by the wuzzat client and server.
//!
//! This crate provides:
//! - `scheme://hostname:port` address parsing
//! - Length-prefixed (default) and delimited frame codecs with partial-frame reassembly
//! - Pluggable object serializers (JSON, MessagePack)
//! - A typed broadcast event bus for transport notifications

pub mod address;
pub mod error;
pub mod events;
pub mod frame;
pub mod message;
pub mod serializer;

pub use address::Address;
pub use error::{AddressError, FramingError, SerializationError};
pub use events::{EventBus, DEFAULT_EVENT_CAPACITY};
pub use frame::{
    FrameCodec, FrameDecoder, FramingKind, DEFAULT_DELIMITER, DEFAULT_MAX_FRAME_SIZE,
    LENGTH_PREFIX_SIZE,
};
pub use message::Message;
pub use serializer::{
    default_serializer, JsonSerializer, MsgPackSerializer, Serializer, SerializerKind,
};

/// Default port used by examples and the command-line tool.
pub const DEFAULT_PORT: u16 = 5666;

/// Default address used by examples and the command-line tool.
pub const DEFAULT_ADDRESS: &str = "tcp://127.0.0.1:5666";

/// Default socket read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;
