//! Frame codec: turns application payloads into self-delimiting wire bytes
//! and reassembles them from arbitrarily split byte chunks.
//!
//! Two wire layouts are supported.
//!
//! Length-prefixed (default):
//!
//! ```text
//! +-------------+-----------------------+
//! | payload_len | payload               |
//! | 4 bytes BE  | payload_len bytes     |
//! +-------------+-----------------------+
//! ```
//!
//! Delimited:
//!
//! ```text
//! +-----------------------+-----------+
//! | payload               | delimiter |
//! | any length            | 1 byte    |
//! +-----------------------+-----------+
//! ```
//!
//! The delimited layout does not escape its delimiter, so [`FrameCodec::encode`]
//! refuses payloads that contain it.

use crate::error::FramingError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum frame payload size (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Default delimiter byte for delimited framing.
pub const DEFAULT_DELIMITER: u8 = 0xFF;

/// Initial capacity of a decoder's reassembly buffer.
const DECODER_INITIAL_CAPACITY: usize = 8192;

/// Framing layout selector, as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingKind {
    #[default]
    LengthPrefixed,
    Delimited,
}

impl std::str::FromStr for FramingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "length_prefixed" | "length-prefixed" | "length" => Ok(FramingKind::LengthPrefixed),
            "delimited" | "delimiter" => Ok(FramingKind::Delimited),
            other => Err(format!("unknown framing: {}", other)),
        }
    }
}

impl std::fmt::Display for FramingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FramingKind::LengthPrefixed => write!(f, "length_prefixed"),
            FramingKind::Delimited => write!(f, "delimited"),
        }
    }
}

/// Encoder/decoder factory for one framing layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    kind: FramingKind,
    delimiter: u8,
    max_frame_size: usize,
}

impl FrameCodec {
    /// Length-prefixed framing with the default size limit.
    pub fn length_prefixed() -> Self {
        Self {
            kind: FramingKind::LengthPrefixed,
            delimiter: DEFAULT_DELIMITER,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Delimiter-terminated framing with the default size limit.
    pub fn delimited(delimiter: u8) -> Self {
        Self {
            kind: FramingKind::Delimited,
            delimiter,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn from_kind(kind: FramingKind) -> Self {
        match kind {
            FramingKind::LengthPrefixed => Self::length_prefixed(),
            FramingKind::Delimited => Self::delimited(DEFAULT_DELIMITER),
        }
    }

    /// Sets the maximum payload size. Length prefixes cap it at `u32::MAX`.
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max.min(u32::MAX as usize);
        self
    }

    pub fn kind(&self) -> FramingKind {
        self.kind
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encodes one payload into wire bytes.
    pub fn encode(&self, payload: &[u8]) -> Result<Bytes, FramingError> {
        if payload.len() > self.max_frame_size {
            return Err(FramingError::FrameTooLarge {
                size: payload.len(),
                max: self.max_frame_size,
            });
        }

        match self.kind {
            FramingKind::LengthPrefixed => {
                let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
                buf.put_u32(payload.len() as u32);
                buf.put_slice(payload);
                Ok(buf.freeze())
            }
            FramingKind::Delimited => {
                if let Some(offset) = payload.iter().position(|&b| b == self.delimiter) {
                    return Err(FramingError::DelimiterInPayload {
                        delimiter: self.delimiter,
                        offset,
                    });
                }
                let mut buf = BytesMut::with_capacity(payload.len() + 1);
                buf.put_slice(payload);
                buf.put_u8(self.delimiter);
                Ok(buf.freeze())
            }
        }
    }

    /// Creates a fresh decoder for one socket.
    pub fn decoder(&self) -> FrameDecoder {
        FrameDecoder::new(*self)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::length_prefixed()
    }
}

/// Stateful frame reassembler for a single byte stream.
///
/// Bytes that do not yet form a whole frame stay buffered across calls.
#[derive(Debug)]
pub struct FrameDecoder {
    codec: FrameCodec,
    buffer: BytesMut,
    /// Bytes already searched for a delimiter (delimited framing only).
    scanned: usize,
}

impl FrameDecoder {
    pub fn new(codec: FrameCodec) -> Self {
        Self {
            codec,
            buffer: BytesMut::with_capacity(DECODER_INITIAL_CAPACITY),
            scanned: 0,
        }
    }

    /// Appends a received chunk to the reassembly buffer.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Attempts to decode the next whole frame payload.
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    pub fn decode_frame(&mut self) -> Result<Option<Bytes>, FramingError> {
        match self.codec.kind {
            FramingKind::LengthPrefixed => self.decode_length_prefixed(),
            FramingKind::Delimited => self.decode_delimited(),
        }
    }

    fn decode_length_prefixed(&mut self) -> Result<Option<Bytes>, FramingError> {
        if self.buffer.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]) as usize;

        if len > self.codec.max_frame_size {
            return Err(FramingError::FrameTooLarge {
                size: len,
                max: self.codec.max_frame_size,
            });
        }

        if self.buffer.len() < LENGTH_PREFIX_SIZE + len {
            return Ok(None);
        }

        self.buffer.advance(LENGTH_PREFIX_SIZE);
        Ok(Some(self.buffer.split_to(len).freeze()))
    }

    fn decode_delimited(&mut self) -> Result<Option<Bytes>, FramingError> {
        let delimiter = self.codec.delimiter;
        match self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == delimiter)
        {
            Some(pos) => {
                let end = self.scanned + pos;
                let payload = self.buffer.split_to(end).freeze();
                self.buffer.advance(1);
                self.scanned = 0;
                Ok(Some(payload))
            }
            None => {
                self.scanned = self.buffer.len();
                if self.scanned > self.codec.max_frame_size {
                    return Err(FramingError::FrameTooLarge {
                        size: self.scanned,
                        max: self.codec.max_frame_size,
                    });
                }
                Ok(None)
            }
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drops everything buffered, e.g. after a framing error.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}
