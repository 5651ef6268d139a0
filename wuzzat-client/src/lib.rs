//! # wuzzat-client
//!
//! Client library for wuzzat.
//!
//! This crate provides:
//! - A framed TCP client with a `Disconnected → Connecting → Connected` state machine
//! - Writes that queue while disconnected and flush in order on connect
//! - Optional fixed-delay automatic reconnection
//! - Pluggable serializers for the object API

pub mod client;
mod driver;
pub mod error;
pub mod event;
pub mod options;
pub mod queue;

pub use client::Client;
pub use error::ClientError;
pub use event::{ClientEvent, ClientState};
pub use options::{ClientConfig, ClientOptions, DEFAULT_BUFFER_SIZE};
pub use queue::OutboundQueue;
