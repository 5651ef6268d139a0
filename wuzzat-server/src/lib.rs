//! # wuzzat-server
//!
//! TCP server for wuzzat.
//!
//! This crate provides:
//! - Idempotent listener start/stop with lifecycle events
//! - A roster of live connections keyed by connection id
//! - Per-connection framed I/O with deserialized `Data` events
//! - YAML configuration with environment variable overrides

pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod server;

pub use config::{CodecConfig, Config, ConfigError, NetworkConfig};
pub use connection::{Connection, Roster};
pub use error::ServerError;
pub use event::{ServerEvent, ServerState};
pub use server::{Server, ServerOptions};
