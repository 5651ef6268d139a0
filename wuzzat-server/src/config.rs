//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via WUZZAT_CONFIG or --config)
//! 3. Environment variables

use crate::server::ServerOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use wuzzat_protocol::{
    Address, FrameCodec, FramingKind, SerializerKind, DEFAULT_DELIMITER, DEFAULT_PORT,
    DEFAULT_EVENT_CAPACITY, DEFAULT_MAX_FRAME_SIZE, DEFAULT_READ_BUFFER_SIZE,
};

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Wire format configuration.
    pub codec: CodecConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("WUZZAT_CONFIG") {
            Ok(path) => Self::load_from(path),
            Err(_) => {
                let config = Self::from_env();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Loads the given YAML file, then applies environment variable overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.codec.apply_env_overrides();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.codec.max_frame_size == 0 {
            return Err(ConfigError::ValidationError(
                "codec.max_frame_size must be greater than 0".to_string(),
            ));
        }
        if self.network.read_buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "network.read_buffer_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Builds runtime server options from this configuration.
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            serializer: self.codec.serializer.build(),
            framing: self.codec.frame_codec(),
            event_capacity: self.network.event_capacity,
            read_buffer_size: self.network.read_buffer_size,
            max_connections: match self.network.max_connections {
                0 => None,
                n => Some(n),
            },
            nodelay: self.network.nodelay,
        }
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Listen address, `scheme://hostname:port`.
    pub address: Address,
    /// Maximum concurrent connections (0 = unlimited).
    pub max_connections: usize,
    /// Read buffer size per connection.
    pub read_buffer_size: usize,
    /// Undelivered events buffered per subscriber.
    pub event_capacity: usize,
    /// Set TCP_NODELAY on accepted sockets.
    pub nodelay: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            max_connections: 0,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            nodelay: true,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("WUZZAT_ADDRESS") {
            match Address::parse(&addr) {
                Ok(parsed) => self.address = parsed,
                Err(e) => tracing::warn!("Ignoring WUZZAT_ADDRESS: {}", e),
            }
        }

        if let Ok(max) = std::env::var("WUZZAT_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse() {
                self.max_connections = n;
            }
        }
    }
}

fn default_address() -> Address {
    Address::new("tcp", "127.0.0.1", DEFAULT_PORT)
}

/// Wire format configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Object codec.
    pub serializer: SerializerKind,
    /// Frame layout.
    pub framing: FramingKind,
    /// Delimiter byte for delimited framing.
    pub delimiter: u8,
    /// Maximum frame payload size in bytes.
    pub max_frame_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            serializer: SerializerKind::default(),
            framing: FramingKind::default(),
            delimiter: DEFAULT_DELIMITER,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl CodecConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(kind) = std::env::var("WUZZAT_SERIALIZER") {
            match kind.parse() {
                Ok(parsed) => self.serializer = parsed,
                Err(e) => tracing::warn!("Ignoring WUZZAT_SERIALIZER: {}", e),
            }
        }

        if let Ok(kind) = std::env::var("WUZZAT_FRAMING") {
            match kind.parse() {
                Ok(parsed) => self.framing = parsed,
                Err(e) => tracing::warn!("Ignoring WUZZAT_FRAMING: {}", e),
            }
        }

        if let Ok(size) = std::env::var("WUZZAT_MAX_FRAME_SIZE") {
            if let Ok(n) = size.parse() {
                self.max_frame_size = n;
            }
        }
    }

    /// Returns the frame codec this configuration selects.
    pub fn frame_codec(&self) -> FrameCodec {
        let codec = match self.framing {
            FramingKind::LengthPrefixed => FrameCodec::length_prefixed(),
            FramingKind::Delimited => FrameCodec::delimited(self.delimiter),
        };
        codec.with_max_frame_size(self.max_frame_size)
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.address.to_string(), "tcp://127.0.0.1:5666");
        assert_eq!(config.network.max_connections, 0);
        assert_eq!(config.codec.serializer, SerializerKind::Json);
        assert_eq!(config.codec.framing, FramingKind::LengthPrefixed);
        assert!(config.validate().is_ok());

        let options = config.server_options();
        assert!(options.max_connections.is_none());
        assert_eq!(options.serializer.name(), "json");
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = Config::default();
        config.network.address = Address::parse("tcp://0.0.0.0:7000").unwrap();
        config.codec.serializer = SerializerKind::MsgPack;

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.network.address, config.network.address);
        assert_eq!(parsed.codec.serializer, SerializerKind::MsgPack);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "network:\n  address: tcp://0.0.0.0:6000\n  max_connections: 10\ncodec:\n  serializer: msgpack\n  framing: delimited\n  delimiter: 10"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.network.address.port(), 6000);
        assert_eq!(config.network.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);

        let options = config.server_options();
        assert_eq!(options.max_connections, Some(10));
        assert_eq!(options.serializer.name(), "msgpack");
        assert_eq!(options.framing.kind(), FramingKind::Delimited);
        assert_eq!(options.framing.delimiter(), b'\n');
    }

    #[test]
    fn test_from_file_errors() {
        let err = Config::from_file("/nonexistent/wuzzat.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(..)));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "network:\n  address: localhost").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wuzzat.yaml");

        let mut config = Config::default();
        config.codec.max_frame_size = 4096;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.codec.max_frame_size, 4096);
        assert_eq!(loaded.codec.frame_codec().max_frame_size(), 4096);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.codec.max_frame_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "network:\n  address: tcp://0.0.0.0:6000\n  max_connections: 10\ncodec:\n  max_frame_size: 4096"
        )
        .unwrap();

        std::env::set_var("WUZZAT_SERIALIZER", "msgpack");
        std::env::set_var("WUZZAT_FRAMING", "delimited");
        std::env::set_var("WUZZAT_MAX_CONNECTIONS", "3");
        std::env::set_var("WUZZAT_MAX_FRAME_SIZE", "not a number");

        let config = Config::from_env();
        let from_file = Config::load_from(file.path());

        std::env::remove_var("WUZZAT_SERIALIZER");
        std::env::remove_var("WUZZAT_FRAMING");
        std::env::remove_var("WUZZAT_MAX_CONNECTIONS");
        std::env::remove_var("WUZZAT_MAX_FRAME_SIZE");

        assert_eq!(config.codec.serializer, SerializerKind::MsgPack);
        assert_eq!(config.codec.framing, FramingKind::Delimited);
        assert_eq!(config.network.max_connections, 3);
        assert_eq!(config.codec.max_frame_size, DEFAULT_MAX_FRAME_SIZE);

        // File values apply first, then the environment wins.
        let from_file = from_file.unwrap();
        assert_eq!(from_file.network.address.port(), 6000);
        assert_eq!(from_file.network.max_connections, 3);
        assert_eq!(from_file.codec.serializer, SerializerKind::MsgPack);
        assert_eq!(from_file.codec.max_frame_size, 4096);
    }
}
