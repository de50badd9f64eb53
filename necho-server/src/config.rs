//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via NECHO_CONFIG)
//! 3. Environment variables
//! 4. Command-line arguments (applied by the binary)

use crate::server::ServerConfig;
use necho_protocol::{WireMode, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT, MAX_MESSAGE_SIZE_LIMIT};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Smallest message size that still fits every error response.
pub const MIN_MESSAGE_SIZE: usize = 128;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Wire protocol configuration.
    pub protocol: ProtocolConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("NECHO_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();

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

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.protocol.apply_env_overrides();
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()?;
        self.protocol.validate()
    }

    /// Builds the runtime server configuration.
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(self.network.bind_addr)
            .with_backlog(self.network.backlog)
            .with_wire_mode(self.protocol.wire_mode)
            .with_max_message_size(self.protocol.max_message_size);
        if let Some(timeout) = self.network.read_timeout() {
            config = config.with_read_timeout(timeout);
        }
        if let Some(timeout) = self.network.write_timeout() {
            config = config.with_write_timeout(timeout);
        }
        config
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Listen backlog.
    pub backlog: u32,
    /// Per-message read timeout in seconds (unset = wait forever).
    pub read_timeout_secs: Option<u64>,
    /// Per-message write timeout in seconds (unset = wait forever).
    pub write_timeout_secs: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            backlog: 5,
            read_timeout_secs: None,
            write_timeout_secs: None,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("NECHO_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Ok(backlog) = std::env::var("NECHO_BACKLOG") {
            if let Ok(n) = backlog.parse() {
                self.backlog = n;
            }
        }

        if let Ok(timeout) = std::env::var("NECHO_READ_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.read_timeout_secs = Some(secs);
            }
        }

        if let Ok(timeout) = std::env::var("NECHO_WRITE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.write_timeout_secs = Some(secs);
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backlog == 0 {
            return Err(ConfigError::ValidationError(
                "network.backlog must be at least 1".to_string(),
            ));
        }
        if self.read_timeout_secs == Some(0) || self.write_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "timeouts must be at least 1 second; leave unset to disable".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the read timeout as Duration.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }

    /// Returns the write timeout as Duration.
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_secs.map(Duration::from_secs)
    }
}

/// Wire protocol configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Maximum encoded message size in bytes, in each direction.
    pub max_message_size: usize,
    /// Message framing.
    pub wire_mode: WireMode,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            wire_mode: WireMode::Single,
        }
    }
}

impl ProtocolConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(size) = std::env::var("NECHO_MAX_MESSAGE_SIZE") {
            if let Ok(n) = size.parse() {
                self.max_message_size = n;
            }
        }

        if let Ok(mode) = std::env::var("NECHO_WIRE_MODE") {
            match mode.parse() {
                Ok(mode) => self.wire_mode = mode,
                Err(e) => tracing::warn!("Ignoring NECHO_WIRE_MODE: {}", e),
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_MESSAGE_SIZE..=MAX_MESSAGE_SIZE_LIMIT).contains(&self.max_message_size) {
            return Err(ConfigError::ValidationError(format!(
                "protocol.max_message_size must be between {} and {}",
                MIN_MESSAGE_SIZE, MAX_MESSAGE_SIZE_LIMIT
            )));
        }
        Ok(())
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

/// Custom serde module for SocketAddr (to handle as string in YAML).
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
