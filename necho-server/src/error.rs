//! Server error types.

use crate::config::ConfigError;
use std::net::SocketAddr;
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] necho_protocol::ProtocolError),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("server is already running")]
    AlreadyRunning,

    #[error("server shutting down")]
    ShuttingDown,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ServerError {
    /// Returns whether this error is fatal to the whole process rather than
    /// to a single connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServerError::Bind { .. } | ServerError::Config(_))
    }
}
