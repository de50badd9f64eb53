//! # necho-server
//!
//! TCP server for necho.
//!
//! This crate provides:
//! - TCP accept loop with one task per connection
//! - Request decoding and echo processing
//! - Session bookkeeping
//! - Layered configuration (defaults, YAML, environment)

pub mod config;
pub mod error;
pub mod handler;
pub mod processor;
pub mod server;
pub mod session;

pub use config::{Config, ConfigError, NetworkConfig, ProtocolConfig};
pub use error::ServerError;
pub use handler::EchoHandler;
pub use server::{Server, ServerConfig, ServerStats};
pub use session::Session;
