//! # necho-protocol
//!
//! Wire protocol implementation for necho (the N-Echo protocol).
//!
//! This crate provides:
//! - JSON request/response message types
//! - Single-read and line-delimited framing behind one codec interface
//! - Protocol and validation error types
//! - Protocol constants

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{Decoder, Encoder, WireMode};
pub use error::{ProtocolError, ValidationError};
pub use message::{EchoCount, EchoRequest, EchoResponse, ResponseStatus};

/// Default port for the necho server.
pub const DEFAULT_PORT: u16 = 5000;

/// Default maximum size of one encoded message, in bytes.
///
/// In [`WireMode::Single`] this is also the size of the single read that is
/// expected to carry a whole message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4096;

/// Upper bound accepted for a configured message size (16 MiB).
pub const MAX_MESSAGE_SIZE_LIMIT: usize = 16 * 1024 * 1024;
