//! Protocol error types.

use thiserror::Error;

/// Errors raised while framing or decoding a message.
///
/// Any of these on an inbound payload is a decode failure: the server answers
/// it with an error response, the client treats it as fatal.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("empty payload")]
    EmptyPayload,

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Semantic rejection of a well-formed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("n must be a positive integer")]
    InvalidCount,

    #[error("message must not be empty")]
    EmptyMessage,
}
