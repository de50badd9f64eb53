//! Encoder and decoder for N-Echo messages.
//!
//! Two framings are supported, selected by [`WireMode`]:
//!
//! - [`WireMode::Single`]: one write carries one complete JSON document and
//!   the receiver treats the result of one bounded read as exactly one
//!   message. There is no length prefix and no reassembly, so a message that
//!   arrives split across reads (or two messages coalesced into one read)
//!   is not recovered. This matches the reference peers and is kept as the
//!   default for compatibility.
//! - [`WireMode::Jsonl`]: one JSON document per `\n`-terminated line,
//!   reassembled across reads.
//!
//! Payload decoding is separate from framing: [`Decoder::decode_frame`]
//! yields raw payloads, [`decode_request`] and [`decode_response`] turn
//! them into messages.

use crate::error::ProtocolError;
use crate::message::{EchoRequest, EchoResponse};
use crate::DEFAULT_MAX_MESSAGE_SIZE;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Read buffer size used for line-delimited framing.
const JSONL_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Message framing on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireMode {
    /// One read per message, no delimiter.
    #[default]
    Single,
    /// Newline-delimited JSON.
    Jsonl,
}

impl fmt::Display for WireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireMode::Single => write!(f, "single"),
            WireMode::Jsonl => write!(f, "jsonl"),
        }
    }
}

impl FromStr for WireMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(WireMode::Single),
            "jsonl" | "lines" => Ok(WireMode::Jsonl),
            other => Err(format!("unknown wire mode: {}", other)),
        }
    }
}

/// Encodes requests and responses into wire bytes.
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    mode: WireMode,
    max_message_size: usize,
}

impl Encoder {
    pub fn new(mode: WireMode) -> Self {
        Self {
            mode,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn mode(&self) -> WireMode {
        self.mode
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Encodes a request.
    pub fn encode_request(&self, request: &EchoRequest) -> Result<BytesMut, ProtocolError> {
        self.encode_json(request)
    }

    /// Encodes a response.
    pub fn encode_response(&self, response: &EchoResponse) -> Result<BytesMut, ProtocolError> {
        self.encode_json(response)
    }

    /// Encodes any JSON-serializable value.
    ///
    /// Non-ASCII text is written as raw UTF-8. The size limit applies to the
    /// JSON document, not to the line terminator.
    pub fn encode_json<T: Serialize>(&self, value: &T) -> Result<BytesMut, ProtocolError> {
        let payload = serde_json::to_vec(value)?;
        if payload.len() > self.max_message_size {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max: self.max_message_size,
            });
        }

        let mut buf = BytesMut::with_capacity(payload.len() + 1);
        buf.extend_from_slice(&payload);
        if self.mode == WireMode::Jsonl {
            buf.extend_from_slice(b"\n");
        }
        Ok(buf)
    }
}

/// Splits received bytes into message payloads.
pub struct Decoder {
    mode: WireMode,
    max_message_size: usize,
    buffer: BytesMut,
}

impl Decoder {
    pub fn new(mode: WireMode) -> Self {
        Self {
            mode,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            buffer: BytesMut::with_capacity(DEFAULT_MAX_MESSAGE_SIZE),
        }
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn mode(&self) -> WireMode {
        self.mode
    }

    /// Size of the buffer a reader should hand to one `read` call.
    ///
    /// For single-read framing this is the message bound itself: whatever a
    /// read of this size returns is taken to be one message.
    pub fn read_buffer_size(&self) -> usize {
        match self.mode {
            WireMode::Single => self.max_message_size,
            WireMode::Jsonl => JSONL_READ_BUFFER_SIZE,
        }
    }

    /// Appends data to the internal buffer.
    ///
    /// With single-read framing, call this once per read and drain it with
    /// [`decode_frame`](Self::decode_frame) before the next read.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to take the next complete payload from the buffer.
    ///
    /// Returns `Ok(None)` if more data is needed. An error means the stream
    /// can no longer be framed and should be closed.
    pub fn decode_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        match self.mode {
            WireMode::Single => {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                Ok(Some(self.buffer.split().freeze()))
            }
            WireMode::Jsonl => loop {
                let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                    if self.buffer.len() > self.max_message_size {
                        return Err(ProtocolError::FrameTooLarge {
                            size: self.buffer.len(),
                            max: self.max_message_size,
                        });
                    }
                    return Ok(None);
                };
                if pos > self.max_message_size {
                    return Err(ProtocolError::FrameTooLarge {
                        size: pos,
                        max: self.max_message_size,
                    });
                }

                let mut line = self.buffer.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(pos - 1);
                }
                // Blank lines carry no message.
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(line.freeze()));
            },
        }
    }

    /// Attempts to decode the next response from the buffer.
    pub fn decode_response(&mut self) -> Result<Option<EchoResponse>, ProtocolError> {
        match self.decode_frame()? {
            Some(payload) => Ok(Some(decode_response(&payload)?)),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(WireMode::default())
    }
}

fn payload_str(payload: &[u8]) -> Result<&str, ProtocolError> {
    let text = std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;
    if text.trim().is_empty() {
        return Err(ProtocolError::EmptyPayload);
    }
    Ok(text)
}

/// Decodes one request payload.
pub fn decode_request(payload: &[u8]) -> Result<EchoRequest, ProtocolError> {
    Ok(serde_json::from_str(payload_str(payload)?)?)
}

/// Decodes one response payload.
pub fn decode_response(payload: &[u8]) -> Result<EchoResponse, ProtocolError> {
    Ok(serde_json::from_str(payload_str(payload)?)?)
}
