//! Request handling: payload in, response out.

use crate::processor;
use crate::session::Session;
use bytes::BytesMut;
use necho_protocol::codec::decode_request;
use necho_protocol::{EchoResponse, Encoder, ProtocolError, WireMode};

/// JSON overhead of a success response besides its echoes.
const SUCCESS_ENVELOPE_BYTES: u64 = r#"{"status":"success","n":,"echoes":[]}"#.len() as u64;

/// Turns request payloads into encoded responses.
#[derive(Debug, Clone)]
pub struct EchoHandler {
    encoder: Encoder,
}

impl EchoHandler {
    pub fn new(wire_mode: WireMode, max_message_size: usize) -> Self {
        Self {
            encoder: Encoder::new(wire_mode).with_max_message_size(max_message_size),
        }
    }

    pub fn max_message_size(&self) -> usize {
        self.encoder.max_message_size()
    }

    /// Handles one request payload.
    ///
    /// Never fails: malformed payloads, invalid requests and oversized
    /// results all become error responses.
    pub fn handle(&self, session: &Session, payload: &[u8]) -> EchoResponse {
        let request = match decode_request(payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!("[{}] Malformed request: {}", session.remote_addr, e);
                return EchoResponse::error(format!("malformed request: {}", e));
            }
        };

        // Reject results that cannot fit before process() builds them.
        if let Ok(valid) = processor::validate(&request) {
            // Every echo costs at least its text plus two quotes and a comma.
            let min_size = (valid.message.len() as u64 + 3)
                .saturating_mul(valid.n)
                .saturating_add(SUCCESS_ENVELOPE_BYTES);
            if min_size > self.max_message_size() as u64 {
                return self.too_large();
            }
        }

        let response = processor::process(&request);
        if let EchoResponse::Error { message } = &response {
            tracing::debug!("[{}] Rejected request: {}", session.remote_addr, message);
        }
        response
    }

    /// Encodes a response, replacing it with an error if it does not fit in
    /// one message.
    pub fn encode(&self, response: &EchoResponse) -> Result<BytesMut, ProtocolError> {
        match self.encoder.encode_response(response) {
            Err(ProtocolError::FrameTooLarge { .. }) if response.is_success() => {
                self.encoder.encode_response(&self.too_large())
            }
            result => result,
        }
    }

    fn too_large(&self) -> EchoResponse {
        EchoResponse::error(format!(
            "response exceeds {} bytes",
            self.max_message_size()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use necho_protocol::codec::decode_response;
    use necho_protocol::{EchoRequest, DEFAULT_MAX_MESSAGE_SIZE};
    use std::net::SocketAddr;

    fn session() -> Session {
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        Session::new(addr)
    }

    fn handler() -> EchoHandler {
        EchoHandler::new(WireMode::Single, DEFAULT_MAX_MESSAGE_SIZE)
    }

    #[test]
    fn test_handle_success() {
        let response = handler().handle(&session(), br#"{"n":3,"message":"hi"}"#);
        assert_eq!(response, EchoResponse::success(3, "hi"));
    }

    #[test]
    fn test_handle_malformed() {
        let response = handler().handle(&session(), b"\x00garbage");
        match response {
            EchoResponse::Error { message } => assert!(message.starts_with("malformed request")),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_handle_validation_error() {
        let response = handler().handle(&session(), br#"{"n":-1,"message":"hi"}"#);
        assert_eq!(response, EchoResponse::error("n must be a positive integer"));
    }

    #[test]
    fn test_handle_matches_process_within_limit() {
        let handler = handler();
        for request in [
            EchoRequest::new(3, "hi"),
            EchoRequest::new(1, "안녕"),
            EchoRequest::new(0, "hi"),
            EchoRequest::new(-7, ""),
            EchoRequest::new(4, ""),
        ] {
            let payload = serde_json::to_vec(&request).unwrap();
            assert_eq!(
                handler.handle(&session(), &payload),
                processor::process(&request)
            );
        }
    }

    #[test]
    fn test_huge_count_rejected_without_building() {
        let payload = format!(r#"{{"n":{},"message":"hi"}}"#, i64::MAX);
        let response = handler().handle(&session(), payload.as_bytes());
        assert_eq!(response, EchoResponse::error("response exceeds 4096 bytes"));
    }

    #[test]
    fn test_size_guard_keeps_validation_order() {
        let payload = format!(r#"{{"n":{},"message":""}}"#, i64::MAX);
        let response = handler().handle(&session(), payload.as_bytes());
        assert_eq!(response, EchoResponse::error("message must not be empty"));
    }

    #[test]
    fn test_encode_replaces_oversized_success() {
        let handler = EchoHandler::new(WireMode::Single, 128);
        // Escaped quotes make the encoding larger than the estimate.
        let response = EchoResponse::success(12, "\"\"\"");
        let encoded = handler.encode(&response).unwrap();
        assert_eq!(
            decode_response(&encoded).unwrap(),
            EchoResponse::error("response exceeds 128 bytes")
        );
    }

    #[test]
    fn test_encode_jsonl_terminates_line() {
        let handler = EchoHandler::new(WireMode::Jsonl, DEFAULT_MAX_MESSAGE_SIZE);
        let encoded = handler.encode(&EchoResponse::success(1, "x")).unwrap();
        assert_eq!(encoded.last(), Some(&b'\n'));
    }
}
