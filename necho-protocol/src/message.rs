//! JSON message types for N-Echo requests and responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The echo count as it arrived on the wire.
///
/// Requests are decoded leniently: any JSON value is accepted for `n` so
/// that semantic checks stay with the processor. Only integers that fit in
/// an `i64` land in [`EchoCount::Integer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EchoCount {
    Integer(i64),
    Other(Value),
}

impl EchoCount {
    /// Returns the count if it is a strictly positive integer.
    pub fn positive(&self) -> Option<u64> {
        match self {
            EchoCount::Integer(n) if *n > 0 => Some(*n as u64),
            _ => None,
        }
    }
}

impl From<i64> for EchoCount {
    fn from(n: i64) -> Self {
        EchoCount::Integer(n)
    }
}

impl From<i32> for EchoCount {
    fn from(n: i32) -> Self {
        EchoCount::Integer(n.into())
    }
}

/// Request message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoRequest {
    /// How many times to echo the message.
    pub n: EchoCount,

    /// Text to echo.
    pub message: String,
}

impl EchoRequest {
    pub fn new(n: impl Into<EchoCount>, message: impl Into<String>) -> Self {
        Self {
            n: n.into(),
            message: message.into(),
        }
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Response message, discriminated on the wire by its `status` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EchoResponse {
    Success { n: u64, echoes: Vec<String> },
    Error { message: String },
}

impl EchoResponse {
    /// Builds a success response carrying `n` copies of `message`.
    pub fn success(n: u64, message: &str) -> Self {
        let echoes = (0..n).map(|_| message.to_string()).collect();
        EchoResponse::Success { n, echoes }
    }

    pub fn error(message: impl Into<String>) -> Self {
        EchoResponse::Error {
            message: message.into(),
        }
    }

    pub fn status(&self) -> ResponseStatus {
        match self {
            EchoResponse::Success { .. } => ResponseStatus::Success,
            EchoResponse::Error { .. } => ResponseStatus::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == ResponseStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status() == ResponseStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = EchoRequest::new(3, "hi");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, json!({"n": 3, "message": "hi"}));
    }

    #[test]
    fn test_request_accepts_invalid_counts() {
        let req: EchoRequest = serde_json::from_str(r#"{"n":0,"message":""}"#).unwrap();
        assert_eq!(req.n, EchoCount::Integer(0));
        assert_eq!(req.n.positive(), None);

        let req: EchoRequest = serde_json::from_str(r#"{"n":-1,"message":"hi"}"#).unwrap();
        assert_eq!(req.n, EchoCount::Integer(-1));

        let req: EchoRequest = serde_json::from_str(r#"{"n":"3","message":"hi"}"#).unwrap();
        assert_eq!(req.n, EchoCount::Other(json!("3")));
        assert_eq!(req.n.positive(), None);

        let req: EchoRequest = serde_json::from_str(r#"{"n":2.5,"message":"hi"}"#).unwrap();
        assert!(matches!(req.n, EchoCount::Other(_)));
    }

    #[test]
    fn test_request_missing_fields_rejected() {
        assert!(serde_json::from_str::<EchoRequest>(r#"{"message":"hi"}"#).is_err());
        assert!(serde_json::from_str::<EchoRequest>(r#"{"n":3}"#).is_err());
        assert!(serde_json::from_str::<EchoRequest>(r#"{"n":3,"message":7}"#).is_err());
    }

    #[test]
    fn test_response_success_serialization() {
        let resp = EchoResponse::success(3, "hi");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            json!({"status": "success", "n": 3, "echoes": ["hi", "hi", "hi"]})
        );
        assert!(resp.is_success());
    }

    #[test]
    fn test_response_error_serialization() {
        let resp = EchoResponse::error("n must be a positive integer");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            json!({"status": "error", "message": "n must be a positive integer"})
        );
        assert!(resp.is_error());
        assert_eq!(resp.status(), ResponseStatus::Error);
    }

    #[test]
    fn test_response_unknown_status_rejected() {
        let result = serde_json::from_str::<EchoResponse>(r#"{"status":"ok","message":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_positive_count() {
        assert_eq!(EchoCount::Integer(5).positive(), Some(5));
        assert_eq!(EchoCount::Integer(0).positive(), None);
        assert_eq!(EchoCount::Integer(i64::MIN).positive(), None);
        assert_eq!(EchoCount::Other(Value::Null).positive(), None);
    }
}
