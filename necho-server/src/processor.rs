//! Echo processing.
//!
//! Pure request-to-response logic with no I/O and no shared state; safe to
//! call from any number of connection tasks at once.

use necho_protocol::{EchoRequest, EchoResponse, ValidationError};

/// A request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidRequest<'a> {
    pub n: u64,
    pub message: &'a str,
}

/// Validates a request.
///
/// The count is checked before the message, so a request failing both
/// reports the count.
pub fn validate(request: &EchoRequest) -> Result<ValidRequest<'_>, ValidationError> {
    let n = request.n.positive().ok_or(ValidationError::InvalidCount)?;
    if request.message.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    Ok(ValidRequest {
        n,
        message: &request.message,
    })
}

/// Produces the response for a request.
pub fn process(request: &EchoRequest) -> EchoResponse {
    match validate(request) {
        Ok(valid) => EchoResponse::success(valid.n, valid.message),
        Err(e) => EchoResponse::error(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use necho_protocol::EchoCount;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_success() {
        let response = process(&EchoRequest::new(3, "hi"));
        assert_eq!(
            response,
            EchoResponse::Success {
                n: 3,
                echoes: vec!["hi".into(), "hi".into(), "hi".into()],
            }
        );
    }

    #[test]
    fn test_negative_count() {
        let response = process(&EchoRequest::new(-1, "hi"));
        assert_eq!(response, EchoResponse::error("n must be a positive integer"));
    }

    #[test]
    fn test_count_checked_before_message() {
        let response = process(&EchoRequest::new(0, ""));
        assert_eq!(response, EchoResponse::error("n must be a positive integer"));
    }

    #[test]
    fn test_empty_message() {
        let response = process(&EchoRequest::new(2, ""));
        assert_eq!(response, EchoResponse::error("message must not be empty"));
    }

    #[test]
    fn test_non_integer_counts() {
        for n in [json!("3"), json!(2.5), json!(null), json!(true), json!([1])] {
            let request = EchoRequest {
                n: EchoCount::Other(n),
                message: "hi".to_string(),
            };
            assert_eq!(validate(&request), Err(ValidationError::InvalidCount));
        }
    }

    #[test]
    fn test_whitespace_message_is_not_empty() {
        let request = EchoRequest::new(1, " ");
        assert_eq!(
            validate(&request),
            Ok(ValidRequest {
                n: 1,
                message: " "
            })
        );
    }

    proptest! {
        #[test]
        fn prop_valid_requests_echo_n_times(n in 1i64..256, message in "\\PC+") {
            match process(&EchoRequest::new(n, message.clone())) {
                EchoResponse::Success { n: got, echoes } => {
                    prop_assert_eq!(got, n as u64);
                    prop_assert_eq!(echoes.len(), n as usize);
                    prop_assert!(echoes.iter().all(|e| *e == message));
                }
                other => prop_assert!(false, "unexpected response: {:?}", other),
            }
        }

        #[test]
        fn prop_non_positive_count_rejected(n in i64::MIN..=0, message in ".*") {
            prop_assert_eq!(
                process(&EchoRequest::new(n, message)),
                EchoResponse::error(ValidationError::InvalidCount.to_string())
            );
        }

        #[test]
        fn prop_empty_message_rejected(n in 1i64..=i64::MAX) {
            let req = EchoRequest::new(n, "");
            prop_assert_eq!(
                validate(&req),
                Err(ValidationError::EmptyMessage)
            );
        }
    }
}
