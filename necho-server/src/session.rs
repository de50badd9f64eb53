//! Per-connection session bookkeeping.

use std::net::SocketAddr;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// State of one accepted connection, owned by its worker task.
pub struct Session {
    /// Unique session ID.
    pub id: String,

    /// Remote address.
    pub remote_addr: SocketAddr,

    /// Requests answered so far.
    request_count: u64,

    /// Error responses sent so far.
    error_count: u64,

    /// Session creation time.
    created_at: Instant,
}

impl Session {
    /// Creates a new session.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            remote_addr,
            request_count: 0,
            error_count: 0,
            created_at: Instant::now(),
        }
    }

    /// Records an answered request.
    pub fn record_request(&mut self, is_error: bool) {
        self.request_count += 1;
        if is_error {
            self.error_count += 1;
        }
    }

    /// Returns the request count.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Returns the number of error responses.
    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Returns the session age.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}
