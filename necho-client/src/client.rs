//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use necho_protocol::{EchoCount, EchoRequest, EchoResponse};
use std::sync::Arc;

/// High-level client for necho.
pub struct Client {
    conn: Arc<Connection>,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    /// Asks the server to echo `message` `n` times.
    ///
    /// An error response from the server is a successful exchange and comes
    /// back as [`EchoResponse::Error`]; only transport and framing failures
    /// are returned as `Err`.
    pub async fn echo(
        &self,
        n: impl Into<EchoCount>,
        message: impl Into<String>,
    ) -> Result<EchoResponse, ClientError> {
        self.request(&EchoRequest::new(n, message)).await
    }

    /// Sends a prepared request.
    pub async fn request(&self, request: &EchoRequest) -> Result<EchoResponse, ClientError> {
        let response = self.conn.request(request).await?;
        if let EchoResponse::Error { message } = &response {
            tracing::debug!("Server rejected request: {}", message);
        }
        Ok(response)
    }
}
