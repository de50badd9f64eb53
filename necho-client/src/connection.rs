//! Connection management.

use crate::error::ClientError;
use necho_protocol::{
    Decoder, EchoRequest, EchoResponse, Encoder, WireMode, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Default read buffer size (4 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address as `host:port`; resolved on connect.
    pub addr: String,
    /// Connection timeout (None = OS default).
    pub connect_timeout: Option<Duration>,
    /// Timeout for one request/response exchange (None = wait forever).
    pub request_timeout: Option<Duration>,
    /// Read buffer size for line-delimited reads. Single-read framing
    /// always reads `max_message_size` bytes at once.
    pub read_buffer_size: usize,
    /// Maximum encoded message size, in each direction.
    pub max_message_size: usize,
    /// Message framing; must match the server.
    pub wire_mode: WireMode,
}

impl ConnectionConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: None,
            request_timeout: None,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            wire_mode: WireMode::Single,
        }
    }

    /// Builds a configuration from a host name and port.
    pub fn from_host(host: &str, port: u16) -> Self {
        // Bare IPv6 literals need brackets to carry a port.
        if host.contains(':') && !host.starts_with('[') {
            Self::new(format!("[{}]:{}", host, port))
        } else {
            Self::new(format!("{}:{}", host, port))
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_wire_mode(mut self, mode: WireMode) -> Self {
        self.wire_mode = mode;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::from_host("localhost", DEFAULT_PORT)
    }
}

/// Stream and framing state of an open connection.
struct Transport {
    stream: TcpStream,
    decoder: Decoder,
}

/// A connection to a necho server.
///
/// Exchanges are strictly sequential: a request holds the transport until
/// its response has been read.
pub struct Connection {
    config: ConnectionConfig,
    encoder: Encoder,
    transport: Mutex<Option<Transport>>,
    connected: AtomicBool,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            encoder: Encoder::new(config.wire_mode).with_max_message_size(config.max_message_size),
            config,
            transport: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Returns the connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let connect = TcpStream::connect(self.config.addr.as_str());
        let result = match self.config.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect).await.map_err(|_| {
                tracing::debug!("Connection timeout");
                ClientError::Timeout
            })?,
            None => connect.await,
        };
        let stream = result.map_err(|source| {
            tracing::debug!("Connection failed: {}", source);
            ClientError::Connect {
                addr: self.config.addr.clone(),
                source,
            }
        })?;

        stream.set_nodelay(true).ok();

        let decoder = Decoder::new(self.config.wire_mode)
            .with_max_message_size(self.config.max_message_size);
        *self.transport.lock().await = Some(Transport { stream, decoder });
        self.connected.store(true, Ordering::SeqCst);

        tracing::debug!("Connected to {}", self.config.addr);
        Ok(())
    }

    /// Sends a request and waits for its response.
    ///
    /// Any failure leaves the connection closed; the stream cannot be
    /// trusted to be aligned on a message boundary afterwards.
    pub async fn request(&self, request: &EchoRequest) -> Result<EchoResponse, ClientError> {
        let encoded = self.encoder.encode_request(request)?;

        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(ClientError::NotConnected)?;

        let read_size = self.read_size(&transport.decoder);
        let exchange = Self::exchange(transport, &encoded, read_size);
        let result = with_timeout(self.config.request_timeout, exchange).await;

        if let Err(e) = &result {
            tracing::debug!("Request failed, dropping connection: {}", e);
            *guard = None;
            self.connected.store(false, Ordering::SeqCst);
        }
        result
    }

    /// Size of one socket read.
    ///
    /// A single-read message must arrive in one read, so that read has to
    /// cover the whole message bound.
    fn read_size(&self, decoder: &Decoder) -> usize {
        match self.config.wire_mode {
            WireMode::Single => decoder.read_buffer_size(),
            WireMode::Jsonl => self.config.read_buffer_size,
        }
    }

    async fn exchange(
        transport: &mut Transport,
        encoded: &[u8],
        read_buffer_size: usize,
    ) -> Result<EchoResponse, ClientError> {
        transport.stream.write_all(encoded).await?;
        tracing::debug!("Request sent ({} bytes), waiting for response...", encoded.len());

        let mut buf = vec![0u8; read_buffer_size];
        loop {
            let n = transport.stream.read(&mut buf).await?;
            if n == 0 {
                tracing::debug!("Connection closed (0 bytes)");
                return Err(ClientError::ConnectionClosed);
            }
            tracing::debug!("Read {} bytes from socket", n);

            transport.decoder.extend(&buf[..n]);
            if let Some(response) = transport.decoder.decode_response()? {
                return Ok(response);
            }
            tracing::debug!("No complete response yet, continuing to read...");
        }
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Closes the connection. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut transport) = self.transport.lock().await.take() {
            tracing::debug!("Closing connection to {}", self.config.addr);
            let _ = transport.stream.shutdown().await;
        }
        Ok(())
    }
}

async fn with_timeout<T, F>(timeout: Option<Duration>, fut: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match timeout {
        Some(duration) => tokio::time::timeout(duration, fut).await.map_err(|_| {
            tracing::debug!("Request timed out after {:?}", duration);
            ClientError::Timeout
        })?,
        None => fut.await,
    }
}
