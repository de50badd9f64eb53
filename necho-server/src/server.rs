//! TCP server implementation.

use crate::error::ServerError;
use crate::handler::EchoHandler;
use crate::session::Session;
use necho_protocol::{Decoder, WireMode, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT};
use parking_lot::Mutex;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::watch;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Listen backlog.
    pub backlog: u32,
    /// Per-message read timeout (None = wait forever).
    pub read_timeout: Option<Duration>,
    /// Per-message write timeout (None = wait forever).
    pub write_timeout: Option<Duration>,
    /// Message framing.
    pub wire_mode: WireMode,
    /// Maximum encoded message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            backlog: 5,
            read_timeout: None,
            write_timeout: None,
            wire_mode: WireMode::Single,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    pub fn with_wire_mode(mut self, mode: WireMode) -> Self {
        self.wire_mode = mode;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server for necho.
///
/// Owns the listening socket from [`bind`](Self::bind) until
/// [`shutdown`](Self::shutdown) or the end of [`run`](Self::run).
pub struct Server {
    config: ServerConfig,
    local_addr: SocketAddr,
    listener: Mutex<Option<TcpListener>>,
    handler: EchoHandler,
    stats: Arc<ServerStats>,
    shutdown: watch::Sender<bool>,
    running: AtomicBool,
}

impl Server {
    /// Binds the listening socket.
    ///
    /// Must be called from within a Tokio runtime. A bind failure is fatal
    /// and reported as [`ServerError::Bind`].
    pub fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let bind_err = |source: std::io::Error| ServerError::Bind {
            addr: config.bind_addr,
            source,
        };
        let listener = Self::listen(&config).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            handler: EchoHandler::new(config.wire_mode, config.max_message_size),
            config,
            local_addr,
            listener: Mutex::new(Some(listener)),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        })
    }

    fn listen(config: &ServerConfig) -> std::io::Result<TcpListener> {
        let socket = match config.bind_addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.bind(config.bind_addr)?;
        socket.listen(config.backlog)
    }

    /// Runs the accept loop until shutdown.
    ///
    /// Each accepted connection gets its own task; the loop never waits on
    /// one. In-flight connections are not interrupted by shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let mut shutdown_rx = self.shutdown.subscribe();
        let listener = match self.listener.lock().take() {
            Some(listener) => listener,
            None if *shutdown_rx.borrow() => return Err(ServerError::ShuttingDown),
            None => return Err(ServerError::AlreadyRunning),
        };
        self.running.store(true, Ordering::SeqCst);

        tracing::info!(
            "Server listening on {} (backlog {}, wire mode {})",
            self.local_addr,
            self.config.backlog,
            self.config.wire_mode
        );

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }

            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        drop(listener);
        self.running.store(false, Ordering::SeqCst);
        tracing::info!(
            "Server shutting down ({} connections, {} requests, {} errors)",
            self.stats.connections_total.load(Ordering::Relaxed),
            self.stats.requests_total.load(Ordering::Relaxed),
            self.stats.errors_total.load(Ordering::Relaxed)
        );
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
        self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

        let handler = self.handler.clone();
        let stats = self.stats.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let mut session = Session::new(addr);
            tracing::info!("Client connected: {} (session {})", addr, session.id);

            let result =
                Self::handle_connection(stream, &mut session, &handler, &config, &stats).await;

            if let Err(e) = result {
                tracing::warn!("[{}] Connection error: {}", addr, e);
                stats.errors_total.fetch_add(1, Ordering::Relaxed);
            }

            stats.connections_active.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(
                "Client disconnected: {} ({} requests, {} errors, {:?})",
                addr,
                session.request_count(),
                session.error_count(),
                session.age()
            );
        });
    }

    /// Serves one connection: read a request, answer it, repeat until the
    /// peer closes or the transport fails.
    async fn handle_connection(
        mut stream: TcpStream,
        session: &mut Session,
        handler: &EchoHandler,
        config: &ServerConfig,
        stats: &ServerStats,
    ) -> Result<(), ServerError> {
        let addr = session.remote_addr;
        let mut decoder =
            Decoder::new(config.wire_mode).with_max_message_size(config.max_message_size);
        let mut buf = vec![0u8; decoder.read_buffer_size()];

        loop {
            let n = with_timeout(config.read_timeout, "read", stream.read(&mut buf)).await?;
            if n == 0 {
                tracing::debug!("[{}] Connection closed by client", addr);
                return Ok(());
            }
            tracing::debug!("[{}] Received {} bytes", addr, n);
            decoder.extend(&buf[..n]);

            while let Some(payload) = decoder.decode_frame()? {
                let response = handler.handle(session, &payload);

                stats.requests_total.fetch_add(1, Ordering::Relaxed);
                if response.is_error() {
                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                }
                session.record_request(response.is_error());

                let response_bytes = handler.encode(&response)?;
                tracing::info!(
                    "[{}] Response: {:?} ({} bytes)",
                    addr,
                    response.status(),
                    response_bytes.len()
                );

                with_timeout(
                    config.write_timeout,
                    "write",
                    stream.write_all(&response_bytes),
                )
                .await?;
            }
        }
    }

    /// Initiates server shutdown.
    ///
    /// Stops the accept loop and releases the listening socket. Later calls
    /// to [`run`](Self::run) fail with [`ServerError::ShuttingDown`].
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        // Not running: nothing else will drop the listener.
        drop(self.listener.lock().take());
    }

    /// Returns whether the accept loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns the bound address (with the actual port if 0 was requested).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

async fn with_timeout<T, F>(
    timeout: Option<Duration>,
    what: &'static str,
    fut: F,
) -> Result<T, ServerError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match timeout {
        Some(duration) => tokio::time::timeout(duration, fut)
            .await
            .map_err(|_| ServerError::Timeout(what))?
            .map_err(ServerError::Io),
        None => fut.await.map_err(ServerError::Io),
    }
}
