//! necho-cli - Command-line client for necho
//!
//! Provides both an interactive session and one-shot echo requests.

mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use necho_client::{Client, ConnectionConfig};
use necho_protocol::{WireMode, DEFAULT_PORT};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "necho-cli")]
#[command(about = "Command-line client for the necho N-Echo server")]
#[command(version)]
struct Cli {
    /// Server host name or address
    #[arg(default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Connect timeout in seconds (default: none)
    #[arg(long, env = "NECHO_CONNECT_TIMEOUT")]
    connect_timeout: Option<u64>,

    /// Request timeout in seconds (default: none)
    #[arg(long, env = "NECHO_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// Socket read buffer size in bytes (jsonl mode)
    #[arg(long, env = "NECHO_READ_BUFFER_SIZE")]
    read_buffer_size: Option<usize>,

    /// Message framing, must match the server (single | jsonl)
    #[arg(long, env = "NECHO_WIRE_MODE", default_value = "single")]
    wire_mode: WireMode,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session (default)
    Repl,

    /// Send one echo request and print the response
    Echo {
        /// Echo count, sent as given
        #[arg(allow_negative_numbers = true)]
        n: i64,

        /// Message to echo
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ConnectionConfig::from_host(&cli.host, cli.port).with_wire_mode(cli.wire_mode);
    if let Some(secs) = cli.connect_timeout {
        config = config.with_connect_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = cli.request_timeout {
        config = config.with_request_timeout(Duration::from_secs(secs));
    }
    if let Some(size) = cli.read_buffer_size {
        config = config.with_read_buffer_size(size);
    }
    let client = Client::new(config);

    match cli.command {
        Some(Commands::Repl) | None => {
            repl::run(client).await?;
        }
        Some(Commands::Echo { n, message }) => {
            if let Err(e) = client.connect().await {
                eprintln!("{}: {}", "Connection failed".red(), e);
                std::process::exit(1);
            }

            let result = client.echo(n, message).await;
            let _ = client.close().await;

            match result {
                Ok(response) => {
                    println!("{}", repl::render_response(&response));
                    if response.is_error() {
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
