//! Interactive session.

use colored::Colorize;
use necho_client::{Client, ClientError};
use necho_protocol::EchoResponse;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;

const QUIT_TOKENS: &[&str] = &["quit", "exit", "q"];

const SEPARATOR: &str = "==================================================";

/// What the operator typed at the count prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountInput {
    Quit,
    Count(u64),
}

/// Input rejected locally, before anything is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    NotAnInteger,
    NotPositive,
    EmptyMessage,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::NotAnInteger => write!(f, "count must be an integer"),
            InputError::NotPositive => write!(f, "count must be a positive integer"),
            InputError::EmptyMessage => write!(f, "message must not be empty"),
        }
    }
}

/// Parses the count prompt: a quit token or a positive integer.
pub fn parse_count(line: &str) -> Result<CountInput, InputError> {
    let line = line.trim();
    if QUIT_TOKENS.iter().any(|t| line.eq_ignore_ascii_case(t)) {
        return Ok(CountInput::Quit);
    }
    let n: i64 = line.parse().map_err(|_| InputError::NotAnInteger)?;
    if n <= 0 {
        return Err(InputError::NotPositive);
    }
    Ok(CountInput::Count(n as u64))
}

/// Parses the message prompt, trimming surrounding whitespace.
pub fn parse_message(line: &str) -> Result<&str, InputError> {
    let message = line.trim();
    if message.is_empty() {
        return Err(InputError::EmptyMessage);
    }
    Ok(message)
}

/// Renders a response for the terminal, echoes numbered from 1.
pub fn render_response(response: &EchoResponse) -> String {
    match response {
        EchoResponse::Success { n, echoes } => {
            let mut output = format!("echo count: {}", n);
            for (i, echo) in echoes.iter().enumerate() {
                output.push_str(&format!("\n  {}. {}", i + 1, echo));
            }
            output
        }
        EchoResponse::Error { message } => format!("error: {}", message),
    }
}

fn history_path() -> PathBuf {
    home::home_dir()
        .map(|h| h.join(".necho_history"))
        .unwrap_or_else(|| ".necho_history".into())
}

pub async fn run(client: Client) -> Result<(), Box<dyn std::error::Error>> {
    let addr = client.connection().config().addr.clone();
    println!("{}", "necho CLI".bold().cyan());
    println!("Connecting to {}...", addr);

    if let Err(e) = client.connect().await {
        eprintln!("{}: {}", "Connection failed".red(), e);
        std::process::exit(1);
    }
    println!("{}", "Connected!".green());

    let result = session(&client).await;

    // Disconnect
    let _ = client.close().await;
    println!("{}", "Disconnected.".dimmed());

    result
}

async fn session(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    let history_path = history_path();
    let _ = rl.load_history(&history_path);

    println!("Enter an echo count, then a message. Type 'quit' to exit.\n");

    let result = loop {
        let n = match read_line(&mut rl, "count>") {
            Some(line) => match parse_count(&line) {
                Ok(CountInput::Quit) => break Ok(()),
                Ok(CountInput::Count(n)) => n,
                Err(e) => {
                    println!("{}: {}\n", "Error".red(), e);
                    continue;
                }
            },
            None => break Ok(()),
        };

        let message = match read_line(&mut rl, "message>") {
            Some(line) => match parse_message(&line) {
                Ok(message) => message.to_string(),
                Err(e) => {
                    println!("{}: {}\n", "Error".red(), e);
                    continue;
                }
            },
            None => break Ok(()),
        };

        let interrupt = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        match echo_until(client, n, message, interrupt).await {
            None => {
                println!("^C");
                break Ok(());
            }
            Some(Ok(response)) => {
                println!("\n{}", SEPARATOR);
                println!("{}", render_response(&response));
                println!("{}\n", SEPARATOR);
            }
            Some(Err(e)) => {
                println!("{}: {}", "Error".red(), e);
                break Err(e.into());
            }
        }
    };

    let _ = rl.save_history(&history_path);
    result
}

/// Sends one request, giving up if `interrupt` completes first.
///
/// `None` means the session was interrupted while waiting for the response.
async fn echo_until<F>(
    client: &Client,
    n: u64,
    message: String,
    interrupt: F,
) -> Option<Result<EchoResponse, ClientError>>
where
    F: Future<Output = ()>,
{
    tokio::select! {
        result = client.echo(n as i64, message) => Some(result),
        _ = interrupt => None,
    }
}

/// Reads one line; `None` ends the session (EOF, interrupt, terminal error).
fn read_line(rl: &mut Editor<(), DefaultHistory>, prompt: &str) -> Option<String> {
    match rl.readline(&format!("{} ", prompt.cyan())) {
        Ok(line) => Some(line),
        Err(ReadlineError::Interrupted) => {
            println!("^C");
            None
        }
        Err(ReadlineError::Eof) => {
            println!("^D");
            None
        }
        Err(err) => {
            println!("{}: {:?}", "Error".red(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use necho_client::ConnectionConfig;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Peer that reads requests and answers each with `reply`, if any.
    async fn peer(reply: Option<&'static str>) -> Client {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            while stream.read(&mut buf).await.unwrap_or(0) > 0 {
                if let Some(reply) = reply {
                    stream.write_all(reply.as_bytes()).await.unwrap();
                }
            }
        });

        let client = Client::new(ConnectionConfig::new(addr));
        client.connect().await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_interrupt_while_waiting_for_response() {
        let client = peer(None).await;
        let interrupt = tokio::time::sleep(Duration::from_millis(50));
        let outcome = echo_until(&client, 1, "x".to_string(), interrupt).await;
        assert!(outcome.is_none());

        client.close().await.unwrap();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_response_before_interrupt() {
        let client = peer(Some(r#"{"status":"success","n":1,"echoes":["x"]}"#)).await;
        let outcome = echo_until(&client, 1, "x".to_string(), std::future::pending()).await;
        assert_eq!(outcome.unwrap().unwrap(), EchoResponse::success(1, "x"));
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("3"), Ok(CountInput::Count(3)));
        assert_eq!(parse_count("  12 \n"), Ok(CountInput::Count(12)));
        assert_eq!(parse_count("0"), Err(InputError::NotPositive));
        assert_eq!(parse_count("-4"), Err(InputError::NotPositive));
        assert_eq!(parse_count("three"), Err(InputError::NotAnInteger));
        assert_eq!(parse_count("2.5"), Err(InputError::NotAnInteger));
        assert_eq!(parse_count(""), Err(InputError::NotAnInteger));
    }

    #[test]
    fn test_quit_tokens() {
        for token in ["quit", "exit", "q", "QUIT", " Exit "] {
            assert_eq!(parse_count(token), Ok(CountInput::Quit), "{}", token);
        }
    }

    #[test]
    fn test_parse_message() {
        assert_eq!(parse_message("  hello world  "), Ok("hello world"));
        assert_eq!(parse_message("안녕"), Ok("안녕"));
        assert_eq!(parse_message("   "), Err(InputError::EmptyMessage));
    }

    #[test]
    fn test_render_success() {
        let rendered = render_response(&EchoResponse::success(2, "hi"));
        assert_eq!(rendered, "echo count: 2\n  1. hi\n  2. hi");
    }

    #[test]
    fn test_render_error() {
        let rendered = render_response(&EchoResponse::error("n must be a positive integer"));
        assert_eq!(rendered, "error: n must be a positive integer");
    }
}
