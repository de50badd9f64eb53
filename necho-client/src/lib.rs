//! # necho-client
//!
//! Client library for necho.
//!
//! This crate provides:
//! - Async TCP connection with optional connect and request timeouts
//! - Strictly sequential request/response exchanges
//! - High-level echo API

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
