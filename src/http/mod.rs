//! HTTP protocol implementation.
//!
//! This module implements an HTTP/1.1 server with keep-alive connections and
//! a response object that commits exactly once.
//!
//! # Architecture
//!
//! - **`connection`**: The per-connection request/response state machine
//! - **`parser`**: Parses incoming HTTP requests from byte buffers
//! - **`request`**: HTTP request representation and parsing utilities
//! - **`response`**: The mutable response, its before-send queue and send methods
//! - **`headers`**: Case-insensitive header storage and the response header state
//! - **`cookie`**: Outgoing cookies and `Cookie` request header parsing
//! - **`status`**: Status codes and reason phrases
//! - **`transmitter`**: The seam between a committed response and the wire
//! - **`writer`**: The TCP transmitter
//! - **`handler`**: Application entry point
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request received
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Handler runs, response commits
//!        └──────┬───────────┘
//!               │ Before-send actions drained, bytes written
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tether::config::LaunchConfig;
//! use tether::http::handler::Exchange;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let launch = Arc::new(LaunchConfig::default());
//!     let handler = Arc::new(|ex: Exchange| async move {
//!         ex.response.send_text("hello").await?;
//!         Ok(())
//!     });
//!     tether::server::listener::run(launch, handler).await
//! }
//! ```

pub mod connection;
pub mod cookie;
pub mod handler;
pub mod headers;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod status;
pub mod transmitter;
pub mod writer;
