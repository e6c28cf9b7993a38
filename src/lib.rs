//! Tether - HTTP response pipeline with client-side sessions
//!
//! Core library for the response commit pipeline and cookie-backed sessions.

pub mod config;
pub mod error;
pub mod http;
pub mod server;
pub mod session;
