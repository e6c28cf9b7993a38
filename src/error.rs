//! Error types for the response pipeline and the session layer.

use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by session reads, writes and persistence.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session key not found: {key}")]
    NotFound { key: String },

    #[error("session value for {key} is not a {expected}: {detail}")]
    TypeMismatch {
        key: String,
        expected: String,
        detail: String,
    },

    #[error(
        "session needs {chunks} cookies but at most {max_chunks} are allowed (largest entry: {largest_entry})"
    )]
    EncodingTooLarge {
        chunks: usize,
        max_chunks: usize,
        largest_entry: String,
    },

    #[error("session serialization error: {0}")]
    Serialization(String),

    #[error("session store error: {0}")]
    Store(String),
}

/// Errors that abort a response commit.
///
/// A connection that closes mid-commit is not an error; see
/// [`Sent::Abandoned`](crate::http::response::Sent::Abandoned).
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("before-send action failed: {0}")]
    BeforeSend(#[source] anyhow::Error),

    #[error("transmission failed: {0}")]
    Transmit(#[from] std::io::Error),
}
