//! The seam between the response pipeline and the connection.
//!
//! A [`Transmitter`] receives the frozen response head plus exactly one
//! payload and performs the byte-level delivery. Every transmit call is
//! terminal for the response that made it.

use bytes::Bytes;
use futures_core::Stream;
use futures_util::future::BoxFuture;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;

use crate::http::headers::Headers;
use crate::http::status::Status;

/// A push-based sequence of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Bytes> + Send + 'static>>;

/// Status line and headers of a committed response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: Status,
    pub headers: Headers,
}

/// What a committed response sends as its body.
pub enum Payload {
    Buffer(Bytes),
    File(PathBuf),
    Stream(ByteStream),
}

impl Payload {
    /// Hands the payload to the matching transmitter operation.
    pub async fn dispatch(self, transmitter: &dyn Transmitter, head: ResponseHead) -> io::Result<()> {
        match self {
            Payload::Buffer(body) => transmitter.transmit(head, body).await,
            Payload::File(path) => transmitter.transmit_file(head, path).await,
            Payload::Stream(stream) => transmitter.transmit_stream(head, stream).await,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Buffer(body) => f.debug_tuple("Buffer").field(&body.len()).finish(),
            Payload::File(path) => f.debug_tuple("File").field(path).finish(),
            Payload::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Delivers a response to the client.
///
/// For streams the transmitter is the consumer: it pulls the next chunk only
/// once the previous one has been written, and stops pulling (dropping the
/// stream) if the connection goes away.
pub trait Transmitter: Send + Sync {
    /// Whether the underlying connection can still take a response.
    fn is_open(&self) -> bool;

    fn transmit(&self, head: ResponseHead, body: Bytes) -> BoxFuture<'_, io::Result<()>>;

    /// Sends a file; the transmitter works out its length and type.
    fn transmit_file(&self, head: ResponseHead, path: PathBuf) -> BoxFuture<'_, io::Result<()>>;

    fn transmit_stream(&self, head: ResponseHead, stream: ByteStream) -> BoxFuture<'_, io::Result<()>>;
}
