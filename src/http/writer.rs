//! Writes committed responses to a TCP connection.

use bytes::{BufMut, Bytes};
use chrono::Utc;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::config::BufferAllocator;
use crate::http::headers::{
    CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, DATE, HeaderState, Headers, TRANSFER_ENCODING,
};
use crate::http::mime;
use crate::http::transmitter::{ByteStream, ResponseHead, Transmitter};

const HTTP_VERSION: &str = "HTTP/1.1";

fn serialize_head(head: &ResponseHead) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        head.status.code(),
        head.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in head.headers.iter() {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Transmitter for one request on a TCP connection.
///
/// The write half is shared with the connection so it can serve the next
/// request; `open` is shared too and flips to false on the first failed
/// write.
pub struct TcpTransmitter {
    stream: Arc<Mutex<OwnedWriteHalf>>,
    open: Arc<AtomicBool>,
    committed: AtomicBool,
    allocator: BufferAllocator,
    keep_alive: bool,
}

impl TcpTransmitter {
    pub fn new(
        stream: Arc<Mutex<OwnedWriteHalf>>,
        open: Arc<AtomicBool>,
        allocator: BufferAllocator,
        keep_alive: bool,
    ) -> Self {
        Self {
            stream,
            open,
            committed: AtomicBool::new(false),
            allocator,
            keep_alive,
        }
    }

    /// Whether any response bytes have been handed to the socket.
    pub fn is_committed(&self) -> bool {
        self.committed.load(Ordering::Acquire)
    }

    fn prepare(&self, headers: Headers) -> HeaderState {
        let mut headers = HeaderState::from_headers(headers);
        if !headers.contains(DATE) {
            headers.set_date(DATE, Utc::now());
        }
        if !self.keep_alive {
            headers.set(CONNECTION, "close");
        }
        headers
    }

    async fn write_all(&self, stream: &mut OwnedWriteHalf, bytes: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < bytes.len() {
            let n = match stream.write(&bytes[written..]).await {
                Ok(n) => n,
                Err(e) => {
                    self.open.store(false, Ordering::Release);
                    return Err(e);
                }
            };

            if n == 0 {
                self.open.store(false, Ordering::Release);
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "connection closed while writing",
                ));
            }

            written += n;
        }
        Ok(())
    }

    /// Once the head is out, any body failure leaves the framing broken.
    fn close_on_error<T>(&self, result: io::Result<T>) -> io::Result<T> {
        if result.is_err() {
            self.open.store(false, Ordering::Release);
        }
        result
    }

    /// Copies exactly `expected` bytes from `source`; a short source is an error.
    async fn copy_body<R>(&self, stream: &mut OwnedWriteHalf, mut source: R, expected: u64) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = self.allocator.buffer(self.allocator.chunk_size());
        let mut copied = 0u64;
        loop {
            chunk.clear();
            let n = source.read_buf(&mut chunk).await?;
            if n == 0 {
                break;
            }
            copied += n as u64;
            if copied > expected {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("body grew past its Content-Length of {}", expected),
                ));
            }
            self.write_all(stream, &chunk).await?;
        }

        if copied < expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("body ended after {} of {} bytes", copied, expected),
            ));
        }
        Ok(())
    }

    async fn write_head(&self, stream: &mut OwnedWriteHalf, head: &ResponseHead) -> io::Result<()> {
        self.committed.store(true, Ordering::Release);
        self.write_all(stream, &serialize_head(head)).await
    }

    async fn send_buffer(&self, head: ResponseHead, body: Bytes) -> io::Result<()> {
        let head = ResponseHead {
            headers: self.prepare(head.headers).into_headers(),
            status: head.status,
        };

        let mut buf = serialize_head(&head);
        buf.extend_from_slice(&body);

        let mut stream = self.stream.lock().await;
        self.committed.store(true, Ordering::Release);
        self.write_all(&mut stream, &buf).await?;
        stream.flush().await
    }

    async fn send_file(&self, head: ResponseHead, path: PathBuf) -> io::Result<()> {
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a file", path.display()),
            ));
        }
        let mut file = tokio::fs::File::open(&path).await?;

        let mut headers = self.prepare(head.headers);
        headers.set(CONTENT_LENGTH, metadata.len().to_string());
        if !headers.content_type_set() {
            headers.set(CONTENT_TYPE, mime::from_path(&path));
        }
        let head = ResponseHead {
            status: head.status,
            headers: headers.into_headers(),
        };

        let mut stream = self.stream.lock().await;
        self.write_head(&mut stream, &head).await?;

        let body = self.copy_body(&mut stream, &mut file, metadata.len()).await;
        if let Err(e) = &body {
            tracing::warn!(path = %path.display(), error = %e, "File failed after the head was sent");
        }
        self.close_on_error(body)?;

        tracing::debug!(path = %path.display(), bytes = metadata.len(), "File transmitted");
        let flushed = stream.flush().await;
        self.close_on_error(flushed)
    }

    async fn send_stream(&self, head: ResponseHead, mut body: ByteStream) -> io::Result<()> {
        let mut headers = self.prepare(head.headers);
        headers.remove(CONTENT_LENGTH);
        headers.set(TRANSFER_ENCODING, "chunked");
        let head = ResponseHead {
            status: head.status,
            headers: headers.into_headers(),
        };

        let mut stream = self.stream.lock().await;
        self.write_head(&mut stream, &head).await?;

        let mut chunks = 0usize;
        // The next chunk is only pulled once the previous one is on the wire.
        while let Some(chunk) = body.next().await {
            if chunk.is_empty() {
                continue;
            }

            let mut frame = self.allocator.buffer(chunk.len() + 12);
            frame.put_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
            frame.put_slice(&chunk);
            frame.put_slice(b"\r\n");

            if let Err(e) = self.write_all(&mut stream, &frame).await {
                tracing::debug!(chunks, error = %e, "Client went away, cancelling stream");
                return Err(e);
            }
            chunks += 1;
        }

        self.write_all(&mut stream, b"0\r\n\r\n").await?;
        tracing::debug!(chunks, "Stream transmitted");
        let flushed = stream.flush().await;
        self.close_on_error(flushed)
    }
}

impl Transmitter for TcpTransmitter {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn transmit(&self, head: ResponseHead, body: Bytes) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(self.send_buffer(head, body))
    }

    fn transmit_file(&self, head: ResponseHead, path: PathBuf) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(self.send_file(head, path))
    }

    fn transmit_stream(&self, head: ResponseHead, stream: ByteStream) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(self.send_stream(head, stream))
    }
}
