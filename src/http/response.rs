//! The response commit pipeline.
//!
//! A [`Response`] accumulates status, headers and cookies while a handler
//! runs. Sending a body consumes it and runs the commit sequence:
//!
//! ```text
//!   pending before-send actions (one at a time, registration order)
//!        │
//!        ▼
//!   cookies rendered as Set-Cookie headers
//!        │
//!        ▼
//!   Transmitter::{transmit, transmit_file, transmit_stream}
//! ```
//!
//! Because every send method takes `self`, status and headers cannot be
//! touched once the commit has started. Before-send actions only see
//! [`ResponseMeta`] and cannot register further actions.

use bytes::Bytes;
use futures_core::Stream;
use futures_util::future::BoxFuture;
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::{BufferAllocator, LaunchConfig};
use crate::error::ResponseError;
use crate::http::cookie::{Cookie, CookieJar};
use crate::http::headers::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HeaderState, SET_COOKIE};
use crate::http::mime::{OCTET_STREAM, PLAIN_TEXT_UTF8};
use crate::http::status::Status;
use crate::http::transmitter::{Payload, ResponseHead, Transmitter};

/// An action run right before the body is transmitted.
pub type BeforeSendAction =
    Box<dyn for<'a> FnOnce(&'a mut ResponseMeta) -> BoxFuture<'a, anyhow::Result<()>> + Send>;

/// How a commit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sent {
    /// The transmitter took the payload.
    Transmitted,
    /// The connection closed before transmission; nothing was sent.
    Abandoned,
}

/// Response metadata: everything but the body.
#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    status: Status,
    headers: HeaderState,
    cookies: CookieJar,
}

impl ResponseMeta {
    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<Status>) -> &mut Self {
        self.status = status.into();
        self
    }

    pub fn headers(&self) -> &HeaderState {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderState {
        &mut self.headers
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn add_cookie(&mut self, cookie: Cookie) -> &mut Cookie {
        self.cookies.add(cookie)
    }

    pub fn cookie(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Cookie {
        self.cookies.add(Cookie::new(name, value))
    }

    /// Records an empty cookie with Max-Age 0 so the client drops it.
    pub fn expire_cookie(&mut self, name: impl Into<String>) -> &mut Cookie {
        let cookie = self.cookie(name, "");
        cookie.set_max_age(0);
        cookie
    }

    fn into_head(self) -> ResponseHead {
        let mut headers = self.headers;
        for cookie in self.cookies.iter() {
            headers.add(SET_COOKIE, cookie.encode());
        }
        ResponseHead {
            status: self.status,
            headers: headers.into_headers(),
        }
    }
}

/// An outgoing response for one request.
pub struct Response {
    meta: ResponseMeta,
    pending: VecDeque<BeforeSendAction>,
    transmitter: Arc<dyn Transmitter>,
    launch: Arc<LaunchConfig>,
}

impl Response {
    pub fn new(transmitter: Arc<dyn Transmitter>, launch: Arc<LaunchConfig>) -> Self {
        Self {
            meta: ResponseMeta::default(),
            pending: VecDeque::new(),
            transmitter,
            launch,
        }
    }

    pub fn launch(&self) -> &LaunchConfig {
        &self.launch
    }

    pub fn get_status(&self) -> &Status {
        self.meta.status()
    }

    pub fn status(&mut self, status: Status) -> &mut Self {
        self.meta.set_status(status);
        self
    }

    pub fn status_code(&mut self, code: u16) -> &mut Self {
        self.meta.set_status(Status::from_code(code));
        self
    }

    pub fn headers(&self) -> &HeaderState {
        self.meta.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderState {
        self.meta.headers_mut()
    }

    pub fn cookies(&self) -> &CookieJar {
        self.meta.cookies()
    }

    pub fn content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.meta.headers.set(CONTENT_TYPE, content_type);
        self
    }

    /// Sets the content type unless one is already present.
    ///
    /// `content_type` is only called when the header is missing.
    pub fn content_type_if_not_set<F, S>(&mut self, content_type: F) -> &mut Self
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        if !self.meta.headers.content_type_set() {
            self.content_type(content_type());
        }
        self
    }

    /// Marks the response as not to be compressed downstream.
    pub fn no_compress(&mut self) -> &mut Self {
        self.meta.headers.set(CONTENT_ENCODING, "identity");
        self
    }

    pub fn cookie(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Cookie {
        self.meta.cookie(name, value)
    }

    pub fn expire_cookie(&mut self, name: impl Into<String>) -> &mut Cookie {
        self.meta.expire_cookie(name)
    }

    /// Registers an action to run before the body is sent.
    ///
    /// Actions run one after another in registration order; each starts only
    /// after the previous one's future has completed.
    ///
    /// ```ignore
    /// response.before_send(|meta| Box::pin(async move {
    ///     meta.headers_mut().set("X-Served-By", "tether");
    ///     Ok(())
    /// }));
    /// ```
    pub fn before_send<F>(&mut self, action: F) -> &mut Self
    where
        F: for<'a> FnOnce(&'a mut ResponseMeta) -> BoxFuture<'a, anyhow::Result<()>> + Send + 'static,
    {
        self.pending.push_back(Box::new(action));
        self
    }

    /// Sends an empty body.
    pub async fn send(self) -> Result<Sent, ResponseError> {
        let empty = self.allocator().empty();
        self.commit_buffer(empty).await
    }

    /// Sends UTF-8 text, defaulting the content type to `text/plain;charset=utf-8`.
    pub async fn send_text(mut self, text: &str) -> Result<Sent, ResponseError> {
        let body = self.allocator().encode_str(text);
        self.content_type_if_not_set(|| PLAIN_TEXT_UTF8);
        self.commit_buffer(body).await
    }

    pub async fn send_text_with(
        mut self,
        content_type: impl Into<String>,
        text: &str,
    ) -> Result<Sent, ResponseError> {
        self.content_type(content_type);
        self.send_text(text).await
    }

    /// Sends raw bytes, defaulting the content type to `application/octet-stream`.
    pub async fn send_bytes(self, bytes: impl Into<Vec<u8>>) -> Result<Sent, ResponseError> {
        self.send_buffer(Bytes::from(bytes.into())).await
    }

    pub async fn send_bytes_with(
        mut self,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Result<Sent, ResponseError> {
        self.content_type(content_type);
        self.send_bytes(bytes).await
    }

    pub async fn send_buffer(mut self, buffer: Bytes) -> Result<Sent, ResponseError> {
        self.content_type_if_not_set(|| OCTET_STREAM);
        self.commit_buffer(buffer).await
    }

    pub async fn send_buffer_with(
        mut self,
        content_type: impl Into<String>,
        buffer: Bytes,
    ) -> Result<Sent, ResponseError> {
        self.content_type(content_type);
        self.send_buffer(buffer).await
    }

    /// Sends a file. Relative paths resolve against the base directory.
    ///
    /// No `Content-Length` is computed here; the transmitter does that.
    pub async fn send_file(self, path: impl AsRef<Path>) -> Result<Sent, ResponseError> {
        let path = self.launch.resolve(path);
        self.commit(Payload::File(path)).await
    }

    /// Streams the body from `stream`, which the transmitter consumes at its
    /// own pace.
    pub async fn send_stream<S>(self, stream: S) -> Result<Sent, ResponseError>
    where
        S: Stream<Item = Bytes> + Send + 'static,
    {
        self.commit(Payload::Stream(Box::pin(stream))).await
    }

    fn allocator(&self) -> BufferAllocator {
        self.launch.buffer_allocator()
    }

    async fn commit_buffer(mut self, buffer: Bytes) -> Result<Sent, ResponseError> {
        self.meta
            .headers
            .set(CONTENT_LENGTH, buffer.len().to_string());
        self.commit(Payload::Buffer(buffer)).await
    }

    async fn commit(self, payload: Payload) -> Result<Sent, ResponseError> {
        let Response {
            mut meta,
            mut pending,
            transmitter,
            ..
        } = self;

        let total = pending.len();
        while let Some(action) = pending.pop_front() {
            if !transmitter.is_open() {
                tracing::debug!(
                    remaining = pending.len() + 1,
                    "Connection closed, abandoning response before send"
                );
                return Ok(Sent::Abandoned);
            }

            if let Err(e) = action(&mut meta).await {
                tracing::warn!(
                    error = %e,
                    action = total - pending.len(),
                    "Before-send action failed, response not transmitted"
                );
                return Err(ResponseError::BeforeSend(e));
            }
        }

        if !transmitter.is_open() {
            tracing::debug!("Connection closed, abandoning response");
            return Ok(Sent::Abandoned);
        }

        tracing::trace!(status = meta.status().code(), payload = ?payload, "Transmitting response");
        payload.dispatch(transmitter.as_ref(), meta.into_head()).await?;
        Ok(Sent::Transmitted)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("meta", &self.meta)
            .field("pending", &self.pending.len())
            .finish()
    }
}
