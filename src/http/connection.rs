use bytes::{Buf, BytesMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use crate::config::LaunchConfig;
use crate::error::ResponseError;
use crate::http::handler::{Exchange, Handler};
use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::status::Status;
use crate::http::transmitter::Transmitter;
use crate::http::writer::TcpTransmitter;
use crate::session::{ClientSideSessionCodec, CookieSessionStore, Session};

pub struct Connection {
    reader: OwnedReadHalf,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    open: Arc<AtomicBool>,
    buffer: BytesMut,
    state: ConnectionState,
    launch: Arc<LaunchConfig>,
    codec: Arc<ClientSideSessionCodec>,
    handler: Arc<dyn Handler>,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Closed,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        launch: Arc<LaunchConfig>,
        codec: Arc<ClientSideSessionCodec>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader,
            writer: Arc::new(Mutex::new(writer)),
            open: Arc::new(AtomicBool::new(true)),
            buffer: BytesMut::with_capacity(launch.buffer_size),
            state: ConnectionState::Reading,
            launch,
            codec,
            handler,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = match self.read_request().await? {
                        Some(req) => ConnectionState::Processing(req),
                        None => ConnectionState::Closed,
                    };
                }

                ConnectionState::Processing(req) => {
                    let keep_alive = self.process(req).await?;
                    self.state = if keep_alive {
                        ConnectionState::Reading // go back for next request
                    } else {
                        ConnectionState::Closed
                    };
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    pub async fn read_request(&mut self) -> anyhow::Result<Option<Request>> {
        loop {
            // Try parsing whatever we already have
            match parse_http_request(&self.buffer, self.launch.max_content_length()) {
                Ok((request, consumed)) => {
                    // Remove consumed bytes
                    self.buffer.advance(consumed);
                    return Ok(Some(request));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data → fall through to read
                }

                Err(ParseError::PayloadTooLarge) => {
                    self.reject(Status::PAYLOAD_TOO_LARGE).await?;
                    return Ok(None);
                }

                Err(e) => {
                    tracing::warn!(error = ?e, "Malformed request");
                    self.reject(Status::BAD_REQUEST).await?;
                    return Ok(None);
                }
            }

            // Read more data
            let n = self.reader.read_buf(&mut self.buffer).await?;

            if n == 0 {
                // Client closed connection
                self.open.store(false, Ordering::Release);
                return Ok(None);
            }
        }
    }

    /// Runs the handler for one request. Returns whether to keep reading.
    async fn process(&mut self, request: Request) -> anyhow::Result<bool> {
        let keep_alive = request.keep_alive();
        let method = request.method.clone();
        let path = request.path.clone();

        let transmitter = self.transmitter(keep_alive);
        let mut response = Response::new(transmitter.clone(), self.launch.clone());

        let store = CookieSessionStore::new(self.codec.clone(), request.cookies());
        let session = Session::new(store);
        session.install(&mut response);

        let mut handling = self.handler.handle(Exchange {
            request,
            response,
            session,
        });

        // Keep reading while the handler runs so a client that hangs up is
        // seen before the remaining before-send actions. Pipelined bytes
        // stay in the buffer for the next request.
        let watch_limit = self.launch.buffer_size.max(1) * 4;
        let result = loop {
            let watching = self.open.load(Ordering::Acquire) && self.buffer.len() < watch_limit;
            tokio::select! {
                result = &mut handling => break result,
                read = self.reader.read_buf(&mut self.buffer), if watching => match read {
                    Ok(0) | Err(_) => {
                        tracing::debug!(method = ?method, path = %path, "Client went away mid-request");
                        self.open.store(false, Ordering::Release);
                    }
                    Ok(_) => {}
                },
            }
        };

        match result {
            Ok(()) if transmitter.is_committed() => {
                tracing::debug!(method = ?method, path = %path, "Request handled");
            }
            Ok(()) => {
                tracing::warn!(method = ?method, path = %path, "Handler did not send a response");
                self.fallback(&transmitter, Status::INTERNAL_SERVER_ERROR).await?;
            }
            Err(e) if transmitter.is_committed() || !transmitter.is_open() => {
                tracing::error!(method = ?method, path = %path, error = %e, "Request failed after commit");
            }
            Err(e) => {
                let status = match e.downcast_ref::<ResponseError>() {
                    Some(ResponseError::Transmit(io)) if io.kind() == std::io::ErrorKind::NotFound => {
                        Status::NOT_FOUND
                    }
                    _ => Status::INTERNAL_SERVER_ERROR,
                };
                tracing::error!(method = ?method, path = %path, error = %e, "Request failed");
                self.fallback(&transmitter, status).await?;
            }
        }

        Ok(keep_alive && self.open.load(Ordering::Acquire))
    }

    fn transmitter(&self, keep_alive: bool) -> Arc<TcpTransmitter> {
        Arc::new(TcpTransmitter::new(
            self.writer.clone(),
            self.open.clone(),
            self.launch.buffer_allocator(),
            keep_alive,
        ))
    }

    async fn fallback(&self, transmitter: &Arc<TcpTransmitter>, status: Status) -> anyhow::Result<()> {
        if !transmitter.is_open() {
            return Ok(());
        }
        let reason = status.reason_phrase().to_string();
        let mut response = Response::new(transmitter.clone(), self.launch.clone());
        response.status(status);
        response.send_text(&reason).await?;
        Ok(())
    }

    /// Answers a request that could not be parsed and closes the connection.
    async fn reject(&self, status: Status) -> anyhow::Result<()> {
        let transmitter = self.transmitter(false);
        self.fallback(&transmitter, status).await?;
        self.open.store(false, Ordering::Release);
        Ok(())
    }
}
