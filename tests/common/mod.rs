#![allow(dead_code)]

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tether::config::LaunchConfig;
use tether::http::response::Response;
use tether::http::transmitter::{ByteStream, ResponseHead, Transmitter};

/// What a transmitter was asked to send.
#[derive(Debug, Clone)]
pub enum Transmission {
    Buffer(ResponseHead, Bytes),
    File(ResponseHead, PathBuf, Bytes),
    Stream(ResponseHead, Vec<Bytes>),
}

impl Transmission {
    pub fn head(&self) -> &ResponseHead {
        match self {
            Transmission::Buffer(head, _) => head,
            Transmission::File(head, _, _) => head,
            Transmission::Stream(head, _) => head,
        }
    }
}

/// Transmitter that keeps everything in memory.
#[derive(Default)]
pub struct RecordingTransmitter {
    closed: AtomicBool,
    sent: Mutex<Vec<Transmission>>,
}

impl RecordingTransmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Transmission> {
        self.sent.lock().unwrap().clone()
    }

    /// The one transmission made, panicking otherwise.
    pub fn only(&self) -> Transmission {
        let sent = self.sent();
        assert_eq!(sent.len(), 1, "expected exactly one transmission");
        sent[0].clone()
    }
}

impl Transmitter for RecordingTransmitter {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn transmit(&self, head: ResponseHead, body: Bytes) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(Transmission::Buffer(head, body));
            Ok(())
        })
    }

    fn transmit_file(&self, head: ResponseHead, path: PathBuf) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            let contents = tokio::fs::read(&path).await?;
            self.sent
                .lock()
                .unwrap()
                .push(Transmission::File(head, path, Bytes::from(contents)));
            Ok(())
        })
    }

    fn transmit_stream(&self, head: ResponseHead, mut stream: ByteStream) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            let mut chunks = Vec::new();
            while let Some(chunk) = stream.next().await {
                chunks.push(chunk);
            }
            self.sent.lock().unwrap().push(Transmission::Stream(head, chunks));
            Ok(())
        })
    }
}

pub fn launch() -> Arc<LaunchConfig> {
    Arc::new(LaunchConfig::default())
}

pub fn response(transmitter: &Arc<RecordingTransmitter>) -> Response {
    Response::new(transmitter.clone(), launch())
}
