//! Launch configuration.
//!
//! Loaded from an optional YAML file (path in `TETHER_CONFIG`), with the
//! `LISTEN` environment variable overriding the listen address.

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    pub listen_addr: String,
    pub base_dir: PathBuf,
    pub reloadable: bool,
    pub max_content_length: usize,
    pub buffer_size: usize,
    pub session: SessionConfig,
    pub other: HashMap<String, String>,
}

/// Client-side session cookie settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Prefix of the chunk cookie names (`{cookie_name}_{index}`).
    pub cookie_name: String,
    /// Upper bound on a whole `Set-Cookie` value: name, value and attributes.
    pub max_cookie_size: usize,
    pub max_chunks: usize,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    /// Cookie lifetime in seconds; none means a browser-session cookie.
    pub max_age: Option<i64>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            base_dir: PathBuf::from("."),
            reloadable: false,
            max_content_length: 1024 * 1024,
            buffer_size: 8192,
            session: SessionConfig::default(),
            other: HashMap::new(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "TETHER_SESSION".to_string(),
            max_cookie_size: 4093,
            max_chunks: 8,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
            max_age: None,
        }
    }
}

impl LaunchConfig {
    /// Loads the configuration for the running process.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("TETHER_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.listen_addr = listen_addr;
        }

        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_yaml::from_str(yaml).context("failed to parse YAML config")?;
        if cfg.buffer_size == 0 {
            anyhow::bail!("buffer_size must be greater than zero");
        }
        Ok(cfg)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn buffer_allocator(&self) -> BufferAllocator {
        BufferAllocator::new(self.buffer_size)
    }

    pub fn is_reloadable(&self) -> bool {
        self.reloadable
    }

    pub fn max_content_length(&self) -> usize {
        self.max_content_length
    }

    /// Free-form property lookup for application wiring.
    pub fn other<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.other.get(key).map(String::as_str).unwrap_or(default)
    }

    /// Resolves `path` against the base directory unless it is absolute.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Hands out byte buffers sized for this server.
#[derive(Debug, Clone, Copy)]
pub struct BufferAllocator {
    chunk_size: usize,
}

impl BufferAllocator {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn buffer(&self, capacity: usize) -> BytesMut {
        BytesMut::with_capacity(capacity)
    }

    /// An empty, non-allocating buffer.
    pub fn empty(&self) -> Bytes {
        Bytes::new()
    }

    /// Copies `text` into a fresh UTF-8 buffer.
    pub fn encode_str(&self, text: &str) -> Bytes {
        let mut buf = self.buffer(text.len());
        buf.put_slice(text.as_bytes());
        buf.freeze()
    }

    /// Preferred size of read and write chunks.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
