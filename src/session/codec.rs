//! Client-side session codec.
//!
//! A session is flattened into one record stream, base64url encoded, and cut
//! into chunks that each fit a single `Set-Cookie` header:
//!
//! ```text
//!   SessionData ──records──▶ bytes ──base64url──▶ text ──split──▶ chunks
//!
//!   chunk i  ⇒  Set-Cookie: {cookie_name}_{i}={count}.{payload_i}; Path=/; HttpOnly
//! ```
//!
//! Record stream layout (big-endian):
//!
//! ```text
//!   u8  version (= 1)
//!   u32 record count
//!   u32 length of the records that follow
//!   repeated, count times:
//!     u8  kind           0 = string key, 1 = typed key
//!     u16 key length     + key bytes (UTF-8)
//!     u16 desc length    + descriptor ("str", or the serializer format)
//!     u32 value length   + value bytes
//! ```
//!
//! Decoding is all or nothing: a missing, duplicated or inconsistent chunk,
//! bad base64, a broken record or a stream whose length or record count
//! disagrees with its header yields an empty session.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::http::cookie::Cookie;
use crate::session::view::{SessionData, TypeKey, TypedValue};

const FORMAT_VERSION: u8 = 1;
const KIND_STRING: u8 = 0;
const KIND_TYPED: u8 = 1;
const STRING_DESCRIPTOR: &str = "str";

#[derive(Debug, Error)]
#[error("corrupt session: {0}")]
pub(crate) struct CorruptSession(String);

fn corrupt(reason: impl Into<String>) -> CorruptSession {
    CorruptSession(reason.into())
}

#[derive(Debug, Clone)]
pub struct ClientSideSessionCodec {
    config: SessionConfig,
}

impl ClientSideSessionCodec {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Encodes `data` into the cookies that carry it, in chunk order.
    ///
    /// An empty session produces no cookies.
    pub fn encode(&self, data: &SessionData) -> SessionResult<Vec<Cookie>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let records = encode_records(data)?;
        let text = URL_SAFE_NO_PAD.encode(&records);

        let budget = self.payload_budget();
        if budget == 0 {
            return Err(SessionError::Store(format!(
                "max_cookie_size {} leaves no room for session data",
                self.config.max_cookie_size
            )));
        }

        let count = text.len().div_ceil(budget);
        if count > self.config.max_chunks {
            return Err(SessionError::EncodingTooLarge {
                chunks: count,
                max_chunks: self.config.max_chunks,
                largest_entry: largest_entry(data),
            });
        }

        // base64url output is ASCII, so byte offsets are char boundaries.
        let cookies = (0..count)
            .map(|index| {
                let start = index * budget;
                let end = (start + budget).min(text.len());
                self.cookie(
                    self.chunk_name(index),
                    format!("{}.{}", count, &text[start..end]),
                )
            })
            .collect();

        tracing::trace!(
            entries = data.len(),
            bytes = text.len(),
            chunks = count,
            "Encoded session"
        );
        Ok(cookies)
    }

    /// Rebuilds a session from request cookies.
    ///
    /// Cookies that are not session chunks are ignored. Corrupt chunk sets
    /// are logged and replaced by an empty session.
    pub fn decode<'a, I>(&self, cookies: I) -> SessionData
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        match self.try_decode(cookies) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(reason = %e.0, "Discarding corrupt session cookies");
                SessionData::default()
            }
        }
    }

    pub(crate) fn try_decode<'a, I>(&self, cookies: I) -> Result<SessionData, CorruptSession>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut chunks: BTreeMap<usize, (usize, &str)> = BTreeMap::new();
        for (name, value) in cookies {
            let Some(index) = self.chunk_index(name) else {
                continue;
            };
            let (count, payload) = value
                .split_once('.')
                .ok_or_else(|| corrupt(format!("chunk {} has no count", index)))?;
            let count: usize = count
                .parse()
                .map_err(|_| corrupt(format!("chunk {} has a bad count", index)))?;
            if chunks.insert(index, (count, payload)).is_some() {
                return Err(corrupt(format!("chunk {} received twice", index)));
            }
        }

        let Some(&(declared, _)) = chunks.values().next() else {
            return Ok(SessionData::default());
        };

        if chunks.values().any(|(count, _)| *count != declared) {
            return Err(corrupt("chunks disagree on the chunk count"));
        }
        if chunks.len() != declared {
            return Err(corrupt(format!(
                "expected {} chunks, received {}",
                declared,
                chunks.len()
            )));
        }
        if let Some((expected, _)) = chunks
            .keys()
            .enumerate()
            .find(|(expected, index)| expected != *index)
        {
            return Err(corrupt(format!("chunk {} is missing", expected)));
        }

        let text: String = chunks.values().map(|(_, payload)| *payload).collect();
        let records = URL_SAFE_NO_PAD
            .decode(text.as_bytes())
            .map_err(|e| corrupt(format!("bad base64: {}", e)))?;

        decode_records(Bytes::from(records))
    }

    /// The chunk index encoded in `name`, if it is a session chunk cookie.
    pub fn chunk_index(&self, name: &str) -> Option<usize> {
        let digits = name
            .strip_prefix(self.config.cookie_name.as_str())?
            .strip_prefix('_')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    pub fn chunk_name(&self, index: usize) -> String {
        format!("{}_{}", self.config.cookie_name, index)
    }

    /// A deletion cookie for `name`, scoped like the session cookies.
    pub fn expired_cookie(&self, name: impl Into<String>) -> Cookie {
        let mut cookie = self.cookie(name, "");
        cookie.set_max_age(0);
        cookie
    }

    fn cookie(&self, name: impl Into<String>, value: impl Into<String>) -> Cookie {
        let mut cookie = Cookie::new(name, value);
        cookie
            .set_path(self.config.path.as_str())
            .set_secure(self.config.secure)
            .set_http_only(self.config.http_only);
        if let Some(domain) = &self.config.domain {
            cookie.set_domain(domain.as_str());
        }
        if let Some(max_age) = self.config.max_age {
            cookie.set_max_age(max_age);
        }
        cookie
    }

    /// Payload bytes per chunk, measured against the widest chunk cookie.
    fn payload_budget(&self) -> usize {
        let max_chunks = self.config.max_chunks.max(1);
        let widest = self.cookie(
            self.chunk_name(max_chunks - 1),
            format!("{}.", max_chunks),
        );
        self.config
            .max_cookie_size
            .saturating_sub(widest.encode().len())
    }
}

const HEADER_LEN: usize = 1 + 4 + 4;

fn encode_records(data: &SessionData) -> SessionResult<Bytes> {
    let mut body = BytesMut::new();
    for (key, value) in data.strings() {
        put_record(&mut body, KIND_STRING, key, STRING_DESCRIPTOR, value.as_bytes())?;
    }
    for (key, value) in data.typed() {
        put_record(&mut body, KIND_TYPED, key.name(), &value.format, &value.bytes)?;
    }

    let count = u32::try_from(data.len())
        .map_err(|_| SessionError::Serialization(format!("too many entries: {}", data.len())))?;
    let length = u32::try_from(body.len())
        .map_err(|_| SessionError::Serialization(format!("session too long: {} bytes", body.len())))?;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_u8(FORMAT_VERSION);
    buf.put_u32(count);
    buf.put_u32(length);
    buf.put_slice(&body);
    Ok(buf.freeze())
}

fn put_record(buf: &mut BytesMut, kind: u8, key: &str, descriptor: &str, value: &[u8]) -> SessionResult<()> {
    let key_len = u16::try_from(key.len())
        .map_err(|_| SessionError::Serialization(format!("session key too long: {} bytes", key.len())))?;
    let descriptor_len = u16::try_from(descriptor.len())
        .map_err(|_| SessionError::Serialization(format!("descriptor too long for {}", key)))?;
    let value_len = u32::try_from(value.len())
        .map_err(|_| SessionError::Serialization(format!("value too long for {}", key)))?;

    buf.reserve(1 + 2 + key.len() + 2 + descriptor.len() + 4 + value.len());
    buf.put_u8(kind);
    buf.put_u16(key_len);
    buf.put_slice(key.as_bytes());
    buf.put_u16(descriptor_len);
    buf.put_slice(descriptor.as_bytes());
    buf.put_u32(value_len);
    buf.put_slice(value);
    Ok(())
}

fn decode_records(mut buf: Bytes) -> Result<SessionData, CorruptSession> {
    if buf.remaining() < HEADER_LEN {
        return Err(corrupt("truncated record header"));
    }
    let version = buf.get_u8();
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unknown format version {}", version)));
    }
    let count = buf.get_u32() as usize;
    let length = buf.get_u32() as usize;
    if buf.remaining() != length {
        return Err(corrupt(format!(
            "header declares {} record bytes, found {}",
            length,
            buf.remaining()
        )));
    }

    let mut data = SessionData::default();
    for _ in 0..count {
        if !buf.has_remaining() {
            return Err(corrupt(format!("expected {} records, found {}", count, data.len())));
        }
        let kind = buf.get_u8();
        let key = take_str(&mut buf, 2)?;
        let descriptor = take_str(&mut buf, 2)?;
        let value = take(&mut buf, 4)?;

        match kind {
            KIND_STRING => {
                if descriptor != STRING_DESCRIPTOR {
                    return Err(corrupt(format!("string entry {} has descriptor {}", key, descriptor)));
                }
                let value = String::from_utf8(value.to_vec())
                    .map_err(|_| corrupt(format!("string entry {} is not UTF-8", key)))?;
                if data.insert_string(key.clone(), value).is_some() {
                    return Err(corrupt(format!("duplicate string key {}", key)));
                }
            }
            KIND_TYPED => {
                let typed = TypedValue {
                    format: descriptor,
                    bytes: value,
                };
                if data.insert_typed(TypeKey::from_name(key.clone()), typed).is_some() {
                    return Err(corrupt(format!("duplicate type key {}", key)));
                }
            }
            other => return Err(corrupt(format!("unknown record kind {}", other))),
        }
    }
    if buf.has_remaining() {
        return Err(corrupt(format!("{} bytes after the last record", buf.remaining())));
    }

    Ok(data)
}

/// Splits off a length-prefixed field; `width` is the prefix size in bytes.
fn take(buf: &mut Bytes, width: usize) -> Result<Bytes, CorruptSession> {
    if buf.remaining() < width {
        return Err(corrupt("truncated record"));
    }
    let len = match width {
        2 => buf.get_u16() as usize,
        _ => buf.get_u32() as usize,
    };
    if buf.remaining() < len {
        return Err(corrupt("truncated record"));
    }
    Ok(buf.split_to(len))
}

fn take_str(buf: &mut Bytes, width: usize) -> Result<String, CorruptSession> {
    let field = take(buf, width)?;
    String::from_utf8(field.to_vec()).map_err(|_| corrupt("record field is not UTF-8"))
}

fn largest_entry(data: &SessionData) -> String {
    let strings = data
        .strings()
        .map(|(k, v)| (k.to_string(), k.len() + v.len()));
    let typed = data
        .typed()
        .map(|(k, v)| (k.to_string(), k.name().len() + v.bytes.len()));

    strings
        .chain(typed)
        .max_by_key(|(_, size)| *size)
        .map(|(key, size)| format!("{} ({} bytes)", key, size))
        .unwrap_or_default()
}
