//! Pluggable codecs for values in the typed session keyspace.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Why a single value could not be written or read back.
#[derive(Debug, Error)]
pub enum ValueError {
    /// The bytes are well formed but do not describe the requested type.
    #[error("{0}")]
    Mismatch(String),

    #[error("{0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Turns one session value of type `T` into bytes and back.
///
/// [`format`](SessionValueSerializer::format) is stored next to every value
/// it writes; reading a value back with a serializer of another format is a
/// type mismatch.
pub trait SessionValueSerializer<T>: Send + Sync {
    fn format(&self) -> &'static str;

    fn serialize(&self, value: &T, out: &mut dyn Write) -> Result<(), ValueError>;

    fn deserialize(&self, input: &mut dyn Read) -> Result<T, ValueError>;
}

/// The default serializer: any serde type, stored as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonValueSerializer;

impl<T> SessionValueSerializer<T> for JsonValueSerializer
where
    T: Serialize + DeserializeOwned,
{
    fn format(&self) -> &'static str {
        "json"
    }

    fn serialize(&self, value: &T, out: &mut dyn Write) -> Result<(), ValueError> {
        serde_json::to_writer(out, value).map_err(|e| ValueError::Malformed(e.to_string()))
    }

    fn deserialize(&self, input: &mut dyn Read) -> Result<T, ValueError> {
        serde_json::from_reader(input).map_err(|e| match e.classify() {
            serde_json::error::Category::Data => ValueError::Mismatch(e.to_string()),
            serde_json::error::Category::Io => ValueError::Io(e.into()),
            _ => ValueError::Malformed(e.to_string()),
        })
    }
}

/// Stores bytes (or UTF-8 text) exactly as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBytesSerializer;

impl RawBytesSerializer {
    fn read_all(input: &mut dyn Read) -> Result<Vec<u8>, ValueError> {
        let mut buf = Vec::new();
        input.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl SessionValueSerializer<Vec<u8>> for RawBytesSerializer {
    fn format(&self) -> &'static str {
        "raw"
    }

    fn serialize(&self, value: &Vec<u8>, out: &mut dyn Write) -> Result<(), ValueError> {
        out.write_all(value)?;
        Ok(())
    }

    fn deserialize(&self, input: &mut dyn Read) -> Result<Vec<u8>, ValueError> {
        Self::read_all(input)
    }
}

impl SessionValueSerializer<Bytes> for RawBytesSerializer {
    fn format(&self) -> &'static str {
        "raw"
    }

    fn serialize(&self, value: &Bytes, out: &mut dyn Write) -> Result<(), ValueError> {
        out.write_all(value)?;
        Ok(())
    }

    fn deserialize(&self, input: &mut dyn Read) -> Result<Bytes, ValueError> {
        Self::read_all(input).map(Bytes::from)
    }
}

impl SessionValueSerializer<String> for RawBytesSerializer {
    fn format(&self) -> &'static str {
        "raw"
    }

    fn serialize(&self, value: &String, out: &mut dyn Write) -> Result<(), ValueError> {
        out.write_all(value.as_bytes())?;
        Ok(())
    }

    fn deserialize(&self, input: &mut dyn Read) -> Result<String, ValueError> {
        String::from_utf8(Self::read_all(input)?)
            .map_err(|e| ValueError::Mismatch(format!("not UTF-8 text: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Cart {
        items: Vec<String>,
    }

    #[test]
    fn json_rejects_wrong_shape_as_mismatch() {
        let mut buf = Vec::new();
        JsonValueSerializer.serialize(&42u32, &mut buf).unwrap();
        let err = SessionValueSerializer::<Cart>::deserialize(&JsonValueSerializer, &mut buf.as_slice())
            .unwrap_err();
        assert!(matches!(err, ValueError::Mismatch(_)));
    }

    #[test]
    fn json_rejects_garbage_as_malformed() {
        let err = SessionValueSerializer::<Cart>::deserialize(&JsonValueSerializer, &mut &b"{not json"[..])
            .unwrap_err();
        assert!(matches!(err, ValueError::Malformed(_)));
    }

    #[test]
    fn raw_string_requires_utf8() {
        let err = SessionValueSerializer::<String>::deserialize(&RawBytesSerializer, &mut &[0xffu8, 0xfe][..])
            .unwrap_err();
        assert!(matches!(err, ValueError::Mismatch(_)));
    }
}
