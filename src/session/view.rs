//! Synchronous access to the session of one request.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{SessionError, SessionResult};
use crate::session::serializer::{JsonValueSerializer, SessionValueSerializer, ValueError};

/// Key of the typed keyspace: the Rust type path of the stored value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey(Cow<'static, str>);

impl TypeKey {
    pub fn of<T: 'static>() -> Self {
        TypeKey(Cow::Borrowed(std::any::type_name::<T>()))
    }

    /// A key read back from the wire.
    pub fn from_name(name: impl Into<String>) -> Self {
        TypeKey(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A serialized typed value together with the format that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedValue {
    pub format: String,
    pub bytes: Bytes,
}

/// The raw contents of a session: both keyspaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    strings: BTreeMap<String, String>,
    typed: BTreeMap<TypeKey, TypedValue>,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.typed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.strings.len() + self.typed.len()
    }

    pub fn strings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.strings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn typed(&self) -> impl Iterator<Item = (&TypeKey, &TypedValue)> {
        self.typed.iter()
    }

    /// Returns the previous value, if any.
    pub fn insert_string(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.strings.insert(key.into(), value.into())
    }

    pub fn insert_typed(&mut self, key: TypeKey, value: TypedValue) -> Option<TypedValue> {
        self.typed.insert(key, value)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.strings.get(key).map(String::as_str)
    }

    pub fn get_typed(&self, key: &TypeKey) -> Option<&TypedValue> {
        self.typed.get(key)
    }
}

/// Key/value view over one loaded session, with a dirty bit.
///
/// Any `set`, `remove` or `clear` marks the view dirty; only a successful
/// save clears it again.
#[derive(Debug, Default)]
pub struct SessionView {
    data: SessionData,
    dirty: bool,
}

impl SessionView {
    pub fn new(data: SessionData) -> Self {
        Self { data, dirty: false }
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get_string(key)
    }

    pub fn require(&self, key: &str) -> SessionResult<&str> {
        self.get(key).ok_or_else(|| SessionError::NotFound {
            key: key.to_string(),
        })
    }

    pub fn get_typed<T>(&self) -> SessionResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.get_typed_with(&JsonValueSerializer)
    }

    pub fn get_typed_with<T, S>(&self, serializer: &S) -> SessionResult<Option<T>>
    where
        T: 'static,
        S: SessionValueSerializer<T>,
    {
        let key = TypeKey::of::<T>();
        let Some(stored) = self.data.get_typed(&key) else {
            return Ok(None);
        };

        if stored.format != serializer.format() {
            return Err(SessionError::TypeMismatch {
                key: key.to_string(),
                expected: key.to_string(),
                detail: format!(
                    "stored as {}, read as {}",
                    stored.format,
                    serializer.format()
                ),
            });
        }

        serializer
            .deserialize(&mut stored.bytes.as_ref())
            .map(Some)
            .map_err(|e| value_error(&key, e))
    }

    pub fn require_typed<T>(&self) -> SessionResult<T>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.require_typed_with(&JsonValueSerializer)
    }

    pub fn require_typed_with<T, S>(&self, serializer: &S) -> SessionResult<T>
    where
        T: 'static,
        S: SessionValueSerializer<T>,
    {
        self.get_typed_with(serializer)?
            .ok_or_else(|| SessionError::NotFound {
                key: TypeKey::of::<T>().to_string(),
            })
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert_string(key, value);
        self.dirty = true;
    }

    pub fn set_typed<T>(&mut self, value: T) -> SessionResult<()>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.set_typed_with(value, &JsonValueSerializer)
    }

    pub fn set_typed_with<T, S>(&mut self, value: T, serializer: &S) -> SessionResult<()>
    where
        T: 'static,
        S: SessionValueSerializer<T>,
    {
        let key = TypeKey::of::<T>();
        let mut bytes = Vec::new();
        serializer
            .serialize(&value, &mut bytes)
            .map_err(|e| value_error(&key, e))?;

        self.data.insert_typed(
            key,
            TypedValue {
                format: serializer.format().to_string(),
                bytes: Bytes::from(bytes),
            },
        );
        self.dirty = true;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) {
        self.data.strings.remove(key);
        self.dirty = true;
    }

    pub fn remove_typed<T: 'static>(&mut self) {
        self.data.typed.remove(&TypeKey::of::<T>());
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.data = SessionData::default();
        self.dirty = true;
    }

    pub fn string_keys(&self) -> BTreeSet<String> {
        self.data.strings.keys().cloned().collect()
    }

    pub fn type_keys(&self) -> BTreeSet<TypeKey> {
        self.data.typed.keys().cloned().collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Drops all data without marking the view dirty.
    pub(crate) fn reset(&mut self) {
        self.data = SessionData::default();
        self.dirty = false;
    }
}

fn value_error(key: &TypeKey, e: ValueError) -> SessionError {
    match e {
        ValueError::Mismatch(detail) => SessionError::TypeMismatch {
            key: key.to_string(),
            expected: key.to_string(),
            detail,
        },
        ValueError::Malformed(detail) => SessionError::Serialization(format!("{}: {}", key, detail)),
        ValueError::Io(e) => SessionError::Serialization(format!("{}: {}", key, e)),
    }
}
