//! Response and request header collections.
//!
//! [`Headers`] is a plain ordered multi-map with case-insensitive lookups.
//! [`HeaderState`] wraps it for outgoing responses and keeps track of whether
//! a `Content-Type` header is currently present, which is what decides if a
//! default content type gets injected before a body is sent.

use chrono::{DateTime, Utc};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
pub const SET_COOKIE: &str = "Set-Cookie";
pub const COOKIE: &str = "Cookie";
pub const CONNECTION: &str = "Connection";
pub const DATE: &str = "Date";

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// An ordered collection of headers.
///
/// Preserves insertion order and allows repeated names (e.g. several
/// `Set-Cookie` headers). Name comparisons ignore ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value, keeping any existing values for the same name.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces every value for `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// Replaces every value for `name` with `values`, in order.
    ///
    /// An empty `values` leaves the header absent.
    pub fn set_all<I, V>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let name = name.into();
        self.remove(&name);
        for value in values {
            self.entries.push((name.clone(), value.into()));
        }
    }

    /// Removes every value for `name`. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Distinct header names, in order of first appearance.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (name, _) in &self.entries {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                names.push(name);
            }
        }
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

/// Mutable response headers with a tracked content-type flag.
///
/// Every mutation recomputes [`content_type_set`](HeaderState::content_type_set)
/// from the wrapped collection, so the flag holds even after bulk copies.
#[derive(Debug, Clone, Default)]
pub struct HeaderState {
    headers: Headers,
    content_type_set: bool,
}

impl HeaderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing collection.
    pub fn from_headers(headers: Headers) -> Self {
        let mut state = Self {
            headers,
            content_type_set: false,
        };
        state.recompute();
        state
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.add(name, value);
        self.recompute();
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self.recompute();
        self
    }

    pub fn set_all<I, V>(&mut self, name: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.headers.set_all(name, values);
        self.recompute();
        self
    }

    /// Sets `name` to `value` formatted as an HTTP-date.
    pub fn set_date(&mut self, name: impl Into<String>, value: DateTime<Utc>) -> &mut Self {
        self.headers
            .set(name, value.format(HTTP_DATE_FORMAT).to_string());
        self.recompute();
        self
    }

    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.headers.remove(name);
        self.recompute();
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        self.headers.clear();
        self.recompute();
        self
    }

    /// Replaces all current headers with a copy of `other`.
    pub fn copy(&mut self, other: &Headers) -> &mut Self {
        self.headers = other.clone();
        self.recompute();
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Parses the first value of `name` as an HTTP-date.
    pub fn get_date(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name)
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|d| d.with_timezone(&Utc))
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers.get_all(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.headers.names()
    }

    pub fn content_type_set(&self) -> bool {
        self.content_type_set
    }

    pub fn as_headers(&self) -> &Headers {
        &self.headers
    }

    pub fn into_headers(self) -> Headers {
        self.headers
    }

    fn recompute(&mut self) {
        self.content_type_set = self.headers.contains(CONTENT_TYPE);
    }
}
