//! Per-request sessions.
//!
//! - **`view`**: the in-memory key/value state of a session
//! - **`layer`**: lazy, load-once access to that state during a request
//! - **`serializer`**: how typed values become bytes
//! - **`store`**: where sessions persist between requests
//! - **`codec`**: the chunked cookie encoding used by the cookie store
//!
//! A session is loaded on first access and saved once, just before the
//! response is committed, if anything changed.

pub mod codec;
pub mod layer;
pub mod serializer;
pub mod store;
pub mod view;

pub use codec::ClientSideSessionCodec;
pub use layer::Session;
pub use serializer::{JsonValueSerializer, RawBytesSerializer, SessionValueSerializer, ValueError};
pub use store::{CookieSessionStore, SessionStore};
pub use view::{SessionData, SessionView, TypeKey, TypedValue};
