//! Backing stores for session data.

use futures_util::future::BoxFuture;
use std::sync::Arc;

use crate::error::SessionResult;
use crate::http::cookie::Cookie;
use crate::session::codec::ClientSideSessionCodec;
use crate::session::view::SessionData;

/// Where a session lives between requests.
///
/// Persisting yields the cookies the response must carry for the client to
/// present the session on its next request.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> BoxFuture<'_, SessionResult<SessionData>>;

    fn save<'a>(&'a self, data: &'a SessionData) -> BoxFuture<'a, SessionResult<Vec<Cookie>>>;

    /// Discards the stored session.
    fn terminate(&self) -> BoxFuture<'_, SessionResult<Vec<Cookie>>>;
}

/// Keeps the whole session in the client's cookies.
///
/// Built per request from the request's cookies.
#[derive(Debug, Clone)]
pub struct CookieSessionStore {
    codec: Arc<ClientSideSessionCodec>,
    incoming: Vec<(String, String)>,
}

impl CookieSessionStore {
    pub fn new(codec: Arc<ClientSideSessionCodec>, incoming: Vec<(String, String)>) -> Self {
        Self { codec, incoming }
    }

    /// Names of the session chunk cookies the client sent.
    fn incoming_chunks(&self) -> impl Iterator<Item = &str> {
        self.incoming
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| self.codec.chunk_index(name).is_some())
    }
}

impl SessionStore for CookieSessionStore {
    fn load(&self) -> BoxFuture<'_, SessionResult<SessionData>> {
        Box::pin(async move {
            Ok(self
                .codec
                .decode(self.incoming.iter().map(|(n, v)| (n.as_str(), v.as_str()))))
        })
    }

    fn save<'a>(&'a self, data: &'a SessionData) -> BoxFuture<'a, SessionResult<Vec<Cookie>>> {
        Box::pin(async move {
            let mut cookies = self.codec.encode(data)?;

            // Chunks the client holds beyond the new count would otherwise linger.
            let stale: Vec<Cookie> = self
                .incoming_chunks()
                .filter(|name| !cookies.iter().any(|c| c.name() == *name))
                .map(|name| self.codec.expired_cookie(name))
                .collect();

            tracing::debug!(
                chunks = cookies.len(),
                expired = stale.len(),
                "Saving client-side session"
            );
            cookies.extend(stale);
            Ok(cookies)
        })
    }

    fn terminate(&self) -> BoxFuture<'_, SessionResult<Vec<Cookie>>> {
        Box::pin(async move {
            let expired: Vec<Cookie> = self
                .incoming_chunks()
                .map(|name| self.codec.expired_cookie(name))
                .collect();
            tracing::debug!(expired = expired.len(), "Terminating client-side session");
            Ok(expired)
        })
    }
}
