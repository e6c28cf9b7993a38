//! Deferred access to the session of the current request.
//!
//! A [`Session`] loads its [`SessionView`] on first use, at most once per
//! request, and every accessor waits for that load. Mutations only touch the
//! in-memory view; persistence happens on [`Session::save`], usually from the
//! before-send finalizer registered by [`Session::install`], so any number of
//! mutations cost one write.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OnceCell};

use crate::error::SessionResult;
use crate::http::cookie::Cookie;
use crate::http::response::{Response, ResponseMeta};
use crate::session::serializer::SessionValueSerializer;
use crate::session::store::SessionStore;
use crate::session::view::{SessionView, TypeKey};

/// Handle to one request's session. Clones share the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    store: Box<dyn SessionStore>,
    view: OnceCell<Mutex<SessionView>>,
    outgoing: Mutex<Option<Vec<Cookie>>>,
}

impl Session {
    pub fn new(store: impl SessionStore + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Box::new(store),
                view: OnceCell::new(),
                outgoing: Mutex::new(None),
            }),
        }
    }

    /// Waits for the loaded view and locks it.
    pub async fn sync(&self) -> SessionResult<MutexGuard<'_, SessionView>> {
        let view = self
            .inner
            .view
            .get_or_try_init(|| async {
                let data = self.inner.store.load().await?;
                tracing::trace!(entries = data.len(), "Session loaded");
                Ok::<_, crate::error::SessionError>(Mutex::new(SessionView::new(data)))
            })
            .await?;
        Ok(view.lock().await)
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.view.initialized()
    }

    pub async fn get(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.sync().await?.get(key).map(str::to_string))
    }

    pub async fn require(&self, key: &str) -> SessionResult<String> {
        self.sync().await?.require(key).map(str::to_string)
    }

    pub async fn get_typed<T>(&self) -> SessionResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.sync().await?.get_typed()
    }

    pub async fn get_typed_with<T, S>(&self, serializer: &S) -> SessionResult<Option<T>>
    where
        T: 'static,
        S: SessionValueSerializer<T>,
    {
        self.sync().await?.get_typed_with(serializer)
    }

    pub async fn require_typed<T>(&self) -> SessionResult<T>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.sync().await?.require_typed()
    }

    pub async fn require_typed_with<T, S>(&self, serializer: &S) -> SessionResult<T>
    where
        T: 'static,
        S: SessionValueSerializer<T>,
    {
        self.sync().await?.require_typed_with(serializer)
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Into<String>) -> SessionResult<()> {
        self.sync().await?.set(key, value);
        Ok(())
    }

    pub async fn set_typed<T>(&self, value: T) -> SessionResult<()>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.sync().await?.set_typed(value)
    }

    pub async fn set_typed_with<T, S>(&self, value: T, serializer: &S) -> SessionResult<()>
    where
        T: 'static,
        S: SessionValueSerializer<T>,
    {
        self.sync().await?.set_typed_with(value, serializer)
    }

    pub async fn string_keys(&self) -> SessionResult<BTreeSet<String>> {
        Ok(self.sync().await?.string_keys())
    }

    pub async fn type_keys(&self) -> SessionResult<BTreeSet<TypeKey>> {
        Ok(self.sync().await?.type_keys())
    }

    pub async fn remove(&self, key: &str) -> SessionResult<()> {
        self.sync().await?.remove(key);
        Ok(())
    }

    pub async fn remove_typed<T: 'static>(&self) -> SessionResult<()> {
        self.sync().await?.remove_typed::<T>();
        Ok(())
    }

    pub async fn clear(&self) -> SessionResult<()> {
        self.sync().await?.clear();
        Ok(())
    }

    /// Whether the session changed since it was loaded or last saved.
    ///
    /// A session that was never loaded is not dirty.
    pub async fn is_dirty(&self) -> bool {
        match self.inner.view.get() {
            Some(view) => view.lock().await.is_dirty(),
            None => false,
        }
    }

    /// Persists the current state now, dirty or not.
    pub async fn save(&self) -> SessionResult<()> {
        let mut view = self.sync().await?;
        let cookies = self.inner.store.save(view.data()).await?;
        view.mark_clean();
        *self.inner.outgoing.lock().await = Some(cookies);
        Ok(())
    }

    /// Drops the session, in memory and in the store.
    pub async fn terminate(&self) -> SessionResult<()> {
        let mut view = self.sync().await?;
        let cookies = self.inner.store.terminate().await?;
        view.reset();
        *self.inner.outgoing.lock().await = Some(cookies);
        Ok(())
    }

    /// Registers the end-of-request finalizer on `response`.
    pub fn install(&self, response: &mut Response) {
        let session = self.clone();
        response.before_send(move |meta| Box::pin(async move { session.finalize(meta).await }));
    }

    /// Saves if dirty, then hands pending session cookies to the response.
    pub async fn finalize(&self, meta: &mut ResponseMeta) -> anyhow::Result<()> {
        if self.is_dirty().await {
            self.save().await?;
        }

        if let Some(cookies) = self.inner.outgoing.lock().await.take() {
            for cookie in cookies {
                meta.add_cookie(cookie);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
