mod common;

use common::{RecordingTransmitter, response};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tether::config::SessionConfig;
use tether::error::{SessionError, SessionResult};
use tether::http::cookie::Cookie;
use tether::session::{
    ClientSideSessionCodec, CookieSessionStore, RawBytesSerializer, Session, SessionData,
    SessionStore, TypeKey,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Cart {
    items: Vec<String>,
}

/// Store that counts calls and remembers the last saved data.
#[derive(Default)]
struct CountingStore {
    initial: SessionData,
    fail_load: bool,
    loads: Arc<AtomicUsize>,
    saves: Arc<AtomicUsize>,
    saved: Arc<Mutex<Option<SessionData>>>,
}

impl SessionStore for CountingStore {
    fn load(&self) -> BoxFuture<'_, SessionResult<SessionData>> {
        Box::pin(async move {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_load {
                return Err(SessionError::Store("backend down".to_string()));
            }
            Ok(self.initial.clone())
        })
    }

    fn save<'a>(&'a self, data: &'a SessionData) -> BoxFuture<'a, SessionResult<Vec<Cookie>>> {
        Box::pin(async move {
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.saved.lock().unwrap() = Some(data.clone());
            Ok(vec![Cookie::new("sid", "saved")])
        })
    }

    fn terminate(&self) -> BoxFuture<'_, SessionResult<Vec<Cookie>>> {
        Box::pin(async move {
            let mut gone = Cookie::new("sid", "");
            gone.set_max_age(0);
            Ok(vec![gone])
        })
    }
}

struct Counters {
    loads: Arc<AtomicUsize>,
    saves: Arc<AtomicUsize>,
    saved: Arc<Mutex<Option<SessionData>>>,
}

fn counting(initial: SessionData) -> (Session, Counters) {
    let store = CountingStore {
        initial,
        ..CountingStore::default()
    };
    let counters = Counters {
        loads: store.loads.clone(),
        saves: store.saves.clone(),
        saved: store.saved.clone(),
    };
    (Session::new(store), counters)
}

fn with_strings(pairs: &[(&str, &str)]) -> SessionData {
    let mut data = SessionData::new();
    for (k, v) in pairs {
        data.insert_string(*k, *v);
    }
    data
}

#[tokio::test]
async fn test_session_loads_lazily_and_once() {
    let (session, counters) = counting(with_strings(&[("a", "1")]));
    assert!(!session.is_loaded());
    assert_eq!(counters.loads.load(Ordering::SeqCst), 0);

    let other = session.clone();
    let (first, second) = tokio::join!(session.get("a"), other.get("a"));
    assert_eq!(first.unwrap().as_deref(), Some("1"));
    assert_eq!(second.unwrap().as_deref(), Some("1"));

    session.set("b", "2").await.unwrap();
    session.string_keys().await.unwrap();
    assert!(session.is_loaded());
    assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_session_dirty_tracking() {
    let (session, counters) = counting(with_strings(&[("a", "1")]));
    assert!(!session.is_dirty().await);

    session.get("a").await.unwrap();
    assert!(!session.is_dirty().await);

    session.set("a", "2").await.unwrap();
    session.set("b", "3").await.unwrap();
    assert!(session.is_dirty().await);

    session.save().await.unwrap();
    assert!(!session.is_dirty().await);
    assert_eq!(counters.saves.load(Ordering::SeqCst), 1);
    assert_eq!(
        counters.saved.lock().unwrap().clone(),
        Some(with_strings(&[("a", "2"), ("b", "3")]))
    );

    session.remove("b").await.unwrap();
    assert!(session.is_dirty().await);
}

#[tokio::test]
async fn test_session_require_missing_key() {
    let (session, _) = counting(SessionData::new());
    match session.require("missing").await {
        Err(SessionError::NotFound { key }) => assert_eq!(key, "missing"),
        other => panic!("expected NotFound, got {:?}", other),
    }
    assert_eq!(session.get("missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_session_typed_values() {
    let (session, _) = counting(SessionData::new());
    assert_eq!(session.get_typed::<Cart>().await.unwrap(), None);

    let cart = Cart {
        items: vec!["apple".to_string(), "pear".to_string()],
    };
    session.set_typed(cart.clone()).await.unwrap();
    session.set("cart", "not the typed one").await.unwrap();

    assert_eq!(session.require_typed::<Cart>().await.unwrap(), cart);
    assert_eq!(session.require("cart").await.unwrap(), "not the typed one");
    assert!(session.type_keys().await.unwrap().contains(&TypeKey::of::<Cart>()));

    session.remove_typed::<Cart>().await.unwrap();
    assert!(matches!(
        session.require_typed::<Cart>().await,
        Err(SessionError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_session_serializer_mismatch() {
    let (session, _) = counting(SessionData::new());
    session
        .set_typed_with(vec![1u8, 2, 3], &RawBytesSerializer)
        .await
        .unwrap();

    assert_eq!(
        session
            .get_typed_with::<Vec<u8>, _>(&RawBytesSerializer)
            .await
            .unwrap(),
        Some(vec![1, 2, 3])
    );
    assert!(matches!(
        session.get_typed::<Vec<u8>>().await,
        Err(SessionError::TypeMismatch { .. })
    ));
}

#[tokio::test]
async fn test_session_load_failure_surfaces() {
    let store = CountingStore {
        fail_load: true,
        ..CountingStore::default()
    };
    let session = Session::new(store);
    assert!(matches!(session.get("a").await, Err(SessionError::Store(_))));
    assert!(!session.is_loaded());
}

#[tokio::test]
async fn test_session_clear_and_keys() {
    let (session, _) = counting(with_strings(&[("a", "1"), ("b", "2")]));
    let keys: Vec<String> = session.string_keys().await.unwrap().into_iter().collect();
    assert_eq!(keys, vec!["a", "b"]);

    session.clear().await.unwrap();
    assert!(session.string_keys().await.unwrap().is_empty());
    assert!(session.is_dirty().await);
}

#[tokio::test]
async fn test_finalizer_saves_dirty_session_once() {
    let tx = RecordingTransmitter::new();
    let (session, counters) = counting(SessionData::new());
    let mut res = response(&tx);
    session.install(&mut res);

    for i in 0..5 {
        session.set(format!("k{}", i), i.to_string()).await.unwrap();
    }
    res.send_text("ok").await.unwrap();

    assert_eq!(counters.saves.load(Ordering::SeqCst), 1);
    assert_eq!(
        tx.only().head().headers.get_all("Set-Cookie"),
        vec!["sid=saved"]
    );
}

#[tokio::test]
async fn test_finalizer_skips_clean_session() {
    let tx = RecordingTransmitter::new();
    let (session, counters) = counting(with_strings(&[("a", "1")]));
    let mut res = response(&tx);
    session.install(&mut res);

    session.get("a").await.unwrap();
    res.send().await.unwrap();

    assert_eq!(counters.saves.load(Ordering::SeqCst), 0);
    assert!(!tx.only().head().headers.contains("Set-Cookie"));
}

#[tokio::test]
async fn test_finalizer_without_access_never_loads() {
    let tx = RecordingTransmitter::new();
    let (session, counters) = counting(with_strings(&[("a", "1")]));
    let mut res = response(&tx);
    session.install(&mut res);

    res.send_text("untouched").await.unwrap();
    assert_eq!(counters.loads.load(Ordering::SeqCst), 0);
    assert_eq!(counters.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_terminate_sends_expiry() {
    let tx = RecordingTransmitter::new();
    let (session, counters) = counting(with_strings(&[("a", "1")]));
    let mut res = response(&tx);
    session.install(&mut res);

    session.terminate().await.unwrap();
    assert_eq!(session.get("a").await.unwrap(), None);
    assert!(!session.is_dirty().await);
    res.send().await.unwrap();

    assert_eq!(counters.saves.load(Ordering::SeqCst), 0);
    assert_eq!(
        tx.only().head().headers.get_all("Set-Cookie"),
        vec!["sid=; Max-Age=0"]
    );
}

#[tokio::test]
async fn test_cookie_session_survives_a_round_trip() {
    let codec = Arc::new(ClientSideSessionCodec::new(SessionConfig::default()));

    // First request: no cookies, set a value.
    let tx = RecordingTransmitter::new();
    let session = Session::new(CookieSessionStore::new(codec.clone(), Vec::new()));
    let mut res = response(&tx);
    session.install(&mut res);
    session.set("user", "ada").await.unwrap();
    session
        .set_typed(Cart {
            items: vec!["tea".to_string()],
        })
        .await
        .unwrap();
    res.send().await.unwrap();

    let set_cookies: Vec<String> = tx
        .only()
        .head()
        .headers
        .get_all("Set-Cookie")
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(set_cookies.len(), 1);
    assert!(set_cookies[0].starts_with("TETHER_SESSION_0=1."));

    // Second request: the browser echoes name=value back.
    let echoed: Vec<(String, String)> = set_cookies
        .iter()
        .filter_map(|c| c.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect();
    let session = Session::new(CookieSessionStore::new(codec, echoed));

    assert_eq!(session.require("user").await.unwrap(), "ada");
    assert_eq!(
        session.require_typed::<Cart>().await.unwrap().items,
        vec!["tea".to_string()]
    );
}
