use futures_util::future::BoxFuture;
use std::future::Future;

use crate::http::request::Request;
use crate::http::response::Response;
use crate::session::Session;

/// Everything a handler gets for one request.
#[derive(Debug)]
pub struct Exchange {
    pub request: Request,
    pub response: Response,
    pub session: Session,
}

/// Application code that answers a request.
///
/// A handler is expected to commit `exchange.response` by calling one of its
/// send methods. Any async closure taking an [`Exchange`] is a handler.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, exchange: Exchange) -> BoxFuture<'static, anyhow::Result<()>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Exchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn handle(&self, exchange: Exchange) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(self(exchange))
    }
}
