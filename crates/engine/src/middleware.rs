//! Port trait for engine middleware.
//!
//! A middleware receives the current context and a [`Next`] handle. Calling
//! [`Next::run`] hands a (possibly modified) context to the following
//! middleware; returning without calling it ends the chain with that result.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use tracing::trace;

use quarry_core::error::{EngineError, EngineResult};

/// One step of an engine chain.
#[async_trait]
pub trait Middleware<C, R>: Send + Sync
where
    C: Send + 'static,
    R: Send + 'static,
{
    /// Handle `context`, optionally delegating to `next`.
    async fn handle(&self, context: C, next: Next<C, R>) -> EngineResult<R>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Shared, ordered middleware list.
pub(crate) type Chain<C, R> = Arc<[Arc<dyn Middleware<C, R>>]>;

/// Handle to the rest of the chain.
pub struct Next<C, R> {
    chain: Chain<C, R>,
    index: usize,
}

impl<C, R> Next<C, R>
where
    C: Send + 'static,
    R: Send + 'static,
{
    pub(crate) fn start(chain: Chain<C, R>) -> Self {
        Self { chain, index: 0 }
    }

    /// Run the next middleware with `context`.
    ///
    /// Fails with [`EngineError::NoFurtherMiddleware`] past the end of the chain.
    pub fn run(self, context: C) -> BoxFuture<'static, EngineResult<R>> {
        let Some(middleware) = self.chain.get(self.index).cloned() else {
            return future::ready(Err(EngineError::NoFurtherMiddleware)).boxed();
        };

        trace!(index = self.index, middleware = middleware.name(), "Entering middleware");
        let next = Next {
            chain: self.chain,
            index: self.index + 1,
        };
        async move { middleware.handle(context, next).await }.boxed()
    }
}

// -----------------------------------------------------------------------------
// Closure adapters
// -----------------------------------------------------------------------------

/// [`Middleware`] backed by an async closure `(context, next) -> result`.
pub struct FnMiddleware<F> {
    f: F,
}

#[async_trait]
impl<C, R, F, Fut> Middleware<C, R> for FnMiddleware<F>
where
    C: Send + 'static,
    R: Send + 'static,
    F: Fn(C, Next<C, R>) -> Fut + Send + Sync,
    Fut: Future<Output = EngineResult<R>> + Send + 'static,
{
    async fn handle(&self, context: C, next: Next<C, R>) -> EngineResult<R> {
        (self.f)(context, next).await
    }

    fn name(&self) -> &str {
        "fn"
    }
}

/// Wrap an async closure as a [`Middleware`].
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F> {
    FnMiddleware { f }
}

/// Terminal step: produces the result from the context, never calls `next`.
pub(crate) struct ResultFactory<F> {
    f: F,
}

impl<F> ResultFactory<F> {
    pub(crate) fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<C, R, F, Fut> Middleware<C, R> for ResultFactory<F>
where
    C: Send + 'static,
    R: Send + 'static,
    F: Fn(C) -> Fut + Send + Sync,
    Fut: Future<Output = EngineResult<R>> + Send + 'static,
{
    async fn handle(&self, context: C, _next: Next<C, R>) -> EngineResult<R> {
        (self.f)(context).await
    }

    fn name(&self) -> &str {
        "result_factory"
    }
}
