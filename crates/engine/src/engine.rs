//! Query engine - ordered middleware chain from a query to a result.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use quarry_core::error::{EngineError, EngineResult};

use crate::middleware::{Chain, Middleware, Next, ResultFactory, middleware_fn};

/// Context threaded through the chain.
///
/// `data` comes from the context factory; `query` is always the query
/// passed to [`Engine::find`] and cannot be replaced by the factory.
#[derive(Debug, Clone)]
pub struct QueryContext<Q, D> {
    pub query: Q,
    pub data: D,
}

type ContextFactory<Q, D> = Arc<dyn Fn(&Q) -> D + Send + Sync>;

/// Ordered, short-circuiting middleware chain.
///
/// Middleware run in registration order. A middleware that returns without
/// calling `next` ends the chain. The result factory, when set, always runs
/// after every registered middleware.
///
/// # Example
///
/// ```
/// use quarry_engine::{Engine, QueryContext};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let mut engine: Engine<u32, (), String> = Engine::new();
/// engine
///     .register_fn(|ctx: QueryContext<u32, ()>, next| async move {
///         next.run(QueryContext { query: ctx.query * 2, ..ctx }).await
///     })
///     .use_result_factory(|ctx: QueryContext<u32, ()>| async move { Ok(ctx.query.to_string()) });
///
/// assert_eq!(engine.find(21).await.unwrap(), "42");
/// # });
/// ```
pub struct Engine<Q, D, R> {
    context_factory: ContextFactory<Q, D>,
    middlewares: Vec<Arc<dyn Middleware<QueryContext<Q, D>, R>>>,
    result_factory: Option<Arc<dyn Middleware<QueryContext<Q, D>, R>>>,
}

impl<Q, D, R> Engine<Q, D, R>
where
    Q: Send + 'static,
    D: Send + 'static,
    R: Send + 'static,
{
    /// Engine whose context data is `D::default()`.
    pub fn new() -> Self
    where
        D: Default,
    {
        Self::with_context_factory(|_| D::default())
    }

    /// Engine deriving its context data from each query.
    pub fn with_context_factory(factory: impl Fn(&Q) -> D + Send + Sync + 'static) -> Self {
        Self {
            context_factory: Arc::new(factory),
            middlewares: Vec::new(),
            result_factory: None,
        }
    }

    /// Append a middleware.
    pub fn register(&mut self, middleware: impl Middleware<QueryContext<Q, D>, R> + 'static) -> &mut Self {
        debug!(middleware = middleware.name(), position = self.middlewares.len(), "Registering middleware");
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Append an async closure `(context, next) -> result` as middleware.
    pub fn register_fn<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(QueryContext<Q, D>, Next<QueryContext<Q, D>, R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<R>> + Send + 'static,
    {
        self.register(middleware_fn(f))
    }

    /// Set the terminal step producing the result from the final context.
    ///
    /// Replaces any previous result factory.
    pub fn use_result_factory<F, Fut>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(QueryContext<Q, D>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<R>> + Send + 'static,
    {
        self.result_factory = Some(Arc::new(ResultFactory::new(factory)));
        self
    }

    /// Number of steps a query goes through, result factory included.
    pub fn len(&self) -> usize {
        self.middlewares.len() + usize::from(self.result_factory.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `query` through the chain.
    #[instrument(skip_all, fields(steps = self.len()))]
    pub async fn find(&self, query: Q) -> EngineResult<R> {
        let mut steps = self.middlewares.clone();
        if let Some(factory) = &self.result_factory {
            steps.push(factory.clone());
        }
        if steps.is_empty() {
            return Err(EngineError::NoMiddlewares);
        }

        let data = (self.context_factory)(&query);
        let chain: Chain<QueryContext<Q, D>, R> = steps.into();

        Next::start(chain).run(QueryContext { query, data }).await
    }

    /// Share this engine as a [`QueryRunner`].
    pub fn into_query_runner(self) -> Arc<dyn QueryRunner<Q, R>> {
        Arc::new(self)
    }
}

impl<Q, D, R> Default for Engine<Q, D, R>
where
    Q: Send + 'static,
    D: Default + Send + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// QueryRunner
// =============================================================================

/// Anything that turns a validated query into a result.
#[async_trait]
pub trait QueryRunner<Q, R>: Send + Sync
where
    Q: Send + 'static,
{
    async fn run(&self, query: Q) -> EngineResult<R>;
}

#[async_trait]
impl<Q, D, R> QueryRunner<Q, R> for Engine<Q, D, R>
where
    Q: Send + 'static,
    D: Send + 'static,
    R: Send + 'static,
{
    async fn run(&self, query: Q) -> EngineResult<R> {
        self.find(query).await
    }
}
