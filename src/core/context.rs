//! Per-request context handed to each handler
//!
//! The context carries the request, the registry visible at this point of the
//! chain, and the continuation into the rest of the chain.

use std::sync::Arc;

use crate::core::blocking::{BlockingExecutor, BlockingHandle};
use crate::core::chain::Chain;
use crate::core::http::{Request, Response};
use crate::core::registry::{Bindings, Registry};
use crate::error::{BoxError, Result};

pub struct Context {
    request: Arc<Request>,
    registry: Arc<Registry>,
    chain: Arc<Chain>,
    position: usize,
    executor: Arc<BlockingExecutor>,
}

impl Context {
    /// Start a walk of `chain` at its first route.
    pub fn new(
        request: Arc<Request>,
        registry: Arc<Registry>,
        chain: Arc<Chain>,
        executor: Arc<BlockingExecutor>,
    ) -> Self {
        Self {
            request,
            registry,
            chain,
            position: 0,
            executor,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn executor(&self) -> &Arc<BlockingExecutor> {
        &self.executor
    }

    /// Resolve `T` from the current registry.
    ///
    /// Lazy bindings run their factory on the calling thread; use
    /// [`Context::get_blocking`] for factories that block.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        Ok(self.registry.get::<T>()?)
    }

    pub fn maybe_get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.registry.maybe_get::<T>()
    }

    /// Resolve `T` on the blocking executor.
    pub async fn get_blocking<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let registry = Arc::clone(&self.registry);
        let resolved = self.executor.run(move || registry.get::<T>()).await?;
        Ok(resolved?)
    }

    /// Run a blocking operation off the event loop.
    pub fn blocking<F, T, E>(&self, operation: F) -> BlockingHandle<T>
    where
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        self.executor.submit(operation)
    }

    /// Continue with the next matching handler and the same registry.
    pub async fn next(self) -> Result<Response> {
        let found = self
            .chain
            .next_match(self.position, &self.request)
            .map(|(index, route)| (index, route.handler()));

        match found {
            Some((index, handler)) => {
                let ctx = Context {
                    position: index + 1,
                    ..self
                };
                handler.handle(ctx).await
            }
            None => Err(self.chain.unmatched(&self.request)),
        }
    }

    /// Continue with the registry extended by `bindings`.
    pub async fn next_with(self, bindings: Bindings) -> Result<Response> {
        let registry = Arc::new(self.registry.extend(bindings));
        Context { registry, ..self }.next().await
    }
}
