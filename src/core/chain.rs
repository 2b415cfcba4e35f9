//! Ordered handler chain
//!
//! Routes are tried in the order they were added. A route runs when its
//! method (if any) and its path pattern both match the request; `all`
//! routes match everything. The handler either renders a response or calls
//! [`Context::next`] to continue with the following matching route.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;

use crate::core::context::Context;
use crate::core::http::{Request, Response};
use crate::error::{Error, Result};

/// A step in the handler chain.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, ctx: Context) -> Result<Response>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    async fn handle(&self, ctx: Context) -> Result<Response> {
        (self)(ctx).await
    }
}

/// Strip leading and trailing slashes so `""`, `"/"` and `"//"` all mean root.
pub fn normalize_path(path: &str) -> &str {
    path.trim_matches('/')
}

fn join_path(base: &str, path: &str) -> String {
    match (normalize_path(base), normalize_path(path)) {
        ("", path) => path.to_string(),
        (base, "") => base.to_string(),
        (base, path) => format!("{}/{}", base, path),
    }
}

/// Path pattern of a route. Stored normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatch {
    Any,
    Exact(String),
    /// Matches the prefix itself and anything below it, segment-wise.
    Prefix(String),
}

impl PathMatch {
    pub fn exact(path: &str) -> Self {
        Self::Exact(normalize_path(path).to_string())
    }

    pub fn prefix(path: &str) -> Self {
        match normalize_path(path) {
            "" => Self::Any,
            prefix => Self::Prefix(prefix.to_string()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = normalize_path(path);
        match self {
            Self::Any => true,
            Self::Exact(expected) => path == expected,
            Self::Prefix(prefix) => {
                path == prefix
                    || (path.starts_with(prefix.as_str())
                        && path.as_bytes().get(prefix.len()) == Some(&b'/'))
            }
        }
    }
}

/// A handler bound to an optional method and a path pattern.
pub struct Route {
    method: Option<Method>,
    path: PathMatch,
    handler: Arc<dyn Handler>,
}

impl Route {
    pub fn new(method: Option<Method>, path: PathMatch, handler: impl Handler) -> Self {
        Self {
            method,
            path,
            handler: Arc::new(handler),
        }
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn path(&self) -> &PathMatch {
        &self.path
    }

    pub fn matches(&self, request: &Request) -> bool {
        self.matches_method(request.method()) && self.path.matches(request.path())
    }

    fn matches_method(&self, method: &Method) -> bool {
        match &self.method {
            None => true,
            // HEAD is served by GET routes.
            Some(expected) => expected == method || (*expected == Method::GET && *method == Method::HEAD),
        }
    }

    pub(crate) fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish()
    }
}

/// Immutable, ordered list of routes.
#[derive(Debug, Default)]
pub struct Chain {
    routes: Vec<Route>,
}

impl Chain {
    pub fn builder() -> ChainBuilder {
        ChainBuilder::default()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route at or after `from` that matches the request.
    pub(crate) fn next_match(&self, from: usize, request: &Request) -> Option<(usize, &Route)> {
        self.routes
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, route)| route.matches(request))
    }

    /// Error for a request that ran off the end of the chain.
    pub(crate) fn unmatched(&self, request: &Request) -> Error {
        let mut allowed: Vec<String> = self
            .routes
            .iter()
            .filter(|route| route.path.matches(request.path()))
            .filter_map(|route| route.method.as_ref().map(|m| m.to_string()))
            .collect();
        // GET routes answer HEAD as well.
        if allowed.iter().any(|m| m == "GET") {
            allowed.push(Method::HEAD.to_string());
        }
        allowed.sort();
        allowed.dedup();

        if allowed.is_empty() {
            Error::NotFound {
                method: request.method().to_string(),
                path: request.path().to_string(),
            }
        } else {
            Error::MethodNotAllowed {
                method: request.method().to_string(),
                path: request.path().to_string(),
                allowed,
            }
        }
    }
}

/// Builder for a [`Chain`].
///
/// ```ignore
/// let chain = Chain::builder()
///     .all(|ctx: Context| async move { ctx.next_with(Bindings::single(Utc::now())).await })
///     .get("", |_ctx: Context| async move { Ok(Response::text("Hello, World!")) })
///     .prefix("api", |api| api.get("ping", ping))
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct ChainBuilder {
    base: String,
    routes: Vec<Route>,
}

impl ChainBuilder {
    /// Run `handler` for every request below the current prefix.
    pub fn all(self, handler: impl Handler) -> Self {
        let path = PathMatch::prefix(&self.base);
        self.push(None, path, handler)
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::DELETE, path, handler)
    }

    /// Exact path, any method.
    pub fn path(self, path: &str, handler: impl Handler) -> Self {
        let path = PathMatch::exact(&join_path(&self.base, path));
        self.push(None, path, handler)
    }

    /// Exact path and method.
    pub fn route(self, method: Method, path: &str, handler: impl Handler) -> Self {
        let path = PathMatch::exact(&join_path(&self.base, path));
        self.push(Some(method), path, handler)
    }

    /// Route with an explicit pattern, relative to the current prefix.
    pub fn route_with(self, method: Option<Method>, path: PathMatch, handler: impl Handler) -> Self {
        let path = match path {
            PathMatch::Any => PathMatch::prefix(&self.base),
            PathMatch::Exact(p) => PathMatch::exact(&join_path(&self.base, &p)),
            PathMatch::Prefix(p) => PathMatch::prefix(&join_path(&self.base, &p)),
        };
        self.push(method, path, handler)
    }

    /// Nest routes below `prefix`.
    pub fn prefix<F>(mut self, prefix: &str, build: F) -> Self
    where
        F: FnOnce(ChainBuilder) -> ChainBuilder,
    {
        let nested = build(ChainBuilder {
            base: join_path(&self.base, prefix),
            routes: Vec::new(),
        });
        self.routes.extend(nested.routes);
        self
    }

    pub fn build(self) -> Chain {
        Chain {
            routes: self.routes,
        }
    }

    fn push(mut self, method: Option<Method>, path: PathMatch, handler: impl Handler) -> Self {
        self.routes.push(Route::new(method, path, handler));
        self
    }
}
