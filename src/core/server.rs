//! HTTP server using Axum
//!
//! Axum only provides the connection handling here: every request lands in
//! one fallback handler that builds the request registry and walks the
//! [`Chain`].

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request as AxumRequest, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
    Router,
};
use futures_util::FutureExt;
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, info, info_span, warn, Instrument, Level};

use crate::config::ServerConfig;
use crate::core::blocking::{panic_message, BlockingExecutor};
use crate::core::chain::Chain;
use crate::core::context::Context;
use crate::core::http::{Request, Response};
use crate::core::registry::{Bindings, Registry};
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::services::peer::PeerClient;

/// Sequential id assigned to each request, bound in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Converts errors that escaped the chain into responses.
///
/// Bind a `Box<dyn ErrorResponder>` in the server registry to replace
/// [`DefaultErrorResponder`].
pub trait ErrorResponder: Send + Sync + 'static {
    fn respond(&self, request: &Request, error: &Error) -> Response;
}

/// Plain-text responses that never leak internal error details.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorResponder;

impl ErrorResponder for DefaultErrorResponder {
    fn respond(&self, _request: &Request, error: &Error) -> Response {
        let status = error.status_code();
        let reason = status.canonical_reason().unwrap_or("Error");

        match error {
            Error::Status { message, .. } if !error.is_internal() => {
                Response::text(message.clone()).with_status(status)
            }
            Error::MethodNotAllowed { allowed, .. } => {
                let response = Response::text(reason).with_status(status);
                match response.clone().with_header("Allow", &allowed.join(", ")) {
                    Ok(with_allow) => with_allow,
                    Err(_) => response,
                }
            }
            _ => Response::text(reason).with_status(status),
        }
    }
}

/// Shared state handed to the axum layer.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<Registry>,
    pub chain: Arc<Chain>,
    pub executor: Arc<BlockingExecutor>,
    pub metrics: Arc<Metrics>,
    request_ids: Arc<AtomicU64>,
}

impl AppState {
    fn next_request_id(&self) -> RequestId {
        RequestId(self.request_ids.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Collects the base registry and the handler chain before anything is bound.
pub struct ServerBuilder {
    config: ServerConfig,
    registry: Registry,
    chain: Chain,
}

impl ServerBuilder {
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn handlers(mut self, chain: Chain) -> Self {
        self.chain = chain;
        self
    }

    /// Install default bindings and start the blocking executor.
    ///
    /// Defaults (`ServerConfig`, `Metrics`, `PeerClient`) are only added when
    /// the registry does not bind them already.
    pub fn build(self) -> Result<Server> {
        let ServerBuilder {
            config,
            mut registry,
            chain,
        } = self;

        if !registry.contains::<ServerConfig>() {
            registry.add(config.clone())?;
        }

        let metrics = match registry.maybe_get::<Metrics>() {
            Some(metrics) => metrics,
            None => {
                let metrics = Arc::new(Metrics::new().map_err(|e| Error::other(e.to_string()))?);
                registry.add_shared(Arc::clone(&metrics))?;
                metrics
            }
        };

        if !registry.contains::<PeerClient>() {
            registry.add_lazy(PeerClient::new)?;
        }

        let executor = Arc::new(BlockingExecutor::new(config.blocking.clone())?);

        info!(
            bindings = registry.len(),
            routes = chain.len(),
            blocking_workers = executor.workers(),
            "Server built"
        );
        debug!(types = ?registry.type_names(), "Server registry");

        Ok(Server {
            state: AppState {
                config: Arc::new(config),
                registry: Arc::new(registry),
                chain: Arc::new(chain),
                executor,
                metrics,
                request_ids: Arc::new(AtomicU64::new(0)),
            },
        })
    }
}

/// A built server: registry, chain and executor are fixed.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn builder(config: ServerConfig) -> ServerBuilder {
        ServerBuilder {
            config,
            registry: Registry::new(),
            chain: Chain::default(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.state.registry
    }

    pub fn executor(&self) -> &Arc<BlockingExecutor> {
        &self.state.executor
    }

    /// Axum router dispatching every request through the chain.
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Bind the configured `host:port`.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        Ok(TcpListener::bind(addr).await?)
    }

    /// Serve until the process receives Ctrl-C.
    pub async fn start(self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serve on `listener` forever.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serve on `listener` until `signal` resolves, then drain in-flight
    /// requests and the blocking executor.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(address = %addr, "HTTP server listening on {}", addr);

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await;

        info!("HTTP server stopped accepting connections");
        self.state.executor.shutdown().await;

        served.map_err(Error::from)
    }
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                )),
        )
        .with_state(state)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: AxumRequest,
    next: Next,
) -> axum::response::Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Increment in-flight requests
    state.metrics.http_requests_in_flight.inc();

    // Process request
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();

    // Decrement in-flight requests
    state.metrics.http_requests_in_flight.dec();

    // Record metrics
    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    // Track failed requests
    if status.is_server_error() {
        state.metrics.http_requests_failed_total.inc();
        error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

async fn dispatch(State(state): State<AppState>, request: AxumRequest) -> axum::response::Response {
    let request_id = state.next_request_id();
    let span = info_span!(
        "request",
        request_id = request_id.0,
        method = %request.method(),
        path = %request.uri().path()
    );
    handle_request(state, request_id, request)
        .instrument(span)
        .await
        .into_response()
}

async fn handle_request(state: AppState, request_id: RequestId, request: AxumRequest) -> Response {
    let (parts, body) = request.into_parts();
    let limit = state.config.max_body_bytes;
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(body) => body,
        Err(e) => {
            let status = if body_limit_exceeded(&e) {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            warn!(error = %e, status = %status, "Failed to read request body");
            return Response::text(status.canonical_reason().unwrap_or("Bad Request"))
                .with_status(status);
        }
    };

    let request = Arc::new(Request::new(parts.method, parts.uri, parts.headers, body));
    let registry = Arc::new(state.registry.extend(Bindings::single(request_id)));
    let ctx = Context::new(
        Arc::clone(&request),
        Arc::clone(&registry),
        Arc::clone(&state.chain),
        Arc::clone(&state.executor),
    );

    let outcome = match AssertUnwindSafe(ctx.next()).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(Error::Panic(panic_message(panic.as_ref()))),
    };

    match outcome {
        Ok(response) => {
            debug!(status = %response.status(), "Request handled");
            response
        }
        Err(error) => respond_with_error(&registry, &request, &error),
    }
}

/// Whether reading the body stopped at the size limit, whatever the framing.
fn body_limit_exceeded(error: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = err.source();
    }
    false
}

fn respond_with_error(registry: &Registry, request: &Request, error: &Error) -> Response {
    if error.is_internal() {
        error!(error = %error, "Request failed");
    } else {
        debug!(error = %error, "Request rejected");
    }

    match registry.maybe_get::<Box<dyn ErrorResponder>>() {
        Some(responder) => responder.respond(request, error),
        None => DefaultErrorResponder.respond(request, error),
    }
}

/// Built-in handler exporting metrics in the Prometheus text format.
pub async fn metrics_handler(ctx: Context) -> Result<Response> {
    let metrics = ctx.get::<Metrics>()?;
    metrics.observe_blocking(&ctx.executor().stats());
    let body = metrics.export().map_err(|e| Error::other(e.to_string()))?;
    Ok(Response::bytes("text/plain; version=0.0.4", body))
}
