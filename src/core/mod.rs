//! Core server primitives (registry, executor, chain, server)

pub mod blocking;
pub mod chain;
pub mod context;
pub mod http;
pub mod registry;
pub mod server;

pub use blocking::{BlockingExecutor, BlockingHandle, BlockingStats};
pub use chain::{Chain, ChainBuilder, Handler, PathMatch, Route};
pub use context::Context;
pub use http::{Request, Response};
pub use registry::{Binding, Bindings, Registry};
pub use server::{
    create_router, metrics_handler, shutdown_signal, AppState, DefaultErrorResponder,
    ErrorResponder, RequestId, Server, ServerBuilder,
};
