//! Minimal HTTP server skeleton: a typed per-request registry, an ordered
//! handler chain and a blocking executor kept apart from the event loop.

pub mod config;
pub mod core;
pub mod demos;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod services;

pub use crate::core::{
    Bindings, BlockingExecutor, Chain, Context, Handler, Registry, Request, Response, Server,
};
pub use crate::error::{BlockingOperationError, Error, RegistryError, Result};
