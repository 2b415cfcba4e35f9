//! Server-level bindings combined with request-level additions

use chrono::{DateTime, Utc};

use crate::core::context::Context;
use crate::core::http::Response;
use crate::core::registry::{Bindings, Registry};
use crate::error::{RegistryError, Result};

/// Produces the message rendered by `/registry`.
pub trait MessageService: Send + Sync {
    fn send(&self) -> String;
}

/// A [`MessageService`] returning a fixed string.
#[derive(Debug, Clone)]
pub struct StaticMessageService {
    message: String,
}

impl StaticMessageService {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl MessageService for StaticMessageService {
    fn send(&self) -> String {
        self.message.clone()
    }
}

/// Moment the chain started processing the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestStart(pub DateTime<Utc>);

pub fn register(registry: &mut Registry) -> std::result::Result<(), RegistryError> {
    registry.add::<Box<dyn MessageService>>(Box::new(StaticMessageService::new(
        "My message service",
    )))?;
    Ok(())
}

/// Bind a [`RequestStart`] for everything further down the chain.
pub async fn request_start(ctx: Context) -> Result<Response> {
    ctx.next_with(Bindings::single(RequestStart(Utc::now()))).await
}

pub async fn registry_message(ctx: Context) -> Result<Response> {
    let start = ctx.get::<RequestStart>()?;
    let service = ctx.get::<Box<dyn MessageService>>()?;
    Ok(Response::text(format!(
        "{} {}",
        start.0.to_rfc3339(),
        service.send()
    )))
}
