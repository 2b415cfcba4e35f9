//! A service that blocks, always called through the blocking executor

use std::time::Duration;

use tracing::debug;

use crate::core::context::Context;
use crate::core::http::Response;
use crate::core::registry::Registry;
use crate::error::{BoxError, RegistryError, Result};

pub const BLOCKING_MESSAGE: &str = "My blocking message service";

/// A message source whose `send` blocks the calling thread.
pub trait BlockingMessageService: Send + Sync {
    fn send(&self) -> std::result::Result<String, BoxError>;
}

/// Sleeps for a fixed delay before answering.
#[derive(Debug, Clone)]
pub struct SlowMessageService {
    delay: Duration,
}

impl SlowMessageService {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BlockingMessageService for SlowMessageService {
    fn send(&self) -> std::result::Result<String, BoxError> {
        debug!(delay_ms = self.delay.as_millis() as u64, "SlowMessageService: sleeping");
        std::thread::sleep(self.delay);
        Ok(BLOCKING_MESSAGE.to_string())
    }
}

pub fn register(registry: &mut Registry, delay: Duration) -> std::result::Result<(), RegistryError> {
    registry.add::<Box<dyn BlockingMessageService>>(Box::new(SlowMessageService::new(delay)))?;
    Ok(())
}

pub async fn blocking_message(ctx: Context) -> Result<Response> {
    let service = ctx.get::<Box<dyn BlockingMessageService>>()?;
    let message = ctx.blocking(move || service.send()).await?;
    Ok(Response::text(message))
}
