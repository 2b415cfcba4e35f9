//! Business services wired explicitly in code
//!
//! `SecretMessageService` depends on `SecretMessage`; the dependency is
//! resolved while building the registry rather than by the registry itself.

use serde::Serialize;

use crate::core::context::Context;
use crate::core::http::Response;
use crate::core::registry::Registry;
use crate::error::{Error, RegistryError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMessage(pub String);

/// Multiplies every investment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LucrativeService {
    multiplier: i64,
}

impl LucrativeService {
    pub fn new(multiplier: i64) -> Self {
        Self { multiplier }
    }

    /// Returns `None` on overflow.
    pub fn invest(&self, investment: i64) -> Option<i64> {
        investment.checked_mul(self.multiplier)
    }
}

impl Default for LucrativeService {
    fn default() -> Self {
        Self::new(10)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMessageService {
    message: String,
}

impl SecretMessageService {
    pub fn new(secret: &SecretMessage) -> Self {
        Self {
            message: secret.0.clone(),
        }
    }

    pub fn send(&self) -> String {
        self.message.clone()
    }
}

#[derive(Debug, Serialize)]
struct InvestmentResponse {
    investment: i64,
    returns: i64,
}

pub fn register(registry: &mut Registry, secret: &str) -> std::result::Result<(), RegistryError> {
    let secret = SecretMessage(secret.to_string());
    let message_service = SecretMessageService::new(&secret);

    registry.add(secret)?;
    registry.add(LucrativeService::default())?;
    registry.add_lazy(move || message_service.clone())?;
    Ok(())
}

pub async fn secret_message(ctx: Context) -> Result<Response> {
    let service = ctx.get::<SecretMessageService>()?;
    Ok(Response::text(service.send()))
}

/// `GET /acme/invest?amount=N`
pub async fn invest(ctx: Context) -> Result<Response> {
    let amount = ctx
        .request()
        .query_param("amount")
        .ok_or_else(|| Error::bad_request("missing query parameter: amount"))?;
    let investment: i64 = amount
        .trim()
        .parse()
        .map_err(|_| Error::bad_request(format!("amount must be an integer, got {:?}", amount)))?;

    let service = ctx.get::<LucrativeService>()?;
    let returns = service
        .invest(investment)
        .ok_or_else(|| Error::bad_request("investment too large"))?;

    Response::json(&InvestmentResponse {
        investment,
        returns,
    })
}
