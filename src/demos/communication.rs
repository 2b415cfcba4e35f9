//! JSON rendering and calls between two running instances

use std::collections::HashMap;

use chrono::Utc;
use serde_json::{json, Value};

use crate::config::ServerConfig;
use crate::core::context::Context;
use crate::core::http::Response;
use crate::error::Result;
use crate::services::peer::PeerClient;

pub const PEER_GREETING: &str = "This is the peer server";

pub async fn peer_root(_ctx: Context) -> Result<Response> {
    Ok(Response::text(PEER_GREETING))
}

/// `{"date": "<now, RFC 3339>"}`
pub async fn json_date(_ctx: Context) -> Result<Response> {
    Response::json(&json!({ "date": Utc::now().to_rfc3339() }))
}

/// Fetch the peer's root as text.
pub async fn peer_text(ctx: Context) -> Result<Response> {
    let config = ctx.get::<ServerConfig>()?;
    let client = ctx.get::<PeerClient>()?;

    let body = client.get_text(&config.peer_url).await?;
    Ok(Response::text(format!("Received from peer: {}", body)))
}

/// Fetch the peer's `/json` and pass it on.
pub async fn peer_json(ctx: Context) -> Result<Response> {
    let config = ctx.get::<ServerConfig>()?;
    let client = ctx.get::<PeerClient>()?;

    let url = PeerClient::join(&config.peer_url, "json")?;
    let body: HashMap<String, Value> = client.get_json(url.as_str()).await?;
    Response::json(&body)
}
