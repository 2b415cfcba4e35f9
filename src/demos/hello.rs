use crate::core::context::Context;
use crate::core::http::Response;
use crate::error::Result;

pub const GREETING: &str = "Hello, World!";

pub async fn hello(_ctx: Context) -> Result<Response> {
    Ok(Response::text(GREETING))
}
