//! Demo applications built on the core server
//!
//! - `hello`: plain text root route
//! - `registry`: server bindings plus a per-request timestamp
//! - `blocking`: a slow service run on the blocking executor
//! - `acme`: a small set of business services wired by hand
//! - `communication`: JSON rendering and calls to a peer instance

pub mod acme;
pub mod blocking;
pub mod communication;
pub mod hello;
pub mod registry;

use std::time::Duration;

use crate::config::env_or;
use crate::core::chain::Chain;
use crate::core::registry::Registry;
use crate::core::server::metrics_handler;
use crate::error::RegistryError;

/// Settings for the demo services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// How long the blocking message service sleeps.
    pub blocking_delay: Duration,
    pub secret_message: String,
}

impl DemoConfig {
    /// Load from `BLOCKING_DELAY_MS` and `SECRET_MESSAGE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            blocking_delay: Duration::from_millis(env_or("BLOCKING_DELAY_MS", 1000)),
            secret_message: std::env::var("SECRET_MESSAGE").unwrap_or(defaults.secret_message),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            blocking_delay: Duration::from_secs(1),
            secret_message: "Important Message".to_string(),
        }
    }
}

/// Server registry for the api-server binary.
pub fn api_registry(config: &DemoConfig) -> Result<Registry, RegistryError> {
    Registry::of(|r| {
        registry::register(r)?;
        blocking::register(r, config.blocking_delay)?;
        acme::register(r, &config.secret_message)?;
        Ok(())
    })
}

/// Handler chain for the api-server binary.
pub fn api_chain() -> Chain {
    Chain::builder()
        .all(registry::request_start)
        .get("", hello::hello)
        .get("registry", registry::registry_message)
        .get("blocking", blocking::blocking_message)
        .get("json", communication::json_date)
        .prefix("acme", |routes| {
            routes
                .get("message", acme::secret_message)
                .get("invest", acme::invest)
        })
        .prefix("peer", |routes| {
            routes
                .get("", communication::peer_text)
                .get("json", communication::peer_json)
        })
        .get("metrics", metrics_handler)
        .build()
}

/// Handler chain for the peer-server binary.
pub fn peer_chain() -> Chain {
    Chain::builder()
        .get("", communication::peer_root)
        .get("json", communication::json_date)
        .get("upstream", communication::peer_text)
        .get("metrics", metrics_handler)
        .build()
}
