//! Environment-driven configuration
//!
//! Values are read from the process environment. Binaries call
//! `dotenvy::dotenv()` first so a local `.env` file is honoured.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Default cap on request bodies (2 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Get the deployment environment name (`APP_ENV`), defaulting to `sandbox`.
pub fn get_environment() -> String {
    env::var("APP_ENV")
        .map(|e| e.trim().to_lowercase())
        .ok()
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "sandbox".to_string())
}

/// Whether the environment name denotes production.
pub fn is_production(environment: &str) -> bool {
    matches!(environment, "production" | "prod")
}

/// Parse an environment variable, falling back to `default` when unset or invalid.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Server settings shared by both binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub max_body_bytes: usize,
    /// Base URL of the other instance this server talks to.
    pub peer_url: String,
    pub blocking: BlockingConfig,
}

impl ServerConfig {
    /// Load configuration from the environment with the given defaults.
    pub fn from_env(default_port: u16, default_peer_url: &str) -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", default_port),
            environment: get_environment(),
            max_body_bytes: env_or("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
            peer_url: env::var("PEER_URL").unwrap_or_else(|_| default_peer_url.to_string()),
            blocking: BlockingConfig::from_env(),
        }
    }

    /// Socket address to bind, if `host:port` parses.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_peer_url(mut self, peer_url: impl Into<String>) -> Self {
        self.peer_url = peer_url.into();
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5050,
            environment: "sandbox".to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            peer_url: "http://localhost:8080".to_string(),
            blocking: BlockingConfig::default(),
        }
    }
}

/// Configuration for the blocking worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Prefix for worker thread names.
    pub thread_name: String,
}

impl BlockingConfig {
    /// Load configuration from `BLOCKING_WORKERS`.
    pub fn from_env() -> Self {
        Self::default().with_workers(env_or("BLOCKING_WORKERS", 4))
    }

    /// Set the number of workers (at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            thread_name: "switchyard-blocking".to_string(),
        }
    }
}
