//! Switchyard API Server
//!
//! Serves the demo applications: hello world, registry lookups, blocking
//! work and calls to a peer instance (see `peer-server`).

use dotenvy::dotenv;
use switchyard::config::ServerConfig;
use switchyard::demos::{self, DemoConfig};
use switchyard::logging;
use switchyard::Server;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let config = ServerConfig::from_env(5050, "http://localhost:8080");
    let demo_config = DemoConfig::from_env();

    info!("Starting Switchyard API Server");
    info!(environment = %config.environment, "Environment");
    info!(port = config.port, "HTTP Server: http://{}:{}", config.host, config.port);
    info!(peer = %config.peer_url, "Peer instance");

    let registry = demos::api_registry(&demo_config)?;
    let server = Server::builder(config)
        .registry(registry)
        .handlers(demos::api_chain())
        .build()?;

    if let Err(e) = server.start().await {
        error!(error = %e, "HTTP server error");
        return Err(e.into());
    }

    info!("API server stopped");
    Ok(())
}
