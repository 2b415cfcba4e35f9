//! Switchyard Peer Server
//!
//! A second, independently running instance. The api-server calls it over
//! HTTP and it can call back through `/upstream`.

use dotenvy::dotenv;
use switchyard::config::ServerConfig;
use switchyard::demos;
use switchyard::logging;
use switchyard::Server;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    logging::init_logging();

    let config = ServerConfig::from_env(8080, "http://localhost:5050");

    info!("Starting Switchyard Peer Server");
    info!(environment = %config.environment, "Environment");
    info!(port = config.port, "HTTP Server: http://{}:{}", config.host, config.port);
    info!(upstream = %config.peer_url, "Upstream instance");

    let server = Server::builder(config)
        .handlers(demos::peer_chain())
        .build()?;

    if let Err(e) = server.start().await {
        error!(error = %e, "HTTP server error");
        return Err(e.into());
    }

    info!("Peer server stopped");
    Ok(())
}
