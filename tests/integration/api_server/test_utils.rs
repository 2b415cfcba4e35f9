//! Test utilities for API server integration tests

use std::time::Duration;

use axum_test::TestServer;
use switchyard::config::{BlockingConfig, ServerConfig};
use switchyard::demos::{self, DemoConfig};
use switchyard::Server;

/// Test helper for API server integration tests
#[allow(dead_code)]
pub struct TestApiServer {
    pub server: TestServer,
    pub config: ServerConfig,
}

impl TestApiServer {
    pub async fn new() -> Self {
        Self::with_peer("http://127.0.0.1:9").await
    }

    pub async fn with_peer(peer_url: &str) -> Self {
        let config = ServerConfig::default()
            .with_port(0)
            .with_peer_url(peer_url);
        let config = ServerConfig {
            blocking: BlockingConfig::default().with_workers(2),
            ..config
        };
        let demo_config = DemoConfig {
            blocking_delay: Duration::from_millis(50),
            secret_message: "Test Secret".to_string(),
        };

        let registry = demos::api_registry(&demo_config).expect("demo registry");
        let server = Server::builder(config.clone())
            .registry(registry)
            .handlers(demos::api_chain())
            .build()
            .expect("build server");

        let server = TestServer::new(server.router()).expect("start test server");

        Self { server, config }
    }
}
