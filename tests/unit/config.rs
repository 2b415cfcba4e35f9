//! Unit tests for configuration defaults

use switchyard::config::{is_production, BlockingConfig, ServerConfig, DEFAULT_MAX_BODY_BYTES};
use switchyard::demos::DemoConfig;

#[test]
fn test_server_config_defaults() {
    let config = ServerConfig::default();
    assert_eq!(config.port, 5050);
    assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    assert_eq!(config.peer_url, "http://localhost:8080");
    assert_eq!(config.blocking.workers, 4);
    assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:5050");
}

#[test]
fn test_server_config_builders() {
    let config = ServerConfig::default()
        .with_port(0)
        .with_peer_url("http://127.0.0.1:9000");
    assert_eq!(config.port, 0);
    assert_eq!(config.peer_url, "http://127.0.0.1:9000");
}

#[test]
fn test_invalid_host_has_no_bind_addr() {
    let config = ServerConfig {
        host: "not a host".to_string(),
        ..ServerConfig::default()
    };
    assert!(config.bind_addr().is_err());
}

#[test]
fn test_blocking_workers_never_zero() {
    assert_eq!(BlockingConfig::default().with_workers(0).workers, 1);
    assert_eq!(BlockingConfig::default().with_workers(8).workers, 8);
}

#[test]
fn test_production_environment_names() {
    assert!(is_production("production"));
    assert!(is_production("prod"));
    assert!(!is_production("sandbox"));
    assert!(!is_production("staging"));
}

#[test]
fn test_demo_config_defaults() {
    let config = DemoConfig::default();
    assert_eq!(config.blocking_delay, std::time::Duration::from_secs(1));
    assert_eq!(config.secret_message, "Important Message");
}
