//! Integration tests for the API Server
//!
//! Drives the demo chain through the axum router.

#[path = "api_server/test_utils.rs"]
mod test_utils;

use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use test_utils::TestApiServer;

#[tokio::test]
async fn root_returns_hello_world() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "Hello, World!");
}

#[tokio::test]
async fn registry_route_combines_request_start_and_server_service() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/registry").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    let (timestamp, message) = body.split_once(' ').expect("timestamp and message");
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    assert_eq!(message, "My message service");
}

#[tokio::test]
async fn request_start_differs_between_requests() {
    let app = TestApiServer::new().await;
    let first = app.server.get("/registry").await.text();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = app.server.get("/registry").await.text();
    assert_ne!(first, second);
}

#[tokio::test]
async fn blocking_route_runs_slow_service() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/blocking").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "My blocking message service");
}

#[tokio::test]
async fn json_route_renders_current_date() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/json").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let date = body["date"].as_str().expect("date string");
    assert!(chrono::DateTime::parse_from_rfc3339(date).is_ok());
}

#[tokio::test]
async fn acme_message_uses_configured_secret() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/acme/message").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "Test Secret");
}

#[tokio::test]
async fn acme_invest_multiplies_amount() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .get("/acme/invest")
        .add_query_param("amount", 10)
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["investment"], 10);
    assert_eq!(body["returns"], 100);
}

#[tokio::test]
async fn acme_invest_rejects_bad_amounts() {
    let app = TestApiServer::new().await;

    let response = app.server.get("/acme/invest").await;
    assert_eq!(response.status_code(), 400);
    assert!(response.text().contains("amount"));

    let response = app
        .server
        .get("/acme/invest")
        .add_query_param("amount", "ten")
        .await;
    assert_eq!(response.status_code(), 400);

    let response = app
        .server
        .get("/acme/invest")
        .add_query_param("amount", i64::MAX)
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/does/not/exist").await;
    assert_eq!(response.status_code(), 404);
    assert_eq!(response.text(), "Not Found");
}

#[tokio::test]
async fn wrong_method_is_not_allowed() {
    let app = TestApiServer::new().await;
    let response = app.server.post("/registry").await;
    assert_eq!(response.status_code(), 405);
    assert_eq!(response.header("allow"), "GET, HEAD");
}

#[tokio::test]
async fn peer_route_relays_peer_text() {
    let peer = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("This is the peer server"))
        .mount(&peer)
        .await;

    let app = TestApiServer::with_peer(&peer.uri()).await;
    let response = app.server.get("/peer").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "Received from peer: This is the peer server");
}

#[tokio::test]
async fn peer_json_relays_peer_json() {
    let peer = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"date": "2024-05-01T12:00:00Z"})),
        )
        .mount(&peer)
        .await;

    let app = TestApiServer::with_peer(&peer.uri()).await;
    let response = app.server.get("/peer/json").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["date"], "2024-05-01T12:00:00Z");
}

#[tokio::test]
async fn failing_peer_is_a_bad_gateway() {
    let peer = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&peer)
        .await;

    let app = TestApiServer::with_peer(&peer.uri()).await;
    let response = app.server.get("/peer").await;
    assert_eq!(response.status_code(), 502);
    assert_eq!(response.text(), "Bad Gateway");
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let app = TestApiServer::new().await;
    let _ = app.server.get("/").await;
    let _ = app.server.get("/blocking").await;

    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    assert!(
        body.contains("http_requests_total"),
        "Expected http_requests_total metric"
    );
    assert!(
        body.contains("http_request_duration_seconds"),
        "Expected http_request_duration_seconds metric"
    );
    assert!(
        body.contains("blocking_operations_total 1"),
        "Expected one completed blocking operation"
    );
}
