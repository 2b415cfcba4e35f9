//! Unit tests for the handler chain, driven directly through `Context`

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use switchyard::config::BlockingConfig;
use switchyard::core::blocking::BlockingExecutor;
use switchyard::core::chain::{Chain, PathMatch};
use switchyard::core::context::Context;
use switchyard::core::http::{Request, Response};
use switchyard::core::registry::{Bindings, Registry};
use switchyard::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
struct Trail(&'static str);

async fn run(chain: Chain, method: Method, uri: &str) -> Result<Response> {
    run_with(Registry::new(), chain, method, uri).await
}

async fn run_with(registry: Registry, chain: Chain, method: Method, uri: &str) -> Result<Response> {
    let request = Request::new(
        method,
        uri.parse::<Uri>().expect("valid uri"),
        HeaderMap::new(),
        Bytes::new(),
    );
    let executor = BlockingExecutor::new(BlockingConfig::default().with_workers(1))
        .expect("Failed to start executor");
    Context::new(
        Arc::new(request),
        Arc::new(registry),
        Arc::new(chain),
        Arc::new(executor),
    )
    .next()
    .await
}

async fn root(_ctx: Context) -> Result<Response> {
    Ok(Response::text("root"))
}

async fn items(_ctx: Context) -> Result<Response> {
    Ok(Response::text("items"))
}

async fn create_item(ctx: Context) -> Result<Response> {
    Ok(Response::text(format!("created {}", ctx.request().body_text())))
}

async fn mark_outer(ctx: Context) -> Result<Response> {
    ctx.next_with(Bindings::single(Trail("outer"))).await
}

async fn mark_inner(ctx: Context) -> Result<Response> {
    let outer = ctx.get::<Trail>()?;
    assert_eq!(*outer, Trail("outer"));
    ctx.next_with(Bindings::single(Trail("inner"))).await
}

async fn report_trail(ctx: Context) -> Result<Response> {
    Ok(Response::text(ctx.get::<Trail>()?.0))
}

struct FactoryThread(String);

async fn resolve_on_worker(ctx: Context) -> Result<Response> {
    let resolved = ctx.get_blocking::<FactoryThread>().await?;
    Ok(Response::text(resolved.0.clone()))
}

async fn pass(ctx: Context) -> Result<Response> {
    ctx.next().await
}

async fn short_circuit(_ctx: Context) -> Result<Response> {
    Ok(Response::text("stopped early"))
}

async fn reject(_ctx: Context) -> Result<Response> {
    Err(Error::status(StatusCode::UNAUTHORIZED, "no entry"))
}

#[tokio::test]
async fn test_routes_match_on_method_and_path() {
    let chain = || {
        Chain::builder()
            .get("", root)
            .get("items", items)
            .post("items", create_item)
            .build()
    };

    let response = run(chain(), Method::GET, "/").await.unwrap();
    assert_eq!(response.body_text(), "root");

    let response = run(chain(), Method::GET, "/items/").await.unwrap();
    assert_eq!(response.body_text(), "items");

    let response = run(chain(), Method::POST, "/items").await.unwrap();
    assert_eq!(response.body_text(), "created ");
}

#[tokio::test]
async fn test_first_matching_route_wins() {
    let chain = Chain::builder()
        .get("items", short_circuit)
        .get("items", items)
        .build();
    let response = run(chain, Method::GET, "/items").await.unwrap();
    assert_eq!(response.body_text(), "stopped early");
}

#[tokio::test]
async fn test_next_with_bindings_are_visible_downstream_only() {
    let chain = Chain::builder()
        .all(mark_outer)
        .all(mark_inner)
        .get("trail", report_trail)
        .build();
    let response = run(chain, Method::GET, "/trail").await.unwrap();
    assert_eq!(response.body_text(), "inner");
}

#[tokio::test]
async fn test_unbound_type_in_handler_is_an_error() {
    let chain = Chain::builder().get("trail", report_trail).build();
    let err = run(chain, Method::GET, "/trail").await.unwrap_err();
    assert!(matches!(err, Error::Registry(_)));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_exhausted_chain_is_not_found() {
    let chain = Chain::builder().all(pass).get("items", items).build();
    let err = run(chain, Method::GET, "/missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_method_lists_allowed_methods() {
    let chain = Chain::builder()
        .post("items", create_item)
        .get("items", items)
        .delete("items", items)
        .build();
    let err = run(chain, Method::PUT, "/items").await.unwrap_err();
    match err {
        Error::MethodNotAllowed { allowed, .. } => {
            assert_eq!(allowed, vec!["DELETE", "GET", "HEAD", "POST"]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_allow_list_without_get_has_no_head() {
    let chain = Chain::builder().post("items", create_item).build();
    let err = run(chain, Method::GET, "/items").await.unwrap_err();
    match err {
        Error::MethodNotAllowed { allowed, .. } => assert_eq!(allowed, vec!["POST"]),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_head_is_served_by_get_routes() {
    let chain = Chain::builder().get("items", items).build();
    let response = run(chain, Method::HEAD, "/items").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_prefix_nests_routes_and_scoped_all() {
    let chain = Chain::builder()
        .prefix("api", |api| {
            api.all(mark_outer)
                .prefix("v1", |v1| v1.get("trail", report_trail))
        })
        .get("trail", report_trail)
        .build();

    let paths: Vec<_> = chain.routes().iter().map(|r| r.path().clone()).collect();
    assert_eq!(
        paths,
        vec![
            PathMatch::Prefix("api".to_string()),
            PathMatch::Exact("api/v1/trail".to_string()),
            PathMatch::Exact("trail".to_string()),
        ]
    );

    let response = run(chain, Method::GET, "/api/v1/trail").await.unwrap();
    assert_eq!(response.body_text(), "outer");
}

#[tokio::test]
async fn test_scoped_all_does_not_run_outside_prefix() {
    let chain = Chain::builder()
        .prefix("api", |api| api.all(reject))
        .get("items", items)
        .build();
    let response = run(chain, Method::GET, "/items").await.unwrap();
    assert_eq!(response.body_text(), "items");

    let chain = Chain::builder()
        .prefix("api", |api| api.all(reject))
        .get("api/items", items)
        .build();
    let err = run(chain, Method::GET, "/api/items").await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_handler_error_stops_the_chain() {
    let chain = Chain::builder().all(reject).get("items", items).build();
    let err = run(chain, Method::GET, "/items").await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_route_with_explicit_prefix_pattern() {
    let chain = Chain::builder()
        .route_with(Some(Method::GET), PathMatch::prefix("files"), items)
        .build();
    let response = run(chain, Method::GET, "/files/a/b.txt").await.unwrap();
    assert_eq!(response.body_text(), "items");
}

#[tokio::test]
async fn test_get_blocking_runs_factory_on_worker() {
    let mut registry = Registry::new();
    registry
        .add_lazy(|| {
            FactoryThread(
                std::thread::current()
                    .name()
                    .unwrap_or_default()
                    .to_string(),
            )
        })
        .unwrap();

    let chain = Chain::builder().get("resolve", resolve_on_worker).build();
    let response = run_with(registry, chain, Method::GET, "/resolve")
        .await
        .unwrap();
    assert!(response.body_text().starts_with("switchyard-blocking"));
}
