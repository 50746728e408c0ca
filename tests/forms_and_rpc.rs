//! Form, Table Listing and RPC Route Tests
//!
//! - Form submissions land in the requested or default table
//! - Form bookkeeping fields are resolved from body aliases and headers
//! - /tables and /rpc pass procedure results through as data
//! - /health and /proxy answer without calling the backend

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use formrelay::backend::{BackendHandle, MemoryBackend};
use formrelay::http_server::{HttpServer, HttpServerConfig};
use formrelay::rest_api::{Dispatcher, ProxyState};
use serde_json::{json, Value};
use tower::ServiceExt;

// =============================================================================
// Helper Functions
// =============================================================================

fn backend() -> Arc<MemoryBackend> {
    Arc::new(
        MemoryBackend::new()
            .with_table("form_submissions")
            .with_table("signups")
            .with_procedure("get_tables_list", json!(["form_submissions", "signups"]))
            .with_procedure("lead_stats", json!({"total": 3})),
    )
}

fn app(backend: Arc<MemoryBackend>) -> Router {
    let state = ProxyState::new(Dispatcher::new(BackendHandle::Ready(backend)));
    HttpServer::with_state(HttpServerConfig::default(), state).router()
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// =============================================================================
// Form Submission Tests
// =============================================================================

#[tokio::test]
async fn test_form_submission_to_named_table() {
    let backend = backend();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/forms/submit?table=signups")
        .header("referer", "https://site.example/signup")
        .header("x-real-ip", "198.51.100.2")
        .body(Body::from(
            r#"{"formName": "Signup", "formid": "f-1", "email": "a@x.com"}"#,
        ))
        .unwrap();

    let (status, body) = call(app(backend.clone()), request).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["form_id"], "f-1");
    assert_eq!(body["data"]["form_name"], "Signup");
    assert_eq!(body["data"]["page_url"], "https://site.example/signup");
    assert_eq!(body["data"]["ip_address"], "198.51.100.2");
    assert!(body["data"]["created_at"].is_string());

    assert_eq!(backend.rows("signups").len(), 1);
    assert!(backend.rows("form_submissions").is_empty());
}

#[tokio::test]
async fn test_form_submission_defaults() {
    let backend = backend();
    let (status, body) = call(app(backend.clone()), post("/forms/submit", r#"{"email": "b@x.com"}"#)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["form_id"], "unknown");
    assert_eq!(body["data"]["form_name"], "unknown");
    assert_eq!(body["data"]["page_url"], "unknown");
    assert_eq!(backend.rows("form_submissions").len(), 1);
}

#[tokio::test]
async fn test_form_submission_echoes_redirect() {
    let (status, body) = call(
        app(backend()),
        post(
            "/forms/submit?redirect=https%3A%2F%2Fsite.example%2Fthanks",
            r#"{"email": "c@x.com", "redirectUrl": "https://site.example/other"}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["redirect_url"], "https://site.example/thanks");

    let (_, body) = call(
        app(backend()),
        post("/forms/submit", r#"{"redirectUrl": "https://site.example/other"}"#),
    )
    .await;
    assert_eq!(body["redirect_url"], "https://site.example/other");

    let (_, body) = call(app(backend()), post("/forms/submit", r#"{"a": 1}"#)).await;
    assert!(body.get("redirect_url").is_none());
}

#[tokio::test]
async fn test_form_submission_rejects_non_object() {
    let backend = backend();
    let (status, body) = call(app(backend.clone()), post("/forms/submit", "[1, 2]")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_form_submission_to_missing_table() {
    let (status, body) = call(
        app(backend()),
        post("/forms/submit?table=nowhere", r#"{"a": 1}"#),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Table \"nowhere\" not found");
}

#[tokio::test]
async fn test_form_route_only_accepts_post() {
    let request = Request::builder()
        .uri("/forms/submit")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(app(backend()), request).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Method GET not allowed");
}

// =============================================================================
// Table Listing and RPC Tests
// =============================================================================

#[tokio::test]
async fn test_tables_listing() {
    let request = Request::builder()
        .uri("/tables")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(app(backend()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["form_submissions", "signups"]));
}

#[tokio::test]
async fn test_rpc_passthrough() {
    let (status, body) = call(app(backend()), post("/rpc/lead_stats", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);

    let (status, body) = call(app(backend()), post("/rpc/lead_stats", r#"{"since": "2024-01-01"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_unknown_procedure_is_server_error() {
    let (status, body) = call(app(backend()), post("/rpc/missing_proc", "{}")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "PGRST202");
}

// =============================================================================
// Backend-free Routes
// =============================================================================

#[tokio::test]
async fn test_health_and_documentation_skip_backend() {
    let backend = backend();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(app(backend.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backend"], "ready");
    assert!(body["version"].is_string());

    let request = Request::builder()
        .uri("/proxy")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(app(backend.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["endpoints"].is_object());

    assert_eq!(backend.call_count(), 0);
}
