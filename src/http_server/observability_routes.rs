//! Observability HTTP Routes
//!
//! Health check answered without touching the backend.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::BackendHandle;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    /// `ready` or `unconfigured`
    pub backend: String,
}

impl HealthResponse {
    pub fn for_backend(backend: &BackendHandle) -> Self {
        let state = if backend.is_ready() {
            "ready"
        } else {
            "unconfigured"
        };
        Self {
            status: "ok".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            backend: state.to_string(),
        }
    }
}

/// Health check route
pub fn health_routes(backend: BackendHandle) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(backend)
}

/// Health check handler
async fn health_handler(State(backend): State<BackendHandle>) -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::for_backend(&backend)))
}
