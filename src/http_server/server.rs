//! # HTTP Server
//!
//! Main HTTP server combining the health and proxy routers.

use std::net::SocketAddr;

use axum::{extract::Request, middleware::from_fn, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::backend::BackendHandle;
use crate::config::ProxyConfig;
use crate::rest_api::{
    cors_layer, preflight_gate, proxy_routes, route_not_found, Dispatcher, ProxyState,
};

use super::config::HttpServerConfig;
use super::observability_routes::health_routes;

/// HTTP server for the proxy
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    /// Create a server around an already assembled proxy state
    pub fn with_state(config: HttpServerConfig, state: ProxyState) -> Self {
        let router = Self::build_router(&config, state);
        Self { config, router }
    }

    /// Create a server from the resolved configuration
    pub fn from_config(config: &ProxyConfig) -> Self {
        let backend = BackendHandle::from_config(&config.backend);
        let state = ProxyState {
            dispatcher: Dispatcher::new(backend),
            auth: config.auth.clone(),
            dsl: config.dsl.clone(),
            forms: config.forms.clone(),
        };
        Self::with_state(config.server.clone(), state)
    }

    /// Build the combined router with all endpoints
    fn build_router(config: &HttpServerConfig, state: ProxyState) -> Router {
        let backend = state.dispatcher.backend().clone();

        Router::new()
            // Health check at root level
            .merge(health_routes(backend))
            // Proxy, forms, tables and rpc
            .merge(proxy_routes(state))
            .fallback(route_not_found)
            // OPTIONS never reaches a handler
            .layer(from_fn(preflight_gate))
            .layer(cors_layer(&config.cors_origins))
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Start the HTTP server (async)
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid socket address {}: {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(address = %addr, "formrelay listening");
        tracing::info!("health check: http://{}/health", addr);
        tracing::info!("proxy root: http://{}/proxy", addr);

        axum::serve(listener, self.router).await?;

        Ok(())
    }
}

/// One span per request, tagged with a fresh request id
fn request_span(request: &Request) -> tracing::Span {
    tracing::info_span!(
        "request",
        id = %Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path()
    )
}
