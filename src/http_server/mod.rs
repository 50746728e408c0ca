//! # HTTP Server Module
//!
//! Hosts the proxy routes in a single Axum server.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/proxy/*` - Table CRUD proxy
//! - `/forms/submit` - Form submissions
//! - `/tables`, `/rpc/*` - Backend metadata and procedures

pub mod config;
pub mod observability_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use observability_routes::{health_routes, HealthResponse};
pub use server::HttpServer;
