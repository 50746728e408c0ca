//! # Proxy REST API Module
//!
//! Translates REST-style HTTP requests into backend operations and maps
//! every outcome into one JSON envelope.
//!
//! Request flow: [`request`] parses the path, query and body into a
//! [`RequestIntent`]; [`parser`] compiles the filter/sort/pagination
//! parameters; [`dispatcher`] validates and runs exactly one backend
//! operation; [`errors`] and [`response`] shape the reply.

pub mod config;
pub mod cors;
pub mod dispatcher;
pub mod errors;
pub mod filter;
pub mod forms;
pub mod metadata;
pub mod parser;
pub mod request;
pub mod response;
pub mod server;

pub use config::{AuthConfig, FormsConfig};
pub use cors::{cors_layer, preflight_gate};
pub use dispatcher::{Dispatcher, Operation};
pub use errors::{ProxyError, ProxyResult};
pub use filter::{FilterExpr, FilterOperator};
pub use parser::{DslOptions, OrderBy, QuerySpec};
pub use request::{ClientOrigin, ParsedRequest, RawRequest, RequestIntent};
pub use response::{Envelope, ProxyReply};
pub use server::{proxy_routes, route_not_found, ProxyState};
