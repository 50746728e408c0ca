//! formrelay - HTTP-to-database proxy for form front ends
//!
//! Accepts REST-style requests, compiles them into backend queries and
//! mutations, and answers every outcome with one JSON envelope.

pub mod backend;
pub mod cli;
pub mod config;
pub mod http_server;
pub mod rest_api;
