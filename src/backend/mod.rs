//! # Backend Module
//!
//! The data service the proxy fronts, reached through the [`Backend`]
//! trait. `PostgrestBackend` talks to a PostgREST endpoint over HTTP;
//! `MemoryBackend` keeps tables in process memory.

pub mod client;
pub mod config;
pub mod errors;
pub mod memory;
pub mod postgrest;

pub use client::{Backend, BackendHandle, NotConfigured, Row};
pub use config::BackendConfig;
pub use errors::{BackendError, BackendResult};
pub use memory::MemoryBackend;
pub use postgrest::PostgrestBackend;
