//! Backend client abstraction
//!
//! A capability-typed view of the remote data service. Handlers only ever
//! see a [`BackendHandle`]; whether a real backend sits behind it is
//! decided once at startup.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::rest_api::parser::QuerySpec;

use super::config::BackendConfig;
use super::errors::BackendResult;
use super::postgrest::PostgrestBackend;

/// A single record as a flat key-value object
pub type Row = Map<String, Value>;

/// Operations the proxy needs from a data backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Rows of `table` matching the compiled query, in backend order
    async fn select(&self, table: &str, spec: &QuerySpec) -> BackendResult<Vec<Row>>;

    /// Insert one record and return it as stored
    async fn insert(&self, table: &str, record: Row) -> BackendResult<Row>;

    /// Patch the rows whose `id` equals `id`; returns the rows affected
    async fn update(&self, table: &str, id: &str, patch: Row) -> BackendResult<Vec<Row>>;

    /// Delete the rows whose `id` equals `id`; returns the rows removed
    async fn delete(&self, table: &str, id: &str) -> BackendResult<Vec<Row>>;

    /// Invoke a stored procedure
    async fn call(&self, procedure: &str, args: Value) -> BackendResult<Value>;
}

/// The backend was never configured
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing configuration: {}", .missing.join(", "))]
pub struct NotConfigured {
    pub missing: Vec<&'static str>,
}

/// Process-wide backend handle, shared read-only by every request
#[derive(Clone)]
pub enum BackendHandle {
    Ready(Arc<dyn Backend>),
    Unconfigured(NotConfigured),
}

impl BackendHandle {
    /// Wrap an already constructed backend
    pub fn ready(backend: impl Backend + 'static) -> Self {
        BackendHandle::Ready(Arc::new(backend))
    }

    /// Build the PostgREST backend, or an unconfigured handle when the
    /// endpoint or credential is absent
    pub fn from_config(config: &BackendConfig) -> Self {
        let missing = config.missing_fields();
        if !missing.is_empty() {
            tracing::warn!(missing = ?missing, "backend not configured; data routes will fail");
            return BackendHandle::Unconfigured(NotConfigured { missing });
        }

        match PostgrestBackend::from_config(config) {
            Ok(backend) => BackendHandle::ready(backend),
            Err(e) => {
                tracing::error!(error = %e, "failed to construct backend client");
                BackendHandle::Unconfigured(NotConfigured {
                    missing: vec!["backend client"],
                })
            }
        }
    }

    /// The backend, or the configuration fault that prevents using it
    pub fn get(&self) -> Result<&dyn Backend, NotConfigured> {
        match self {
            BackendHandle::Ready(backend) => Ok(backend.as_ref()),
            BackendHandle::Unconfigured(fault) => Err(fault.clone()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, BackendHandle::Ready(_))
    }
}

impl fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendHandle::Ready(_) => f.write_str("BackendHandle::Ready"),
            BackendHandle::Unconfigured(fault) => {
                write!(f, "BackendHandle::Unconfigured({})", fault)
            }
        }
    }
}
