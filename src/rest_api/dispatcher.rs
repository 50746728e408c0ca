//! # CRUD Dispatcher
//!
//! Turns a [`RequestIntent`] into exactly one backend operation. All
//! request validation happens in [`Operation::prepare`], before the
//! backend handle is even consulted, so a rejected request never reaches
//! the backend.

use axum::http::Method;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::backend::{Backend, BackendHandle, NotConfigured, Row};

use super::errors::{ProxyError, ProxyResult};
use super::metadata::{require_object, stamp_created, stamp_updated};
use super::parser::QuerySpec;
use super::request::{ClientOrigin, RequestIntent};
use super::response::{Envelope, ProxyReply};

impl From<NotConfigured> for ProxyError {
    fn from(fault: NotConfigured) -> Self {
        ProxyError::ConfigurationFault(fault.to_string())
    }
}

/// A validated backend operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    List {
        table: String,
        query: QuerySpec,
    },
    Fetch {
        table: String,
        id: String,
        query: QuerySpec,
    },
    Create {
        table: String,
        record: Row,
    },
    Update {
        table: String,
        id: String,
        patch: Row,
    },
    Delete {
        table: String,
        id: String,
    },
    Call {
        procedure: String,
        args: Value,
    },
}

impl Operation {
    /// Validate an intent and attach server metadata
    pub fn prepare(intent: RequestIntent, now: DateTime<Utc>) -> ProxyResult<Self> {
        let RequestIntent {
            table,
            id,
            method,
            query,
            payload,
            origin,
        } = intent;

        match method {
            Method::GET => Ok(match id {
                None => Operation::List { table, query },
                Some(id) => {
                    let query = query.for_id(&id);
                    Operation::Fetch { table, id, query }
                }
            }),
            Method::POST => {
                let record = require_object(payload, "Request body must be a JSON object")?;
                Ok(Operation::create(table, record, &origin, now))
            }
            Method::PUT => {
                let id = id.ok_or_else(|| {
                    ProxyError::MalformedRequest("Record ID is required for update".to_string())
                })?;
                let mut patch = require_object(payload, "Update data must be a JSON object")?;
                stamp_updated(&mut patch, now);
                Ok(Operation::Update { table, id, patch })
            }
            Method::DELETE => {
                let id = id.ok_or_else(|| {
                    ProxyError::MalformedRequest("Record ID is required for deletion".to_string())
                })?;
                Ok(Operation::Delete { table, id })
            }
            other => Err(ProxyError::MethodNotAllowed(other.to_string())),
        }
    }

    /// Insert with creation metadata
    pub fn create(table: String, mut record: Row, origin: &ClientOrigin, now: DateTime<Utc>) -> Self {
        stamp_created(&mut record, origin, now);
        Operation::Create { table, record }
    }

    /// Operation name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Operation::List { .. } => "list",
            Operation::Fetch { .. } => "fetch",
            Operation::Create { .. } => "create",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
            Operation::Call { .. } => "call",
        }
    }

    /// Table or procedure the operation addresses
    pub fn target(&self) -> &str {
        match self {
            Operation::List { table, .. }
            | Operation::Fetch { table, .. }
            | Operation::Create { table, .. }
            | Operation::Update { table, .. }
            | Operation::Delete { table, .. } => table,
            Operation::Call { procedure, .. } => procedure,
        }
    }
}

/// Executes operations against the shared backend handle
#[derive(Debug, Clone)]
pub struct Dispatcher {
    backend: BackendHandle,
}

impl Dispatcher {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Validate, then run, a parsed request
    pub async fn dispatch(&self, intent: RequestIntent) -> ProxyResult<ProxyReply> {
        let op = Operation::prepare(intent, Utc::now())?;
        self.execute(op).await
    }

    /// Run a prepared operation; the response is produced only after the
    /// backend call resolves
    pub async fn execute(&self, op: Operation) -> ProxyResult<ProxyReply> {
        let backend = self.backend.get()?;
        let name = op.name();
        let target = op.target().to_string();

        let result = run(backend, op).await;
        match &result {
            Ok(reply) => {
                tracing::info!(op = name, target = %target, status = reply.status.as_u16(), "operation completed")
            }
            Err(e) => {
                tracing::warn!(op = name, target = %target, error = %e, "operation failed")
            }
        }
        result
    }
}

async fn run(backend: &dyn Backend, op: Operation) -> ProxyResult<ProxyReply> {
    match op {
        Operation::List { table, query } => {
            let rows = backend
                .select(&table, &query)
                .await
                .map_err(|e| ProxyError::from_backend(e, &table, None))?;
            Ok(ProxyReply::ok(Envelope::list(rows)))
        }
        Operation::Fetch { table, id, query } => {
            let rows = backend
                .select(&table, &query)
                .await
                .map_err(|e| ProxyError::from_backend(e, &table, Some(&id)))?;
            let row = single_row(rows, &table, &id)?;
            Ok(ProxyReply::ok(Envelope::record(row)))
        }
        Operation::Create { table, record } => {
            let row = backend
                .insert(&table, record)
                .await
                .map_err(|e| ProxyError::from_backend(e, &table, None))?;
            let message = format!("Record created in \"{}\"", table);
            Ok(ProxyReply::created(Envelope::record(row).with_message(message)))
        }
        Operation::Update { table, id, patch } => {
            let rows = backend
                .update(&table, &id, patch)
                .await
                .map_err(|e| ProxyError::from_backend(e, &table, Some(&id)))?;
            let row = first_affected(rows, &table, &id)?;
            let message = format!("Record {} updated in \"{}\"", id, table);
            Ok(ProxyReply::ok(Envelope::record(row).with_message(message)))
        }
        Operation::Delete { table, id } => {
            let rows = backend
                .delete(&table, &id)
                .await
                .map_err(|e| ProxyError::from_backend(e, &table, Some(&id)))?;
            let row = first_affected(rows, &table, &id)?;
            let message = format!("Record {} deleted from \"{}\"", id, table);
            Ok(ProxyReply::ok(Envelope::record(row).with_message(message)))
        }
        Operation::Call { procedure, args } => {
            let result = backend
                .call(&procedure, args)
                .await
                .map_err(|e| ProxyError::from_backend(e, &procedure, None))?;
            Ok(ProxyReply::ok(Envelope::data(result)))
        }
    }
}

fn record_not_found(table: &str, id: &str) -> ProxyError {
    ProxyError::RecordNotFound {
        table: table.to_string(),
        id: id.to_string(),
    }
}

/// Point reads must match exactly one row
fn single_row(rows: Vec<Row>, table: &str, id: &str) -> ProxyResult<Row> {
    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (Some(row), None) => Ok(row),
        (None, _) => Err(record_not_found(table, id)),
        (Some(_), Some(_)) => Err(ProxyError::Transport {
            message: format!("ID \"{}\" matched more than one row in \"{}\"", id, table),
            code: Some("PGRST116".to_string()),
        }),
    }
}

/// Zero rows affected on an id-addressed write is a missing record
fn first_affected(rows: Vec<Row>, table: &str, id: &str) -> ProxyResult<Row> {
    rows.into_iter()
        .next()
        .ok_or_else(|| record_not_found(table, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use axum::http::StatusCode;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    fn intent(method: Method, id: Option<&str>, payload: Option<Value>) -> RequestIntent {
        RequestIntent {
            table: "leads".to_string(),
            id: id.map(str::to_string),
            method,
            query: QuerySpec::default(),
            payload,
            origin: ClientOrigin::default(),
        }
    }

    fn setup() -> (Arc<MemoryBackend>, Dispatcher) {
        let backend = Arc::new(MemoryBackend::new().with_table("leads"));
        let dispatcher = Dispatcher::new(BackendHandle::Ready(backend.clone()));
        (backend, dispatcher)
    }

    #[test]
    fn test_prepare_rejects_missing_ids() {
        let err = Operation::prepare(intent(Method::DELETE, None, None), now()).unwrap_err();
        assert_eq!(
            err,
            ProxyError::MalformedRequest("Record ID is required for deletion".to_string())
        );

        let err = Operation::prepare(intent(Method::PUT, None, Some(json!({}))), now())
            .unwrap_err();
        assert_eq!(
            err,
            ProxyError::MalformedRequest("Record ID is required for update".to_string())
        );
    }

    #[test]
    fn test_prepare_rejects_non_object_payloads() {
        for payload in [None, Some(json!([1, 2])), Some(json!("text"))] {
            let result = Operation::prepare(intent(Method::PUT, Some("1"), payload.clone()), now());
            assert!(matches!(result, Err(ProxyError::MalformedRequest(_))));

            let result = Operation::prepare(intent(Method::POST, None, payload), now());
            assert!(matches!(result, Err(ProxyError::MalformedRequest(_))));
        }
    }

    #[test]
    fn test_prepare_other_methods() {
        let err = Operation::prepare(intent(Method::PATCH, Some("1"), None), now()).unwrap_err();
        assert_eq!(err, ProxyError::MethodNotAllowed("PATCH".to_string()));
    }

    #[test]
    fn test_prepare_stamps_metadata() {
        let op = Operation::prepare(
            intent(Method::PUT, Some("1"), Some(json!({"updated_at": "client"}))),
            now(),
        )
        .unwrap();
        match op {
            Operation::Update { patch, .. } => {
                assert_eq!(patch["updated_at"], "2024-01-02T03:04:05.000Z")
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_prepare_point_query() {
        let op = Operation::prepare(intent(Method::GET, Some("7"), None), now()).unwrap();
        assert_eq!(
            op,
            Operation::Fetch {
                table: "leads".to_string(),
                id: "7".to_string(),
                query: QuerySpec::by_id("7"),
            }
        );
    }

    #[tokio::test]
    async fn test_crud_flow() {
        let (_backend, dispatcher) = setup();

        let created = dispatcher
            .dispatch(intent(Method::POST, None, Some(json!({"name": "Ann"}))))
            .await
            .unwrap();
        assert_eq!(created.status, StatusCode::CREATED);
        let id = created.envelope.data.as_ref().unwrap()["id"].to_string();

        let fetched = dispatcher
            .dispatch(intent(Method::GET, Some(&id), None))
            .await
            .unwrap();
        assert_eq!(fetched.envelope.data.unwrap()["name"], "Ann");

        let updated = dispatcher
            .dispatch(intent(Method::PUT, Some(&id), Some(json!({"name": "Anna"}))))
            .await
            .unwrap();
        assert_eq!(updated.status, StatusCode::OK);
        assert_eq!(updated.envelope.data.unwrap()["name"], "Anna");

        let listed = dispatcher
            .dispatch(intent(Method::GET, None, None))
            .await
            .unwrap();
        assert_eq!(listed.envelope.count, Some(1));

        let deleted = dispatcher
            .dispatch(intent(Method::DELETE, Some(&id), None))
            .await
            .unwrap();
        assert_eq!(deleted.envelope.data.unwrap()["name"], "Anna");
    }

    #[tokio::test]
    async fn test_zero_rows_affected_is_not_found() {
        let (_backend, dispatcher) = setup();

        for method in [Method::PUT, Method::DELETE, Method::GET] {
            let payload = (method == Method::PUT).then(|| json!({"a": 1}));
            let err = dispatcher
                .dispatch(intent(method, Some("404"), payload))
                .await
                .unwrap_err();
            assert_eq!(
                err,
                ProxyError::RecordNotFound {
                    table: "leads".to_string(),
                    id: "404".to_string()
                }
            );
        }
    }

    #[tokio::test]
    async fn test_rejected_requests_never_reach_backend() {
        let (backend, dispatcher) = setup();

        let _ = dispatcher
            .dispatch(intent(Method::PUT, Some("1"), Some(json!(5))))
            .await;
        let _ = dispatcher.dispatch(intent(Method::DELETE, None, None)).await;

        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_backend_is_configuration_fault() {
        let dispatcher = Dispatcher::new(BackendHandle::Unconfigured(NotConfigured {
            missing: vec!["backend.url"],
        }));

        let err = dispatcher
            .dispatch(intent(Method::GET, None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::ConfigurationFault(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_single_row_semantics() {
        let row = |id: i64| {
            let mut r = Row::new();
            r.insert("id".to_string(), json!(id));
            r
        };

        assert!(single_row(vec![row(1)], "t", "1").is_ok());
        assert!(matches!(
            single_row(vec![], "t", "1"),
            Err(ProxyError::RecordNotFound { .. })
        ));
        assert!(matches!(
            single_row(vec![row(1), row(1)], "t", "1"),
            Err(ProxyError::Transport { .. })
        ));
    }
}
