//! In-memory backend
//!
//! Holds tables in process memory and reproduces the outcomes the proxy
//! distinguishes: missing relation, missing row, constraint violation.
//! Used by the dispatcher and router tests.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::rest_api::filter::{compare_json_values, FilterExpr};
use crate::rest_api::parser::QuerySpec;

use super::client::{Backend, Row};
use super::errors::{BackendError, BackendResult};

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Row>,
    next_id: i64,
    required: HashSet<String>,
}

/// Backend keeping every table in memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Table>>,
    procedures: RwLock<HashMap<String, Value>>,
    last_query: Mutex<Option<QuerySpec>>,
    calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table; existing tables are left untouched
    pub fn with_table(self, name: &str) -> Self {
        if let Ok(mut tables) = self.write_tables() {
            tables.entry(name.to_string()).or_insert_with(|| Table {
                next_id: 1,
                ..Default::default()
            });
        }
        self
    }

    /// Mark columns of `table` as NOT NULL
    pub fn with_required(self, table: &str, columns: &[&str]) -> Self {
        let this = self.with_table(table);
        if let Ok(mut tables) = this.write_tables() {
            if let Some(t) = tables.get_mut(table) {
                t.required.extend(columns.iter().map(|c| c.to_string()));
            }
        }
        this
    }

    /// Register a procedure that always returns `result`
    pub fn with_procedure(self, name: &str, result: Value) -> Self {
        if let Ok(mut procedures) = self.procedures.write() {
            procedures.insert(name.to_string(), result);
        }
        self
    }

    /// Number of backend operations performed so far
    pub fn call_count(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// The most recent query passed to `select`
    pub fn last_query(&self) -> Option<QuerySpec> {
        self.last_query.lock().ok().and_then(|q| q.clone())
    }

    /// Snapshot of a table's rows
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(table).map(|t| t.rows.clone()))
            .unwrap_or_default()
    }

    fn write_tables(
        &self,
    ) -> BackendResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Table>>> {
        self.tables
            .write()
            .map_err(|_| BackendError::Transport("Lock poisoned".to_string()))
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
    }

    fn missing(table: &str) -> BackendError {
        BackendError::RelationNotFound {
            table: table.to_string(),
            code: Some("42P01".to_string()),
        }
    }

    fn check_required(required: &HashSet<String>, row: &Row) -> BackendResult<()> {
        let mut required: Vec<&String> = required.iter().collect();
        required.sort();
        for column in required {
            if row.get(column).map_or(true, Value::is_null) {
                return Err(BackendError::Validation {
                    code: Some("23502".to_string()),
                    message: format!(
                        "null value in column \"{}\" violates not-null constraint",
                        column
                    ),
                });
            }
        }
        Ok(())
    }

    /// Apply ordering
    fn apply_ordering(rows: &mut [Row], spec: &QuerySpec) {
        let Some(order) = &spec.order else {
            return;
        };

        rows.sort_by(|a, b| {
            let cmp = match (a.get(&order.field), b.get(&order.field)) {
                (Some(a), Some(b)) => compare_json_values(a, b).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            };
            if order.ascending {
                cmp
            } else {
                cmp.reverse()
            }
        });
    }

    /// Select fields from rows
    fn select_fields(rows: Vec<Row>, select: &str) -> Vec<Row> {
        if select == "*" {
            return rows;
        }
        let fields: Vec<&str> = select.split(',').collect();
        rows.into_iter()
            .map(|row| {
                row.into_iter()
                    .filter(|(k, _)| fields.contains(&k.as_str()))
                    .collect()
            })
            .collect()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, table: &str, spec: &QuerySpec) -> BackendResult<Vec<Row>> {
        self.record_call();
        if let Ok(mut last) = self.last_query.lock() {
            *last = Some(spec.clone());
        }

        let tables = self
            .tables
            .read()
            .map_err(|_| BackendError::Transport("Lock poisoned".to_string()))?;
        let stored = tables.get(table).ok_or_else(|| Self::missing(table))?;

        let mut rows: Vec<Row> = stored
            .rows
            .iter()
            .filter(|r| spec.filters.iter().all(|f| f.matches_row(r)))
            .cloned()
            .collect();

        Self::apply_ordering(&mut rows, spec);

        let rows = rows
            .into_iter()
            .skip(spec.offset.unwrap_or(0))
            .take(spec.limit.unwrap_or(usize::MAX))
            .collect();

        Ok(Self::select_fields(rows, &spec.select))
    }

    async fn insert(&self, table: &str, mut record: Row) -> BackendResult<Row> {
        self.record_call();
        let mut tables = self.write_tables()?;
        let stored = tables.get_mut(table).ok_or_else(|| Self::missing(table))?;

        Self::check_required(&stored.required, &record)?;

        if let Some(id) = record.get("id").cloned() {
            let id_filter = FilterExpr::eq("id", id);
            if stored.rows.iter().any(|r| id_filter.matches_row(r)) {
                return Err(BackendError::Validation {
                    code: Some("23505".to_string()),
                    message: format!(
                        "duplicate key value violates unique constraint \"{}_pkey\"",
                        table
                    ),
                });
            }
        } else {
            record.insert("id".to_string(), Value::from(stored.next_id));
            stored.next_id += 1;
        }

        stored.rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> BackendResult<Vec<Row>> {
        self.record_call();
        let mut tables = self.write_tables()?;
        let stored = tables.get_mut(table).ok_or_else(|| Self::missing(table))?;
        let id_filter = FilterExpr::eq("id", Value::String(id.to_string()));

        let mut updated = Vec::new();
        for row in stored.rows.iter_mut().filter(|r| id_filter.matches_row(r)) {
            let mut candidate = row.clone();
            for (key, value) in &patch {
                candidate.insert(key.clone(), value.clone());
            }
            Self::check_required(&stored.required, &candidate)?;
            *row = candidate.clone();
            updated.push(candidate);
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &str) -> BackendResult<Vec<Row>> {
        self.record_call();
        let mut tables = self.write_tables()?;
        let stored = tables.get_mut(table).ok_or_else(|| Self::missing(table))?;
        let id_filter = FilterExpr::eq("id", Value::String(id.to_string()));

        let (removed, kept): (Vec<Row>, Vec<Row>) = std::mem::take(&mut stored.rows)
            .into_iter()
            .partition(|r| id_filter.matches_row(r));
        stored.rows = kept;
        Ok(removed)
    }

    async fn call(&self, procedure: &str, _args: Value) -> BackendResult<Value> {
        self.record_call();
        let procedures = self
            .procedures
            .read()
            .map_err(|_| BackendError::Transport("Lock poisoned".to_string()))?;

        procedures
            .get(procedure)
            .cloned()
            .ok_or_else(|| BackendError::Rejected {
                status: 404,
                code: Some("PGRST202".to_string()),
                message: format!("Could not find the function {}", procedure),
            })
    }
}
