//! PostgREST backend
//!
//! Translates [`QuerySpec`]s and writes into PostgREST HTTP calls. Each
//! operation is a single attempt; cancellation is left to the caller.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;

use crate::rest_api::filter::{FilterExpr, FilterOperator};
use crate::rest_api::parser::QuerySpec;

use super::client::{Backend, Row};
use super::config::BackendConfig;
use super::errors::{classify, BackendError, BackendResult, PostgrestErrorBody};

/// Backend speaking the PostgREST protocol
pub struct PostgrestBackend {
    client: Client,
    /// `{url}{rest_path}` without a trailing slash
    base_url: String,
    service_key: String,
    schema: Option<String>,
}

impl PostgrestBackend {
    /// Create a backend for `url` authenticated with `service_key`
    pub fn new(url: &str, rest_path: &str, service_key: impl Into<String>) -> BackendResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let base_url = format!(
            "{}/{}",
            url.trim_end_matches('/'),
            rest_path.trim_matches('/')
        );

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            schema: None,
        })
    }

    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        let url = config.url.as_deref().unwrap_or_default();
        let key = config.service_key.clone().unwrap_or_default();
        let mut backend = Self::new(url, &config.rest_path, key)?;
        backend.schema = config.schema.clone();
        Ok(backend)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let writes = method != Method::GET;
        let mut builder = self
            .client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key);

        if let Some(schema) = &self.schema {
            let profile = if writes { "Content-Profile" } else { "Accept-Profile" };
            builder = builder.header(profile, schema);
        }
        if writes {
            builder = builder.header("Prefer", "return=representation");
        }
        builder
    }

    async fn send(&self, table: &str, builder: RequestBuilder) -> BackendResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .json::<PostgrestErrorBody>()
            .await
            .unwrap_or_default();
        let details = body.details.clone();
        let hint = body.hint.clone();

        let err = classify(table, status.as_u16(), body);
        tracing::debug!(
            table,
            status = status.as_u16(),
            code = ?err.code(),
            details = ?details,
            hint = ?hint,
            "backend rejected request"
        );
        Err(err)
    }

    async fn rows(&self, table: &str, builder: RequestBuilder) -> BackendResult<Vec<Row>> {
        let response = self.send(table, builder).await?;
        Ok(response.json::<Vec<Row>>().await?)
    }
}

#[async_trait]
impl Backend for PostgrestBackend {
    async fn select(&self, table: &str, spec: &QuerySpec) -> BackendResult<Vec<Row>> {
        let builder = self
            .request(Method::GET, self.table_url(table))
            .query(&query_pairs(spec));
        self.rows(table, builder).await
    }

    async fn insert(&self, table: &str, record: Row) -> BackendResult<Row> {
        let builder = self
            .request(Method::POST, self.table_url(table))
            .json(&[Value::Object(record)]);

        self.rows(table, builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode("insert returned no rows".to_string()))
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> BackendResult<Vec<Row>> {
        let builder = self
            .request(Method::PATCH, self.table_url(table))
            .query(&[id_filter(id)])
            .json(&Value::Object(patch));
        self.rows(table, builder).await
    }

    async fn delete(&self, table: &str, id: &str) -> BackendResult<Vec<Row>> {
        let builder = self
            .request(Method::DELETE, self.table_url(table))
            .query(&[id_filter(id)]);
        self.rows(table, builder).await
    }

    async fn call(&self, procedure: &str, args: Value) -> BackendResult<Value> {
        let url = format!("{}/rpc/{}", self.base_url, procedure);
        let builder = self.request(Method::POST, url).json(&args);
        let response = self.send(procedure, builder).await?;

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

fn id_filter(id: &str) -> (String, String) {
    ("id".to_string(), format!("eq.{}", id))
}

/// Query-string pairs PostgREST understands for a compiled query
pub fn query_pairs(spec: &QuerySpec) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_string(), spec.select.clone())];

    pairs.extend(spec.filters.iter().map(render_filter));

    if let Some(order) = &spec.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        pairs.push(("order".to_string(), format!("{}.{}", order.field, direction)));
    }
    if let Some(limit) = spec.limit {
        pairs.push(("limit".to_string(), limit.to_string()));
    }
    if let Some(offset) = spec.offset {
        pairs.push(("offset".to_string(), offset.to_string()));
    }
    pairs
}

fn render_filter(filter: &FilterExpr) -> (String, String) {
    let condition = match (filter.operator, &filter.value) {
        (FilterOperator::Eq, Value::Null) => "is.null".to_string(),
        (FilterOperator::Neq, Value::Null) => "not.is.null".to_string(),
        (op, value) => format!("{}.{}", op, render_value(value)),
    };
    (filter.field.clone(), condition)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
