//! # REST API HTTP Routes
//!
//! Axum handlers for the proxy surface: `/proxy`, `/forms/submit`,
//! `/tables` and `/rpc/:procedure`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};

use super::config::{AuthConfig, FormsConfig};
use super::dispatcher::{Dispatcher, Operation};
use super::errors::{ProxyError, ProxyResult};
use super::forms::{build_submission, redirect_target};
use super::metadata::require_object;
use super::parser::DslOptions;
use super::request::{
    decode_body, parse_request, query_value, validate_identifier, validate_table_name,
    ClientOrigin, ParsedRequest, RawRequest,
};
use super::response::{Envelope, ProxyReply};

/// Procedure backing `GET /tables`
pub const TABLES_PROCEDURE: &str = "get_tables_list";

/// Shared state for the proxy routes
#[derive(Debug, Clone)]
pub struct ProxyState {
    pub dispatcher: Dispatcher,
    pub auth: AuthConfig,
    pub dsl: DslOptions,
    pub forms: FormsConfig,
}

impl ProxyState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            auth: AuthConfig::default(),
            dsl: DslOptions::default(),
            forms: FormsConfig::default(),
        }
    }
}

type SharedState = Arc<ProxyState>;

/// Build the proxy router
pub fn proxy_routes(state: ProxyState) -> Router {
    Router::new()
        .route("/proxy", any(proxy_root_handler))
        .route("/proxy/*rest", any(proxy_path_handler))
        .route(
            "/forms/submit",
            post(form_submit_handler).fallback(method_not_allowed),
        )
        .route("/tables", get(tables_handler).fallback(method_not_allowed))
        .route(
            "/rpc/:procedure",
            post(rpc_handler).fallback(method_not_allowed),
        )
        .with_state(Arc::new(state))
}

async fn method_not_allowed(method: Method) -> ProxyError {
    ProxyError::MethodNotAllowed(method.to_string())
}

/// Fallback for paths no router serves
pub async fn route_not_found(uri: Uri) -> ProxyError {
    ProxyError::RouteNotFound(uri.path().to_string())
}

async fn proxy_root_handler(
    State(state): State<SharedState>,
    method: Method,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw = RawRequest {
        method,
        segments: Vec::new(),
        query,
        headers,
        body,
    };
    respond(handle_proxy(&state, raw).await)
}

async fn proxy_path_handler(
    State(state): State<SharedState>,
    method: Method,
    Path(rest): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw = RawRequest {
        method,
        segments: rest.split('/').map(str::to_string).collect(),
        query,
        headers,
        body,
    };
    respond(handle_proxy(&state, raw).await)
}

fn respond(result: ProxyResult<ProxyReply>) -> Response {
    match result {
        Ok(reply) => reply.into_response(),
        Err(e) => e.into_response(),
    }
}

/// The documentation root is public; everything else needs the shared secret
async fn handle_proxy(state: &ProxyState, raw: RawRequest) -> ProxyResult<ProxyReply> {
    let authorized = state.auth.authorize(&raw.headers);

    match parse_request(raw, &state.dsl) {
        Ok(ParsedRequest::Documentation) => {
            Ok(ProxyReply::ok(Envelope::data(documentation(&state.dsl))))
        }
        Ok(ParsedRequest::Intent(intent)) => {
            authorized?;
            tracing::debug!(
                method = %intent.method,
                table = %intent.table,
                id = ?intent.id,
                "dispatching proxy request"
            );
            state.dispatcher.dispatch(intent).await
        }
        Err(e) => {
            authorized?;
            Err(e)
        }
    }
}

/// Self-description served at the proxy root
pub fn documentation(dsl: &DslOptions) -> Value {
    let operators: Vec<&str> = dsl.operators.iter().map(|op| op.as_str()).collect();
    let filter = if dsl.json_filter {
        "JSON object of field equality filters"
    } else {
        "disabled"
    };
    json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /proxy/{table}": "List records",
            "GET /proxy/{table}/{id}": "Fetch one record",
            "POST /proxy/{table}": "Create a record from a JSON object body",
            "PUT /proxy/{table}/{id}": "Update a record from a JSON object body",
            "DELETE /proxy/{table}/{id}": "Delete a record",
            "POST /forms/submit?table={table}": "Store a form submission",
            "GET /tables": "List backend tables",
            "POST /rpc/{procedure}": "Call a backend procedure",
            "GET /health": "Service health"
        },
        "query_parameters": {
            "table": "Table name when not given in the path",
            "id": "Record id when not given in the path",
            "select": "Comma separated columns, default *",
            "filter": filter,
            "operators": operators,
            "order": "field:asc or field:desc",
            "limit": "Maximum rows returned",
            "offset": "Rows skipped",
            "page": format!("1-based page, default page size {}", dsl.default_page_size)
        }
    })
}

async fn form_submit_handler(
    State(state): State<SharedState>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    respond(submit_form(&state, &query, &headers, &body).await)
}

async fn submit_form(
    state: &ProxyState,
    query: &[(String, String)],
    headers: &HeaderMap,
    body: &[u8],
) -> ProxyResult<ProxyReply> {
    state.auth.authorize(headers)?;

    let table = query_value(query, "table").unwrap_or(state.forms.default_table.as_str());
    validate_table_name(table)?;

    let record = require_object(decode_body(body)?, "Form data must be a JSON object")?;
    let redirect = redirect_target(query_value(query, "redirect"), &record);
    let origin = ClientOrigin::from_headers(headers);
    let record = build_submission(record, &origin);

    tracing::debug!(table = %table, "storing form submission");
    let op = Operation::create(table.to_string(), record, &origin, Utc::now());
    let mut reply = state.dispatcher.execute(op).await?;
    if let Some(url) = redirect {
        reply.envelope = reply.envelope.with_redirect(url);
    }
    Ok(reply)
}

async fn tables_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let result = match state.auth.authorize(&headers) {
        Ok(()) => {
            let op = Operation::Call {
                procedure: TABLES_PROCEDURE.to_string(),
                args: json!({}),
            };
            state.dispatcher.execute(op).await
        }
        Err(e) => Err(e),
    };
    respond(result)
}

async fn rpc_handler(
    State(state): State<SharedState>,
    Path(procedure): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    respond(call_procedure(&state, procedure, &headers, &body).await)
}

async fn call_procedure(
    state: &ProxyState,
    procedure: String,
    headers: &HeaderMap,
    body: &[u8],
) -> ProxyResult<ProxyReply> {
    state.auth.authorize(headers)?;
    validate_identifier("procedure", &procedure)?;

    let args = match decode_body(body)? {
        None => json!({}),
        Some(args @ Value::Object(_)) => args,
        Some(_) => {
            return Err(ProxyError::MalformedRequest(
                "Procedure arguments must be a JSON object".to_string(),
            ))
        }
    };

    state
        .dispatcher
        .execute(Operation::Call { procedure, args })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendHandle, MemoryBackend};
    use axum::http::StatusCode;

    fn state() -> ProxyState {
        let backend = MemoryBackend::new()
            .with_table("leads")
            .with_table("form_submissions")
            .with_procedure(TABLES_PROCEDURE, json!(["leads", "form_submissions"]));
        ProxyState::new(Dispatcher::new(BackendHandle::ready(backend)))
    }

    #[test]
    fn test_documentation_lists_operators() {
        let dsl = DslOptions::default();
        let docs = documentation(&dsl);
        assert_eq!(docs["query_parameters"]["operators"], json!(["eq", "neq", "gt", "lt"]));
        assert!(docs["endpoints"]["GET /health"].is_string());
    }

    #[tokio::test]
    async fn test_form_submission_uses_default_table() {
        let state = state();
        let reply = submit_form(
            &state,
            &[],
            &HeaderMap::new(),
            br#"{"formId": "signup", "email": "a@b.c"}"#,
        )
        .await
        .unwrap();

        assert_eq!(reply.status, StatusCode::CREATED);
        assert_eq!(
            reply.envelope.message.as_deref(),
            Some("Record created in \"form_submissions\"")
        );
        let data = reply.envelope.data.unwrap();
        assert_eq!(data["form_id"], "signup");
        assert_eq!(data["form_name"], "unknown");
        assert!(data["created_at"].is_string());
    }

    #[tokio::test]
    async fn test_form_submission_requires_object() {
        let query = vec![("table".to_string(), "leads".to_string())];
        let err = submit_form(&state(), &query, &HeaderMap::new(), b"")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProxyError::MalformedRequest("Form data must be a JSON object".to_string())
        );
    }

    #[tokio::test]
    async fn test_rpc_argument_shapes() {
        let state = state();

        let reply = call_procedure(&state, TABLES_PROCEDURE.to_string(), &HeaderMap::new(), b"")
            .await
            .unwrap();
        assert_eq!(reply.envelope.data, Some(json!(["leads", "form_submissions"])));

        let err = call_procedure(&state, TABLES_PROCEDURE.to_string(), &HeaderMap::new(), b"[1]")
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::MalformedRequest(_)));

        let err = call_procedure(&state, "drop table".to_string(), &HeaderMap::new(), b"")
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::MalformedRequest(_)));
    }

    #[tokio::test]
    async fn test_documentation_skips_auth() {
        let mut state = state();
        state.auth.shared_secret = Some("secret".to_string());

        let raw = RawRequest {
            method: Method::GET,
            segments: Vec::new(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        assert!(handle_proxy(&state, raw.clone()).await.is_ok());

        let raw = RawRequest {
            segments: vec!["leads".to_string()],
            ..raw
        };
        assert_eq!(
            handle_proxy(&state, raw).await.unwrap_err(),
            ProxyError::Unauthorized
        );
    }
}
