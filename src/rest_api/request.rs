//! # Request Parser
//!
//! Normalizes a raw proxy request into a [`RequestIntent`]. The table and
//! id can come from trailing path segments (`/proxy/leads/3`) or from the
//! `table`/`id` query parameters; path segments win when both are present.

use std::sync::OnceLock;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use regex::Regex;
use serde_json::Value;

use super::errors::{ProxyError, ProxyResult};
use super::parser::{DslOptions, QuerySpec};

/// A request as it arrives at the proxy route
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: Method,
    /// Decoded path segments after the proxy prefix
    pub segments: Vec<String>,
    /// Query pairs in arrival order
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Who sent the request, as far as the headers tell
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOrigin {
    pub address: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

impl ClientOrigin {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let address = header("x-forwarded-for")
            .and_then(|list| list.split(',').next().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .or_else(|| header("x-real-ip"));

        Self {
            address,
            user_agent: header("user-agent"),
            referer: header("referer"),
        }
    }
}

/// A parsed data request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestIntent {
    pub table: String,
    /// Record id; always `None` for POST
    pub id: Option<String>,
    pub method: Method,
    pub query: QuerySpec,
    /// Decoded JSON body of POST/PUT requests, if any
    pub payload: Option<Value>,
    pub origin: ClientOrigin,
}

/// Outcome of parsing a proxy request
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRequest {
    /// `GET` on the proxy root without a table
    Documentation,
    Intent(RequestIntent),
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    })
}

/// Whether `name` is a plain SQL identifier
pub fn is_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Reject names that could not be a plain SQL identifier
pub fn validate_identifier(kind: &str, name: &str) -> ProxyResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(ProxyError::MalformedRequest(format!(
            "Invalid {} name: \"{}\"",
            kind, name
        )))
    }
}

pub fn validate_table_name(table: &str) -> ProxyResult<()> {
    validate_identifier("table", table)
}

/// Last non-empty value of a query parameter
pub fn query_value<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .rev()
        .find(|(k, v)| k == key && !v.trim().is_empty())
        .map(|(_, v)| v.trim())
}

/// Decode a JSON body; an empty body is `None`
pub fn decode_body(body: &[u8]) -> ProxyResult<Option<Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ProxyError::MalformedRequest(format!("Invalid JSON body: {}", e)))
}

/// Parse a raw request into a documentation request or a data intent
pub fn parse_request(raw: RawRequest, options: &DslOptions) -> ProxyResult<ParsedRequest> {
    let segments: Vec<&str> = raw
        .segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if segments.len() > 2 {
        return Err(ProxyError::MalformedRequest(format!(
            "Expected /proxy/{{table}}[/{{id}}], got {} path segments",
            segments.len()
        )));
    }

    let table = segments
        .first()
        .copied()
        .or_else(|| query_value(&raw.query, "table"));
    let id = segments
        .get(1)
        .copied()
        .or_else(|| query_value(&raw.query, "id"));

    let Some(table) = table else {
        if raw.method == Method::GET {
            return Ok(ParsedRequest::Documentation);
        }
        return Err(ProxyError::MalformedRequest(
            "Table name is required".to_string(),
        ));
    };
    validate_table_name(table)?;

    let id = match raw.method {
        Method::POST => None,
        _ => id.map(str::to_string),
    };

    let query = if raw.method == Method::GET {
        QuerySpec::parse(&raw.query, options)?
    } else {
        QuerySpec::default()
    };

    let payload = match raw.method {
        Method::POST | Method::PUT => decode_body(&raw.body)?,
        _ => None,
    };

    Ok(ParsedRequest::Intent(RequestIntent {
        table: table.to_string(),
        id,
        method: raw.method,
        query,
        payload,
        origin: ClientOrigin::from_headers(&raw.headers),
    }))
}
