//! # Query Parameter Parser
//!
//! Compiles the filter/sort/pagination mini-language carried in the query
//! string into a backend-agnostic [`QuerySpec`].
//!
//! Filter fragments are parsed leniently: a `filter` value that is not a
//! JSON object, or a shorthand pair without a `:`, is dropped and the rest
//! of the request proceeds. So is a fragment whose field is not a plain
//! identifier or collides with a PostgREST query parameter. Pagination
//! values are strict.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{ProxyError, ProxyResult};
use super::filter::{FilterExpr, FilterOperator};
use super::request::is_identifier;

/// Page size used when `page` is given without `limit`
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Query parameter names PostgREST reserves for itself
const RESERVED_PARAMS: [&str; 9] = [
    "select",
    "order",
    "limit",
    "offset",
    "or",
    "and",
    "not",
    "on_conflict",
    "columns",
];

/// Which parts of the DSL a deployment accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DslOptions {
    /// Shorthand operators honoured as query parameters
    #[serde(default = "default_operators")]
    pub operators: Vec<FilterOperator>,

    /// Whether `filter=<json object>` is honoured
    #[serde(default = "default_true")]
    pub json_filter: bool,

    /// Limit applied when paginating by `page` without `limit`
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

fn default_operators() -> Vec<FilterOperator> {
    FilterOperator::ALL.to_vec()
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for DslOptions {
    fn default() -> Self {
        Self {
            operators: default_operators(),
            json_filter: true,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl DslOptions {
    fn allows(&self, op: FilterOperator) -> bool {
        self.operators.contains(&op)
    }
}

/// Order by clause
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBy {
    pub field: String,
    pub ascending: bool,
}

/// Compiled query for one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySpec {
    /// Column list, `*` for all
    pub select: String,

    /// Conjunctive filters
    pub filters: Vec<FilterExpr>,

    pub order: Option<OrderBy>,

    pub limit: Option<usize>,

    pub offset: Option<usize>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            select: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
            offset: None,
        }
    }
}

impl QuerySpec {
    /// Point query for a single record id
    pub fn by_id(id: &str) -> Self {
        Self {
            filters: vec![FilterExpr::eq("id", Value::String(id.to_string()))],
            ..Default::default()
        }
    }

    /// Parse query parameters in the order they appeared
    pub fn parse(params: &[(String, String)], options: &DslOptions) -> ProxyResult<Self> {
        let mut result = QuerySpec::default();
        let mut page = None;

        for (key, value) in params {
            match key.as_str() {
                "select" => {
                    result.select = parse_select(value);
                }
                "filter" => {
                    if options.json_filter {
                        result.filters.extend(parse_json_filter(value));
                    }
                }
                "order" => {
                    if let Some(order) = parse_order(value) {
                        result.order = Some(order);
                    }
                }
                "limit" => {
                    result.limit = Some(parse_count("limit", value)?);
                }
                "offset" => {
                    result.offset = Some(parse_count("offset", value)?);
                }
                "page" => {
                    page = Some(parse_page(value)?);
                }
                other => {
                    if let Ok(op) = other.parse::<FilterOperator>() {
                        if options.allows(op) {
                            result.filters.extend(parse_shorthand(op, value));
                        }
                    }
                }
            }
        }

        if let Some(page) = page {
            let limit = *result.limit.get_or_insert(options.default_page_size);
            if result.offset.is_none() {
                let offset = (page - 1).checked_mul(limit).ok_or_else(|| {
                    ProxyError::MalformedRequest("Invalid page: offset out of range".to_string())
                })?;
                result.offset = Some(offset);
            }
        }

        Ok(result)
    }

    /// Copy this spec narrowed to a single record id
    pub fn for_id(&self, id: &str) -> Self {
        let mut spec = QuerySpec::by_id(id);
        spec.select = self.select.clone();
        spec
    }
}

/// Parse select parameter (comma-separated field list)
fn parse_select(value: &str) -> String {
    let fields: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if fields.is_empty() {
        "*".to_string()
    } else {
        fields.join(",")
    }
}

/// A column name that can be sent to the backend as a query key
fn is_column(field: &str) -> bool {
    is_identifier(field) && !RESERVED_PARAMS.contains(&field.to_ascii_lowercase().as_str())
}

/// Each key of a JSON object becomes an equality filter
fn parse_json_filter(value: &str) -> Vec<FilterExpr> {
    match serde_json::from_str::<Value>(value) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .filter(|(field, _)| {
                let usable = is_column(field);
                if !usable {
                    tracing::debug!(field = %field, "ignoring filter on unusable field");
                }
                usable
            })
            .map(|(field, value)| FilterExpr::eq(field, value))
            .collect(),
        _ => {
            tracing::debug!(filter = %value, "ignoring unparseable filter");
            Vec::new()
        }
    }
}

/// `field:value` for a single operator
fn parse_shorthand(op: FilterOperator, value: &str) -> Option<FilterExpr> {
    let (field, raw) = value.split_once(':')?;
    let field = field.trim();
    if !is_column(field) {
        tracing::debug!(op = %op, pair = %value, "ignoring filter on unusable field");
        return None;
    }
    Some(FilterExpr::new(field, op, parse_filter_value(raw)))
}

/// `field:asc|desc`; anything but `desc` sorts ascending
fn parse_order(value: &str) -> Option<OrderBy> {
    let (field, direction) = match value.split_once(':') {
        Some((field, direction)) => (field.trim(), direction.trim()),
        None => (value.trim(), ""),
    };

    if !is_column(field) {
        tracing::debug!(order = %value, "ignoring order on unusable field");
        return None;
    }

    Some(OrderBy {
        field: field.to_string(),
        ascending: !direction.eq_ignore_ascii_case("desc"),
    })
}

fn parse_count(name: &str, value: &str) -> ProxyResult<usize> {
    value.trim().parse().map_err(|_| {
        ProxyError::MalformedRequest(format!("Invalid {}: {}", name, value))
    })
}

fn parse_page(value: &str) -> ProxyResult<usize> {
    match parse_count("page", value)? {
        0 => Err(ProxyError::MalformedRequest(
            "Invalid page: pages start at 1".to_string(),
        )),
        page => Ok(page),
    }
}

/// Type a shorthand filter value
fn parse_filter_value(value: &str) -> Value {
    match value {
        "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = value.parse::<i64>() {
                return Value::Number(n.into());
            }
            if let Ok(n) = value.parse::<f64>() {
                if let Some(num) = serde_json::Number::from_f64(n) {
                    return Value::Number(num);
                }
            }
            Value::String(value.to_string())
        }
    }
}
