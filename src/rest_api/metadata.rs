//! Server-side metadata stamped onto writes
//!
//! These fields are authoritative: they replace any same-named field the
//! caller supplied.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::backend::Row;

use super::errors::{ProxyError, ProxyResult};
use super::request::ClientOrigin;

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const IP_ADDRESS: &str = "ip_address";
pub const USER_AGENT: &str = "user_agent";

/// ISO-8601 UTC timestamp with millisecond precision
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Require a JSON object payload
pub fn require_object(payload: Option<Value>, problem: &str) -> ProxyResult<Row> {
    match payload {
        Some(Value::Object(row)) => Ok(row),
        _ => Err(ProxyError::MalformedRequest(problem.to_string())),
    }
}

/// Creation timestamp plus the submitting client's address and user agent
///
/// A caller-supplied address or user agent never survives: it is replaced
/// by the request's own value, or removed when the request carried none.
pub fn stamp_created(record: &mut Row, origin: &ClientOrigin, now: DateTime<Utc>) {
    record.insert(CREATED_AT.to_string(), Value::String(timestamp(now)));
    stamp_optional(record, IP_ADDRESS, origin.address.as_deref());
    stamp_optional(record, USER_AGENT, origin.user_agent.as_deref());
}

fn stamp_optional(record: &mut Row, key: &str, value: Option<&str>) {
    match value {
        Some(value) => {
            record.insert(key.to_string(), Value::String(value.to_string()));
        }
        None => {
            record.remove(key);
        }
    }
}

pub fn stamp_updated(patch: &mut Row, now: DateTime<Utc>) {
    patch.insert(UPDATED_AT.to_string(), Value::String(timestamp(now)));
}
