//! # Response Formatting
//!
//! The envelope every proxy response carries, success or failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::Row;

/// Normalized response body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Where a form front end should send the visitor next
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

impl Envelope {
    /// Ordered rows from a list query
    pub fn list(rows: Vec<Row>) -> Self {
        let count = rows.len();
        Self {
            success: true,
            data: Some(Value::Array(rows.into_iter().map(Value::Object).collect())),
            count: Some(count),
            ..Default::default()
        }
    }

    /// A single record
    pub fn record(row: Row) -> Self {
        Self::data(Value::Object(row))
    }

    /// Arbitrary successful payload
    pub fn data(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Default::default()
        }
    }

    /// Failure body; `success` is always false
    pub fn failure(error: String, code: String, message: Option<String>) -> Self {
        Self {
            success: false,
            error: Some(error),
            code: Some(code),
            message,
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_redirect(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }
}

/// A successful envelope paired with its status
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyReply {
    pub status: StatusCode,
    pub envelope: Envelope,
}

impl ProxyReply {
    pub fn ok(envelope: Envelope) -> Self {
        Self {
            status: StatusCode::OK,
            envelope,
        }
    }

    pub fn created(envelope: Envelope) -> Self {
        Self {
            status: StatusCode::CREATED,
            envelope,
        }
    }
}

impl IntoResponse for ProxyReply {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_list_envelope_serialization() {
        let envelope = Envelope::list(vec![row(json!({"id": 1})), row(json!({"id": 2}))]);

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 2);
        assert_eq!(json["data"][1]["id"], 2);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_record_envelope_serialization() {
        let envelope =
            Envelope::record(row(json!({"id": 1, "name": "Test"}))).with_message("created");

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["data"]["name"], "Test");
        assert_eq!(json["message"], "created");
        assert!(json.get("count").is_none());
    }
}
