//! # REST API Errors
//!
//! Error types for the proxy surface and their fixed HTTP translation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::backend::BackendError;

use super::response::Envelope;

/// Result type for REST operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Hint attached to a missing-table response
pub const TABLE_NOT_FOUND_HINT: &str =
    "Check the table name or create the table in the backend before addressing it";

/// REST API errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProxyError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Bad path, query or body shape; never reaches the backend
    #[error("{0}")]
    MalformedRequest(String),

    /// The backend rejected a write
    #[error("{message}")]
    Validation {
        message: String,
        code: Option<String>,
    },

    /// The addressed table does not exist in the backend
    #[error("Table \"{table}\" not found")]
    TableNotFound {
        table: String,
        code: Option<String>,
    },

    /// No row carries the addressed id
    #[error("Record with ID \"{id}\" not found in table \"{table}\"")]
    RecordNotFound { table: String, id: String },

    /// No route serves the path
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// Shared secret missing or wrong
    #[error("Unauthorized")]
    Unauthorized,

    /// Method not supported by the addressed route
    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    // ==================
    // Server Errors (5xx)
    // ==================
    /// Backend adapter was never configured
    #[error("Backend is not configured")]
    ConfigurationFault(String),

    /// Unexpected failure talking to the backend
    #[error("Backend request failed")]
    Transport {
        message: String,
        code: Option<String>,
    },
}

impl ProxyError {
    /// Translate a backend outcome for the given table and optional id
    pub fn from_backend(err: BackendError, table: &str, id: Option<&str>) -> Self {
        match err {
            BackendError::RelationNotFound { table, code } => {
                ProxyError::TableNotFound { table, code }
            }
            BackendError::RowNotFound => match id {
                Some(id) => ProxyError::RecordNotFound {
                    table: table.to_string(),
                    id: id.to_string(),
                },
                None => ProxyError::Transport {
                    message: "backend reported a missing row for a list query".to_string(),
                    code: Some("PGRST116".to_string()),
                },
            },
            BackendError::Validation { code, message } => {
                ProxyError::Validation { message, code }
            }
            BackendError::Rejected { code, message, .. } => {
                ProxyError::Transport { message, code }
            }
            BackendError::Transport(message) | BackendError::Decode(message) => {
                ProxyError::Transport {
                    message,
                    code: None,
                }
            }
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            ProxyError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 401
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            ProxyError::TableNotFound { .. } => StatusCode::NOT_FOUND,
            ProxyError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
            ProxyError::RouteNotFound(_) => StatusCode::NOT_FOUND,

            // 405
            ProxyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,

            // 500 Internal Server Error
            ProxyError::ConfigurationFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Transport { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code; backend codes pass through when known
    pub fn code(&self) -> String {
        let fixed = match self {
            ProxyError::MalformedRequest(_) => "MALFORMED_REQUEST",
            ProxyError::Validation { code: Some(c), .. }
            | ProxyError::TableNotFound { code: Some(c), .. }
            | ProxyError::Transport { code: Some(c), .. } => return c.clone(),
            ProxyError::Validation { code: None, .. } => "VALIDATION_ERROR",
            ProxyError::TableNotFound { code: None, .. } => "TABLE_NOT_FOUND",
            ProxyError::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            ProxyError::RouteNotFound(_) => "ROUTE_NOT_FOUND",
            ProxyError::Unauthorized => "UNAUTHORIZED",
            ProxyError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            ProxyError::ConfigurationFault(_) => "CONFIGURATION_FAULT",
            ProxyError::Transport { code: None, .. } => "TRANSPORT_FAILURE",
        };
        fixed.to_string()
    }

    /// Extra human detail for the envelope `message` field
    pub fn detail(&self) -> Option<String> {
        match self {
            ProxyError::TableNotFound { .. } => Some(TABLE_NOT_FOUND_HINT.to_string()),
            ProxyError::ConfigurationFault(missing) => Some(missing.clone()),
            ProxyError::Transport { message, .. } => Some(message.clone()),
            _ => None,
        }
    }

    /// Envelope body for this error
    pub fn envelope(&self) -> Envelope {
        Envelope::failure(self.to_string(), self.code(), self.detail())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, detail = ?self.detail(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(self.envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ProxyError::MalformedRequest("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ProxyError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ProxyError::MethodNotAllowed("PATCH".to_string()).status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ProxyError::ConfigurationFault("backend.url".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_backend_translation_table() {
        let missing_table = ProxyError::from_backend(
            BackendError::RelationNotFound {
                table: "ghosts".to_string(),
                code: Some("42P01".to_string()),
            },
            "ghosts",
            None,
        );
        assert_eq!(missing_table.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(missing_table.to_string(), "Table \"ghosts\" not found");
        assert_eq!(missing_table.code(), "42P01");

        let missing_row = ProxyError::from_backend(BackendError::RowNotFound, "leads", Some("999"));
        assert_eq!(missing_row.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            missing_row.to_string(),
            "Record with ID \"999\" not found in table \"leads\""
        );

        let rejected = ProxyError::from_backend(
            BackendError::Validation {
                code: Some("23502".to_string()),
                message: "null value in column \"email\"".to_string(),
            },
            "leads",
            None,
        );
        assert_eq!(rejected.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(rejected.to_string(), "null value in column \"email\"");

        let transport =
            ProxyError::from_backend(BackendError::Transport("refused".to_string()), "leads", None);
        assert_eq!(transport.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transport.detail().as_deref(), Some("refused"));
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = ProxyError::TableNotFound {
            table: "t".to_string(),
            code: None,
        }
        .envelope();
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Table \"t\" not found");
        assert_eq!(json["code"], "TABLE_NOT_FOUND");
        assert_eq!(json["message"], TABLE_NOT_FOUND_HINT);
        assert!(json.get("data").is_none());
    }
}
