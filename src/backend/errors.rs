//! # Backend Errors
//!
//! Outcomes reported by a data backend, classified from PostgREST and
//! Postgres error codes.

use serde::Deserialize;
use thiserror::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Backend errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// The addressed table or view does not exist
    #[error("relation \"{table}\" does not exist")]
    RelationNotFound { table: String, code: Option<String> },

    /// A single-row read matched no rows
    #[error("no rows returned for single-row read")]
    RowNotFound,

    /// The backend rejected the data (constraint, type or column error)
    #[error("{message}")]
    Validation {
        code: Option<String>,
        message: String,
    },

    /// Any other rejection reported by the backend
    #[error("backend rejected request ({status}): {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The backend could not be reached
    #[error("transport failure: {0}")]
    Transport(String),

    /// The backend answered with a payload of unexpected shape
    #[error("invalid backend payload: {0}")]
    Decode(String),
}

impl BackendError {
    /// Backend-specific error code, when one was reported
    pub fn code(&self) -> Option<&str> {
        match self {
            BackendError::RelationNotFound { code, .. }
            | BackendError::Validation { code, .. }
            | BackendError::Rejected { code, .. } => code.as_deref(),
            BackendError::RowNotFound => Some("PGRST116"),
            BackendError::Transport(_) | BackendError::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Error body returned by PostgREST
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostgrestErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Classify a failed PostgREST response.
///
/// `table` is the relation the request addressed; it names the missing
/// relation when the code says the relation does not exist.
pub fn classify(table: &str, status: u16, body: PostgrestErrorBody) -> BackendError {
    let code = body.code.clone();
    let message = body
        .message
        .clone()
        .unwrap_or_else(|| format!("backend responded with status {}", status));

    match body.code.as_deref() {
        Some("42P01") | Some("PGRST205") | Some("PGRST106") => BackendError::RelationNotFound {
            table: table.to_string(),
            code,
        },
        Some("PGRST116") => BackendError::RowNotFound,
        Some(c) if is_validation_code(c) => BackendError::Validation { code, message },
        _ => BackendError::Rejected {
            status,
            code,
            message,
        },
    }
}

fn is_validation_code(code: &str) -> bool {
    code.starts_with("22")
        || code.starts_with("23")
        || code == "42703"
        || code == "PGRST204"
        || code.starts_with("PGRST1")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: &str, message: &str) -> PostgrestErrorBody {
        PostgrestErrorBody {
            code: Some(code.to_string()),
            message: Some(message.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_relation_codes() {
        for code in ["42P01", "PGRST205", "PGRST106"] {
            let err = classify("leads", 404, body(code, "missing"));
            assert!(matches!(err, BackendError::RelationNotFound { ref table, .. } if table == "leads"));
        }
    }

    #[test]
    fn test_constraint_codes_are_validation() {
        let err = classify("leads", 409, body("23505", "duplicate key value"));
        assert_eq!(
            err,
            BackendError::Validation {
                code: Some("23505".to_string()),
                message: "duplicate key value".to_string(),
            }
        );

        let err = classify("leads", 400, body("PGRST204", "column not found"));
        assert!(matches!(err, BackendError::Validation { .. }));
    }

    #[test]
    fn test_single_row_miss() {
        let err = classify("leads", 406, body("PGRST116", "0 rows"));
        assert_eq!(err, BackendError::RowNotFound);
        assert_eq!(err.code(), Some("PGRST116"));
    }

    #[test]
    fn test_unknown_code_is_rejection() {
        let err = classify("leads", 503, PostgrestErrorBody::default());
        match err {
            BackendError::Rejected { status, code, message } => {
                assert_eq!(status, 503);
                assert!(code.is_none());
                assert!(message.contains("503"));
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }
}
