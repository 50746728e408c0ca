//! Proxy-surface configuration: shared-secret gate and form defaults

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::errors::{ProxyError, ProxyResult};

/// Optional shared-secret authorization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// When set, data requests must present this value
    #[serde(default)]
    pub shared_secret: Option<String>,

    /// Header carrying the secret
    #[serde(default = "default_secret_header")]
    pub header: String,
}

fn default_secret_header() -> String {
    "x-proxy-secret".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            shared_secret: None,
            header: default_secret_header(),
        }
    }
}

impl AuthConfig {
    pub fn is_enabled(&self) -> bool {
        self.secret().is_some()
    }

    fn secret(&self) -> Option<&str> {
        self.shared_secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Check the request headers against the configured secret
    pub fn authorize(&self, headers: &HeaderMap) -> ProxyResult<()> {
        let Some(secret) = self.secret() else {
            return Ok(());
        };

        let provided = headers
            .get(self.header.as_str())
            .map(|v| v.as_bytes())
            .unwrap_or_default();

        if bool::from(provided.ct_eq(secret.as_bytes())) {
            Ok(())
        } else {
            Err(ProxyError::Unauthorized)
        }
    }
}

/// Form submission defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormsConfig {
    /// Table used when the request names none
    #[serde(default = "default_form_table")]
    pub default_table: String,
}

fn default_form_table() -> String {
    "form_submissions".to_string()
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            default_table: default_form_table(),
        }
    }
}
