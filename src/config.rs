//! Resolved service configuration
//!
//! Defaults, then an optional JSON file, then environment overrides.
//! A missing backend endpoint or credential is not a load error: it
//! yields an unconfigured backend handle at startup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::backend::BackendConfig;
use crate::http_server::HttpServerConfig;
use crate::rest_api::{AuthConfig, DslOptions, FormsConfig};

/// Config file looked up when none is given
pub const DEFAULT_CONFIG_PATH: &str = "./formrelay.json";

pub const ENV_BACKEND_URL: &str = "SUPABASE_URL";
pub const ENV_SERVICE_KEY: &str = "SUPABASE_SERVICE_KEY";
pub const ENV_SHARED_SECRET: &str = "PROXY_SHARED_SECRET";
pub const ENV_PORT: &str = "PORT";
pub const ENV_CORS_ORIGINS: &str = "PROXY_CORS_ORIGINS";

const MASK: &str = "********";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Invalid config JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub server: HttpServerConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub dsl: DslOptions,

    #[serde(default)]
    pub forms: FormsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProxyConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_PATH`] if it exists, then
    /// apply the process environment
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file; absent sections take their defaults
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides; blank values are ignored
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = var(ENV_BACKEND_URL) {
            self.backend.url = Some(url);
        }
        if let Some(key) = var(ENV_SERVICE_KEY) {
            self.backend.service_key = Some(key);
        }
        if let Some(secret) = var(ENV_SHARED_SECRET) {
            self.auth.shared_secret = Some(secret);
        }
        if let Some(port) = var(ENV_PORT) {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_PORT,
                value: port.clone(),
            })?;
        }
        if let Some(origins) = var(ENV_CORS_ORIGINS) {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    /// Reject settings no request could be served with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.dsl.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "dsl.default_page_size must be > 0".to_string(),
            ));
        }
        if self.auth.header.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.header must not be empty".to_string()));
        }
        if self.forms.default_table.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "forms.default_table must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved settings with credentials masked
    pub fn status(&self) -> Value {
        let mask = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|_| MASK)
        };

        json!({
            "server": {
                "address": self.server.socket_addr(),
                "cors_origins": self.server.cors_origins,
            },
            "backend": {
                "url": self.backend.url,
                "service_key": mask(&self.backend.service_key),
                "schema": self.backend.schema,
                "rest_path": self.backend.rest_path,
                "missing": self.backend.missing_fields(),
            },
            "auth": {
                "enabled": self.auth.is_enabled(),
                "header": self.auth.header,
                "shared_secret": mask(&self.auth.shared_secret),
            },
            "dsl": self.dsl,
            "forms": self.forms,
            "logging": self.logging,
        })
    }
}
