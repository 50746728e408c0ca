//! Backend connection configuration

use serde::{Deserialize, Serialize};

/// Connection settings for the PostgREST-compatible backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project endpoint, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub url: Option<String>,

    /// Service credential sent as `apikey` and bearer token
    #[serde(default)]
    pub service_key: Option<String>,

    /// Non-default schema exposed through PostgREST profiles
    #[serde(default)]
    pub schema: Option<String>,

    /// Path under `url` where the REST interface lives
    #[serde(default = "default_rest_path")]
    pub rest_path: String,
}

fn default_rest_path() -> String {
    "/rest/v1".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_key: None,
            schema: None,
            rest_path: default_rest_path(),
        }
    }
}

impl BackendConfig {
    /// Names of required settings that are absent or blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());

        let mut missing = Vec::new();
        if blank(&self.url) {
            missing.push("backend.url");
        }
        if blank(&self.service_key) {
            missing.push("backend.service_key");
        }
        missing
    }
}
