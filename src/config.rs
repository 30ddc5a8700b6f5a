//! Client configuration
//!
//! Loaded from JSON or from `BATCHFLOW_*` environment variables, then
//! normalised so URL joining never produces doubled or missing slashes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::url::{normalize_url, path_segments};
use crate::{BatchFlowError, Result};

/// Prefix mounted under `api_url` when none is configured
pub const DEFAULT_API_PREFIX: &str = "/api";

pub const ENV_API_URL: &str = "BATCHFLOW_API_URL";
pub const ENV_API_PREFIX: &str = "BATCHFLOW_API_PREFIX";
pub const ENV_BATCH_SIZE: &str = "BATCHFLOW_BATCH_SIZE";
pub const ENV_CONCURRENT: &str = "BATCHFLOW_CONCURRENT";

/// Default batch settings applied to every endpoint unless overridden
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDefaults {
    /// Items per sequential chunk
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Requests in flight at once within a chunk
    #[serde(default)]
    pub concurrent: Option<usize>,
}

/// Connection settings for an API client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api_url: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
    #[serde(default)]
    pub batch: BatchDefaults,
}

fn default_api_prefix() -> String {
    DEFAULT_API_PREFIX.to_string()
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_prefix: default_api_prefix(),
            default_headers: HashMap::new(),
            batch: BatchDefaults::default(),
        }
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_batch_defaults(mut self, batch_size: Option<usize>, concurrent: Option<usize>) -> Self {
        self.batch = BatchDefaults { batch_size, concurrent };
        self
    }

    /// Parse and normalise a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.normalized()
    }

    /// Build from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Build from an explicit set of variables
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::new(String::new());

        for (key, value) in vars {
            let value = value.into();
            match key.as_ref() {
                ENV_API_URL => config.api_url = value,
                ENV_API_PREFIX => config.api_prefix = value,
                ENV_BATCH_SIZE => config.batch.batch_size = Some(parse_count(ENV_BATCH_SIZE, &value)?),
                ENV_CONCURRENT => config.batch.concurrent = Some(parse_count(ENV_CONCURRENT, &value)?),
                _ => {}
            }
        }

        config.normalized()
    }

    /// Strip trailing slashes from `api_url` and canonicalise `api_prefix`.
    ///
    /// An empty `api_url` is rejected.
    pub fn normalized(mut self) -> Result<Self> {
        self.api_url = self.api_url.trim().trim_end_matches('/').to_string();
        if self.api_url.is_empty() {
            warn!("Missing required configuration: api_url");
            return Err(BatchFlowError::Config("api_url is required".to_string()));
        }

        self.api_prefix = normalize_prefix(&self.api_prefix);
        Ok(self)
    }

    /// `api_url` joined with `api_prefix`
    pub fn base_url(&self) -> String {
        normalize_url([self.api_url.as_str(), self.api_prefix.as_str()])
    }
}

/// `"/" + prefix` with outer slashes trimmed and inner runs collapsed;
/// blank input falls back to [`DEFAULT_API_PREFIX`]
pub fn normalize_prefix(prefix: &str) -> String {
    let segments = path_segments(prefix.trim());
    if segments.is_empty() {
        return default_api_prefix();
    }
    format!("/{}", segments.join("/"))
}

fn parse_count(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| BatchFlowError::Config(format!("{} must be a non-negative integer, got {:?}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prefix_normalisation() {
        assert_eq!(normalize_prefix("tenant//api/"), "/tenant/api");
        assert_eq!(normalize_prefix("/api"), "/api");
        assert_eq!(normalize_prefix("   "), DEFAULT_API_PREFIX);
        assert_eq!(normalize_prefix("///"), DEFAULT_API_PREFIX);
    }

    #[test]
    fn test_from_json() {
        let config = ClientConfig::from_json_str(
            r#"{
                "api_url": "https://example.com///",
                "api_prefix": "v1//admin/",
                "default_headers": {"x-tenant": "acme"},
                "batch": {"batch_size": 50, "concurrent": 5}
            }"#,
        )
        .expect("valid config");

        assert_eq!(config.api_url, "https://example.com");
        assert_eq!(config.api_prefix, "/v1/admin");
        assert_eq!(config.base_url(), "https://example.com/v1/admin");
        assert_eq!(config.default_headers.get("x-tenant").map(String::as_str), Some("acme"));
        assert_eq!(config.batch, BatchDefaults { batch_size: Some(50), concurrent: Some(5) });
    }

    #[test]
    fn test_json_defaults() {
        let config = ClientConfig::from_json_str(r#"{"api_url": "http://localhost:3000"}"#).expect("valid config");
        assert_eq!(config.api_prefix, DEFAULT_API_PREFIX);
        assert!(config.default_headers.is_empty());
        assert_eq!(config.batch, BatchDefaults::default());
    }

    #[test]
    fn test_missing_api_url_is_rejected() {
        let err = ClientConfig::new("  /  ").normalized().unwrap_err();
        assert!(matches!(err, BatchFlowError::Config(_)));

        let err = ClientConfig::from_json_str(r#"{"api_prefix": "x"}"#).unwrap_err();
        assert!(matches!(err, BatchFlowError::Serialization(_)));
    }

    #[test]
    fn test_from_vars() {
        let config = ClientConfig::from_vars([
            (ENV_API_URL, "https://api.example.com/"),
            (ENV_API_PREFIX, ""),
            (ENV_BATCH_SIZE, "20"),
            (ENV_CONCURRENT, " 4 "),
            ("UNRELATED", "ignored"),
        ])
        .expect("valid vars");

        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.api_prefix, DEFAULT_API_PREFIX);
        assert_eq!(config.batch.batch_size, Some(20));
        assert_eq!(config.batch.concurrent, Some(4));
    }

    #[test]
    fn test_from_vars_rejects_bad_count() {
        let err = ClientConfig::from_vars([(ENV_API_URL, "https://a.b"), (ENV_BATCH_SIZE, "many")]).unwrap_err();
        assert!(err.to_string().contains(ENV_BATCH_SIZE));
    }
}
