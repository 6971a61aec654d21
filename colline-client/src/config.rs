//! Client configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that overrides the configured API base URL.
pub const API_URL_ENV: &str = "COLLINE_API_URL";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Where the resolver lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base of the API, e.g. `http://127.0.0.1:8000/api/v1`.
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    /// Send upstream expansions to `/reverse_lineage` instead of
    /// `/lineage?reverse=true`.
    pub legacy_reverse: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/api/v1".to_string(),
            request_timeout_ms: 30_000,
            legacy_reverse: false,
        }
    }
}

impl ClientConfig {
    /// Replaces the base URL with `value` when it is set and non-blank.
    pub fn override_base_url(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if let Err(e) = url::Url::parse(&self.api_base_url) {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: e.to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert_eq!(ClientConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = ClientConfig {
            api_base_url: "  ".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "api_base_url", .. })
        ));

        config.api_base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.api_base_url = "http://localhost:8000/api/v1".to_string();
        config.request_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "request_timeout_ms", .. })
        ));
    }

    #[test]
    fn test_override_ignores_blank() {
        let mut config = ClientConfig::default();
        config.override_base_url(Some(" ".to_string()));
        assert_eq!(config.api_base_url, ClientConfig::default().api_base_url);

        config.override_base_url(Some("http://lineage:9000/api/v1".to_string()));
        assert_eq!(config.api_base_url, "http://lineage:9000/api/v1");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"legacy_reverse": true}"#).unwrap();
        assert!(config.legacy_reverse);
        assert_eq!(config.request_timeout_ms, 30_000);
    }
}
