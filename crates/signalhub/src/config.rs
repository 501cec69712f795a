//! Server configuration: where to listen and which route devices use.
//!
//! Settings are read through the small [`Configuration`] trait so the
//! server can be wired from a map, an environment, or a deserialized
//! [`HubConfig`] alike.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Key holding the API version that appears in the connect route.
pub const VERSION_KEY: &str = "version";

/// Key holding the socket address to listen on.
pub const BIND_ADDR_KEY: &str = "bind_addr";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required key was absent or empty.
    #[error("missing configuration key: {0}")]
    Missing(String),
}

/// A read-only source of string settings.
pub trait Configuration {
    /// Returns the value for `key`, if set.
    fn get(&self, key: &str) -> Option<String>;
}

impl Configuration for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Reads settings from `SIGNALHUB_<KEY>` environment variables.
///
/// `version` is looked up as `SIGNALHUB_VERSION`, `bind_addr` as
/// `SIGNALHUB_BIND_ADDR`.
#[derive(Debug, Clone)]
pub struct EnvConfiguration {
    prefix: String,
}

impl EnvConfiguration {
    /// Reads variables with the default `SIGNALHUB_` prefix.
    pub fn new() -> Self {
        Self::with_prefix("SIGNALHUB_")
    }

    /// Reads variables with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.to_ascii_uppercase())
    }
}

impl Default for EnvConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl Configuration for EnvConfiguration {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(self.var_name(key)).ok()
    }
}

// ---------------------------------------------------------------------------
// HubConfig
// ---------------------------------------------------------------------------

/// Settings for one signaling server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Socket address to listen on.
    pub bind_addr: String,

    /// API version; devices connect to `/api/{version}/connect`.
    pub version: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            version: "v1".to_string(),
        }
    }
}

impl HubConfig {
    /// Builds a config from a settings source, keeping defaults for
    /// anything unset.
    pub fn from_source(source: &impl Configuration) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: source
                .get(BIND_ADDR_KEY)
                .unwrap_or(defaults.bind_addr),
            version: source.get(VERSION_KEY).unwrap_or(defaults.version),
        }
    }

    /// Returns the connect route for this config.
    pub fn route(&self) -> String {
        format!("/api/{}/connect", self.version)
    }
}

impl Configuration for HubConfig {
    fn get(&self, key: &str) -> Option<String> {
        match key {
            BIND_ADDR_KEY => Some(self.bind_addr.clone()),
            VERSION_KEY => Some(self.version.clone()),
            _ => None,
        }
    }
}

/// Returns the path devices upgrade on: `/api/{version}/connect`.
///
/// # Errors
/// Returns [`ConfigError::Missing`] if `version` is unset or empty.
pub fn connect_route(config: &impl Configuration) -> Result<String, ConfigError> {
    match config.get(VERSION_KEY) {
        Some(version) if !version.is_empty() => {
            Ok(format!("/api/{version}/connect"))
        }
        _ => Err(ConfigError::Missing(VERSION_KEY.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_connect_route_uses_version() {
        let config = map(&[("version", "v2")]);
        assert_eq!(connect_route(&config).unwrap(), "/api/v2/connect");
    }

    #[test]
    fn test_connect_route_missing_version_errors() {
        let err = connect_route(&map(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref key) if key == "version"));

        let err = connect_route(&map(&[("version", "")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_hub_config_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.route(), "/api/v1/connect");
        assert_eq!(connect_route(&config).unwrap(), "/api/v1/connect");
    }

    #[test]
    fn test_hub_config_from_source_keeps_unset_defaults() {
        let config = HubConfig::from_source(&map(&[("version", "v3")]));
        assert_eq!(config.version, "v3");
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn test_hub_config_deserialize_partial() {
        let config: HubConfig =
            serde_json::from_str(r#"{"bind_addr":"0.0.0.0:9000"}"#).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.version, "v1");
    }

    #[test]
    fn test_env_configuration_reads_prefixed_variable() {
        let prefix = "SIGNALHUB_TEST_CONFIG_";
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("SIGNALHUB_TEST_CONFIG_VERSION", "v9") };

        let config = EnvConfiguration::with_prefix(prefix);

        assert_eq!(config.get("version").as_deref(), Some("v9"));
        assert_eq!(config.get("bind_addr"), None);
        assert_eq!(connect_route(&config).unwrap(), "/api/v9/connect");
    }
}
