//! Provider configuration
//!
//! Values come from the provider configuration block and fall back to
//! `DATAPLATFORM_*` environment variables.

use crate::error::{ProviderError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tfplug::tristate::FromDynamic;
use tfplug::{DynamicValue, TriState};

pub const ENDPOINT_ENV: &str = "DATAPLATFORM_ENDPOINT";
pub const TOKEN_ENV: &str = "DATAPLATFORM_TOKEN";
pub const INSECURE_ENV: &str = "DATAPLATFORM_INSECURE";

pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub token: String,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub suppress_snapshot_diffs: bool,
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// A known value of the configuration block; null, unknown and mistyped
/// values count as absent, with a problem recorded for the latter two
fn config_value<T: FromDynamic>(config: &DynamicValue, name: &str, problems: &mut Vec<String>) -> Option<T> {
    match config.tri::<T>(name) {
        Ok(TriState::Set(value)) => Some(value),
        Ok(TriState::Null) => None,
        Ok(TriState::Unknown) => {
            problems.push(format!("{} must be known when the provider is configured", name));
            None
        }
        Err(e) => {
            problems.push(format!("{}: {}", name, e));
            None
        }
    }
}

impl ProviderConfig {
    /// Read the configuration block, falling back to the environment
    pub fn from_config(config: &DynamicValue) -> Result<Self> {
        let mut problems = Vec::new();

        let endpoint = config_value::<String>(config, "endpoint", &mut problems)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env_string(ENDPOINT_ENV));
        if endpoint.is_none() {
            problems.push(format!(
                "endpoint is required (set in provider config or {} env var)",
                ENDPOINT_ENV
            ));
        }
        let token = config_value::<String>(config, "token", &mut problems)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env_string(TOKEN_ENV));
        if token.is_none() {
            problems.push(format!(
                "token is required (set in provider config or {} env var)",
                TOKEN_ENV
            ));
        }

        let insecure = config_value::<bool>(config, "insecure", &mut problems)
            .or_else(|| env_string(INSECURE_ENV).and_then(|v| crate::api::parse_platform_bool(&v)))
            .unwrap_or(false);

        let request_timeout_seconds =
            match config_value::<i64>(config, "request_timeout_seconds", &mut problems) {
                Some(n) if n >= 1 => n as u64,
                Some(n) => {
                    problems.push(format!("request_timeout_seconds must be positive, got {}", n));
                    DEFAULT_REQUEST_TIMEOUT_SECONDS
                }
                None => DEFAULT_REQUEST_TIMEOUT_SECONDS,
            };

        let suppress_snapshot_diffs =
            config_value::<bool>(config, "suppress_snapshot_diffs", &mut problems).unwrap_or(false);

        let (Some(endpoint), Some(token)) = (endpoint, token) else {
            return Err(ProviderError::Configuration(problems.join("; ")));
        };
        if !problems.is_empty() {
            return Err(ProviderError::Configuration(problems.join("; ")));
        }

        let parsed = url::Url::parse(&endpoint)
            .map_err(|e| ProviderError::Configuration(format!("endpoint {:?}: {}", endpoint, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProviderError::Configuration(format!(
                "endpoint {:?} must use http or https",
                endpoint
            )));
        }

        Ok(Self {
            endpoint,
            token,
            insecure,
            request_timeout_seconds,
            suppress_snapshot_diffs,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::Dynamic;

    fn clear_env() {
        for name in [ENDPOINT_ENV, TOKEN_ENV, INSECURE_ENV] {
            std::env::remove_var(name);
        }
    }

    fn block(pairs: &[(&str, Dynamic)]) -> DynamicValue {
        let mut config = DynamicValue::object();
        for (k, v) in pairs {
            config.set_attr(k, v.clone());
        }
        config
    }

    #[test]
    #[serial]
    fn reads_configuration_block() {
        clear_env();
        let config = ProviderConfig::from_config(&block(&[
            ("endpoint", Dynamic::string("https://platform.example.com")),
            ("token", Dynamic::string("secret")),
            ("request_timeout_seconds", Dynamic::Number(90.0)),
            ("suppress_snapshot_diffs", Dynamic::Bool(true)),
        ]))
        .unwrap();
        assert_eq!(config.endpoint, "https://platform.example.com");
        assert!(!config.insecure);
        assert_eq!(config.request_timeout(), Duration::from_secs(90));
        assert!(config.suppress_snapshot_diffs);
    }

    #[test]
    #[serial]
    fn falls_back_to_environment() {
        clear_env();
        std::env::set_var(ENDPOINT_ENV, "https://env.example.com");
        std::env::set_var(TOKEN_ENV, "env-token");
        std::env::set_var(INSECURE_ENV, "true");

        let config = ProviderConfig::from_config(&DynamicValue::object()).unwrap();
        assert_eq!(config.endpoint, "https://env.example.com");
        assert_eq!(config.token, "env-token");
        assert!(config.insecure);
        assert_eq!(config.request_timeout_seconds, DEFAULT_REQUEST_TIMEOUT_SECONDS);
        assert!(!config.suppress_snapshot_diffs);
        clear_env();
    }

    #[test]
    #[serial]
    fn block_takes_precedence_over_environment() {
        clear_env();
        std::env::set_var(ENDPOINT_ENV, "https://env.example.com");
        std::env::set_var(TOKEN_ENV, "env-token");

        let config = ProviderConfig::from_config(&block(&[(
            "endpoint",
            Dynamic::string("https://block.example.com"),
        )]))
        .unwrap();
        assert_eq!(config.endpoint, "https://block.example.com");
        assert_eq!(config.token, "env-token");
        clear_env();
    }

    #[test]
    #[serial]
    fn reports_every_missing_value() {
        clear_env();
        match ProviderConfig::from_config(&DynamicValue::object()) {
            Err(ProviderError::Configuration(message)) => {
                assert!(message.contains("endpoint"));
                assert!(message.contains("token"));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn rejects_invalid_endpoint() {
        clear_env();
        let result = ProviderConfig::from_config(&block(&[
            ("endpoint", Dynamic::string("not a url")),
            ("token", Dynamic::string("secret")),
        ]));
        assert!(matches!(result, Err(ProviderError::Configuration(_))));

        let result = ProviderConfig::from_config(&block(&[
            ("endpoint", Dynamic::string("ftp://platform.example.com")),
            ("token", Dynamic::string("secret")),
        ]));
        assert!(matches!(result, Err(ProviderError::Configuration(_))));
    }

    #[test]
    #[serial]
    fn rejects_unknown_and_fractional_values() {
        clear_env();
        let result = ProviderConfig::from_config(&block(&[
            ("endpoint", Dynamic::Unknown),
            ("token", Dynamic::string("secret")),
            ("request_timeout_seconds", Dynamic::Number(1.5)),
        ]));
        match result {
            Err(ProviderError::Configuration(message)) => {
                assert!(message.contains("endpoint must be known"));
                assert!(message.contains("request_timeout_seconds"));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}
