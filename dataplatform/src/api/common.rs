//! Common types and utilities for the platform REST API

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    pub data: Option<HashMap<String, Vec<String>>>,
}

#[derive(Debug, thiserror::Error)]
#[error("API error details: code={code:?}, errors={errors:?}, field_errors={field_errors:?}")]
pub struct ApiErrorDetails {
    pub code: Option<String>,
    pub errors: Option<Vec<String>>,
    pub field_errors: Option<HashMap<String, Vec<String>>>,
}

/// Error codes the platform uses for objects that are missing or not visible
pub const NOT_FOUND_CODES: &[&str] = &["002003", "OBJECT_NOT_FOUND"];

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!(
                "?{}",
                self.params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_params_skip_missing_values() {
        let query = ApiQueryParams::new()
            .add("ifExists", true)
            .add_optional("like", Some("WH 1"))
            .add_optional("limit", None::<u32>)
            .to_query_string();
        assert_eq!(query, "?ifExists=true&like=WH%201");
    }

    #[test]
    fn empty_query_params_render_nothing() {
        assert_eq!(ApiQueryParams::new().to_query_string(), "");
    }

    #[test]
    fn error_response_tolerates_missing_fields() {
        let resp: ApiErrorResponse =
            serde_json::from_str(r#"{"code": "002003", "message": "does not exist"}"#).unwrap();
        assert_eq!(resp.code.as_deref(), Some("002003"));
        assert!(resp.errors.is_none());
    }
}
