//! Parameter resolution
//!
//! Parameters are settings that can be set on an object or inherited from
//! an enclosing scope. The platform reports each value with the level it
//! was set at. Only values set on the object itself belong to the object's
//! public state; inherited values surface as null.

use crate::api::Parameter;
use crate::error::{ProviderError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tfplug::Dynamic;

/// Scope a parameter value was set at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLevel {
    Account,
    Database,
    Schema,
    User,
    Warehouse,
    /// Set on a schema object (service, stream, procedure, ...)
    Object,
    /// Not set anywhere; the platform default applies
    PlatformDefault,
}

impl ParameterLevel {
    /// Map the platform's level column; object type names all mean `Object`
    pub fn from_platform(level: &str) -> Self {
        match level.trim().to_ascii_uppercase().as_str() {
            "" | "DEFAULT" | "SYSTEM" => ParameterLevel::PlatformDefault,
            "ACCOUNT" | "ORGANIZATION" => ParameterLevel::Account,
            "DATABASE" => ParameterLevel::Database,
            "SCHEMA" => ParameterLevel::Schema,
            "USER" => ParameterLevel::User,
            "WAREHOUSE" => ParameterLevel::Warehouse,
            _ => ParameterLevel::Object,
        }
    }

    pub fn as_platform_str(&self) -> &'static str {
        match self {
            ParameterLevel::Account => "ACCOUNT",
            ParameterLevel::Database => "DATABASE",
            ParameterLevel::Schema => "SCHEMA",
            ParameterLevel::User => "USER",
            ParameterLevel::Warehouse => "WAREHOUSE",
            ParameterLevel::Object => "OBJECT",
            ParameterLevel::PlatformDefault => "",
        }
    }
}

impl fmt::Display for ParameterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterLevel::PlatformDefault => f.write_str("DEFAULT"),
            other => f.write_str(other.as_platform_str()),
        }
    }
}

impl Serialize for ParameterLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_platform_str())
    }
}

impl<'de> Deserialize<'de> for ParameterLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(ParameterLevel::from_platform(raw.as_deref().unwrap_or("")))
    }
}

/// How a parameter's textual platform value is typed in state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    Number,
    Bool,
    String,
}

impl ParameterType {
    fn expected(&self) -> &'static str {
        match self {
            ParameterType::Number => "a number",
            ParameterType::Bool => "a boolean",
            ParameterType::String => "a string",
        }
    }

    pub fn parse(&self, key: &str, raw: &str) -> Result<Dynamic> {
        let invalid = || ProviderError::InvalidParameter {
            key: key.to_string(),
            value: raw.to_string(),
            expected: self.expected(),
        };
        match self {
            ParameterType::Number => raw
                .trim()
                .parse::<f64>()
                .map(Dynamic::Number)
                .map_err(|_| invalid()),
            ParameterType::Bool => crate::api::parse_platform_bool(raw)
                .map(Dynamic::Bool)
                .ok_or_else(invalid),
            ParameterType::String => Ok(Dynamic::String(raw.to_string())),
        }
    }
}

/// A parameter a resource exposes as an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    /// Platform key, e.g. `DATA_RETENTION_TIME_IN_DAYS`
    pub key: &'static str,
    pub attribute: &'static str,
    pub kind: ParameterType,
}

/// Observed value of one exposed parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParameter {
    pub attribute: &'static str,
    pub level: ParameterLevel,
    /// Value as reported, whatever scope it came from
    pub observed: Dynamic,
}

impl ResolvedParameter {
    /// Value that belongs in public state: the observed value when set on
    /// the object itself, null otherwise
    pub fn effective(&self, own_level: ParameterLevel) -> Dynamic {
        if self.level == own_level {
            self.observed.clone()
        } else {
            Dynamic::Null
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub values: BTreeMap<&'static str, ResolvedParameter>,
    /// Platform keys that no spec claims
    pub ignored: Vec<String>,
}

pub struct ParameterResolver {
    own_level: ParameterLevel,
    specs: HashMap<String, ParameterSpec>,
}

impl ParameterResolver {
    pub fn new(own_level: ParameterLevel, specs: impl IntoIterator<Item = ParameterSpec>) -> Self {
        Self {
            own_level,
            specs: specs
                .into_iter()
                .map(|spec| (spec.key.to_ascii_uppercase(), spec))
                .collect(),
        }
    }

    pub fn own_level(&self) -> ParameterLevel {
        self.own_level
    }

    pub fn resolve(&self, parameters: &[Parameter]) -> Result<Resolution> {
        let mut resolution = Resolution::default();

        for parameter in parameters {
            let Some(spec) = self.specs.get(&parameter.key.to_ascii_uppercase()) else {
                resolution.ignored.push(parameter.key.clone());
                continue;
            };
            let observed = spec.kind.parse(&parameter.key, &parameter.value)?;
            resolution.values.insert(
                spec.attribute,
                ResolvedParameter {
                    attribute: spec.attribute,
                    level: parameter.level,
                    observed,
                },
            );
        }

        if !resolution.ignored.is_empty() {
            tracing::warn!(
                ignored = ?resolution.ignored,
                "ignoring parameters without a matching attribute"
            );
        }

        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(key: &str, value: &str, level: ParameterLevel) -> Parameter {
        Parameter {
            key: key.to_string(),
            value: value.to_string(),
            level,
            default: None,
        }
    }

    fn resolver() -> ParameterResolver {
        ParameterResolver::new(
            ParameterLevel::Database,
            [
                ParameterSpec {
                    key: "DATA_RETENTION_TIME_IN_DAYS",
                    attribute: "data_retention_time_in_days",
                    kind: ParameterType::Number,
                },
                ParameterSpec {
                    key: "ENABLE_CONSOLE_OUTPUT",
                    attribute: "enable_console_output",
                    kind: ParameterType::Bool,
                },
            ],
        )
    }

    #[test]
    fn platform_levels_map_to_scopes() {
        assert_eq!(ParameterLevel::from_platform(""), ParameterLevel::PlatformDefault);
        assert_eq!(ParameterLevel::from_platform("account"), ParameterLevel::Account);
        assert_eq!(ParameterLevel::from_platform("DATABASE"), ParameterLevel::Database);
        assert_eq!(ParameterLevel::from_platform("PROCEDURE"), ParameterLevel::Object);
    }

    #[test]
    fn level_deserializes_from_null_and_strings() {
        let p: Parameter = serde_json::from_str(
            r#"{"key": "LOG_LEVEL", "value": "INFO", "level": null}"#,
        )
        .unwrap();
        assert_eq!(p.level, ParameterLevel::PlatformDefault);

        let p: Parameter = serde_json::from_str(
            r#"{"key": "LOG_LEVEL", "value": "INFO", "level": "SERVICE"}"#,
        )
        .unwrap();
        assert_eq!(p.level, ParameterLevel::Object);
    }

    #[test]
    fn only_own_level_values_are_effective() {
        let resolution = resolver()
            .resolve(&[
                param("DATA_RETENTION_TIME_IN_DAYS", "25", ParameterLevel::Database),
                param("ENABLE_CONSOLE_OUTPUT", "true", ParameterLevel::Account),
            ])
            .unwrap();

        let retention = &resolution.values["data_retention_time_in_days"];
        assert_eq!(retention.effective(ParameterLevel::Database), Dynamic::Number(25.0));

        let console = &resolution.values["enable_console_output"];
        assert_eq!(console.observed, Dynamic::Bool(true));
        assert_eq!(console.effective(ParameterLevel::Database), Dynamic::Null);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let resolution = resolver()
            .resolve(&[param("QUOTED_IDENTIFIERS_IGNORE_CASE", "false", ParameterLevel::PlatformDefault)])
            .unwrap();
        assert!(resolution.values.is_empty());
        assert_eq!(resolution.ignored, vec!["QUOTED_IDENTIFIERS_IGNORE_CASE"]);
    }

    #[test]
    fn unparseable_numbers_fail() {
        let err = resolver()
            .resolve(&[param("DATA_RETENTION_TIME_IN_DAYS", "lots", ParameterLevel::Database)])
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidParameter { .. }));
    }
}
