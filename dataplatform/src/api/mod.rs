//! Platform client contract
//!
//! Controllers talk to the platform exclusively through [`PlatformClient`].
//! [`RestClient`] implements it over HTTP; [`InMemoryPlatform`] implements it
//! in process for tests.

pub mod client;
pub mod common;
pub mod error;
pub mod memory;
pub mod pool;

pub use client::RestClient;
pub use error::ApiError;
pub use memory::InMemoryPlatform;

use crate::identifier::{AccountIdentifier, Identifier};
use crate::parameters::ParameterLevel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tfplug::Context;

/// Platform property name to value
pub type PropertyMap = BTreeMap<String, Value>;

/// Object types the controllers manage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Warehouse,
    Database,
    Service,
    Stream,
    Procedure,
    User,
    Account,
    OrganizationAccount,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Warehouse => "warehouse",
            ObjectKind::Database => "database",
            ObjectKind::Service => "service",
            ObjectKind::Stream => "stream",
            ObjectKind::Procedure => "procedure",
            ObjectKind::User => "user",
            ObjectKind::Account => "account",
            ObjectKind::OrganizationAccount => "organization account",
        }
    }

    /// Level the platform reports for parameters set on an object of this kind
    pub fn parameter_level(&self) -> ParameterLevel {
        match self {
            ObjectKind::Warehouse => ParameterLevel::Warehouse,
            ObjectKind::Database => ParameterLevel::Database,
            ObjectKind::User => ParameterLevel::User,
            ObjectKind::Account | ObjectKind::OrganizationAccount => ParameterLevel::Account,
            ObjectKind::Service | ObjectKind::Stream | ObjectKind::Procedure => {
                ParameterLevel::Object
            }
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Properties of a new object
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateOptions {
    pub properties: PropertyMap,
}

/// One alteration of an existing object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AlterOptions {
    Rename {
        new_name: Identifier,
    },
    Set {
        properties: PropertyMap,
        /// Block until provisioning triggered by the change completes
        wait_for_completion: bool,
    },
    Unset {
        properties: Vec<String>,
    },
    EnableReplication {
        accounts: Vec<AccountIdentifier>,
        ignore_edition_check: bool,
    },
    DisableReplication {
        accounts: Vec<AccountIdentifier>,
    },
    EnableFailover {
        accounts: Vec<AccountIdentifier>,
    },
    DisableFailover {
        accounts: Vec<AccountIdentifier>,
    },
}

impl AlterOptions {
    /// Serialized `action` tag
    pub fn action(&self) -> &'static str {
        match self {
            AlterOptions::Rename { .. } => "rename",
            AlterOptions::Set { .. } => "set",
            AlterOptions::Unset { .. } => "unset",
            AlterOptions::EnableReplication { .. } => "enable_replication",
            AlterOptions::DisableReplication { .. } => "disable_replication",
            AlterOptions::EnableFailover { .. } => "enable_failover",
            AlterOptions::DisableFailover { .. } => "disable_failover",
        }
    }
}

/// Describe output of one object; values are whatever the platform reports
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ObjectDetails {
    #[serde(flatten)]
    pub properties: PropertyMap,
}

impl ObjectDetails {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key).filter(|v| !v.is_null())
    }

    pub fn string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Numbers may arrive as JSON numbers or numeric strings
    pub fn number(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(|f| crate::marshal::whole_number(key, f).ok())),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Booleans may arrive as JSON booleans or `true`/`false`/`on`/`off` strings
    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => parse_platform_bool(s),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            _ => None,
        }
    }

    /// Lists may arrive as JSON arrays or comma separated strings
    pub fn string_list(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            Value::String(s) if s.trim().is_empty() => Some(Vec::new()),
            Value::String(s) => Some(
                s.trim_matches(|c| c == '[' || c == ']')
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect(),
            ),
            _ => None,
        }
    }
}

pub fn parse_platform_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "y" => Some(true),
        "false" | "off" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// One row of the platform's parameter listing for an object
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
    pub level: ParameterLevel,
    #[serde(default)]
    pub default: Option<String>,
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn create(
        &self,
        ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
        opts: &CreateOptions,
    ) -> Result<(), ApiError>;

    async fn alter(
        &self,
        ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
        alter: &AlterOptions,
    ) -> Result<(), ApiError>;

    /// Drop that succeeds when the object is already gone
    async fn drop_safely(&self, ctx: &Context, kind: ObjectKind, id: &Identifier)
        -> Result<(), ApiError>;

    /// Fails with [`ApiError::NotFound`] when the object does not exist
    async fn get_by_id(
        &self,
        ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
    ) -> Result<ObjectDetails, ApiError>;

    async fn show_parameters(
        &self,
        ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
    ) -> Result<Vec<Parameter>, ApiError>;

    /// Create the object, or bring an existing one to `opts`
    async fn create_or_alter(
        &self,
        ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
        opts: &CreateOptions,
    ) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(value: Value) -> ObjectDetails {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn details_accept_loose_scalars() {
        let d = details(json!({
            "auto_suspend": "600",
            "auto_resume": "true",
            "min_cluster_count": 1,
            "comment": "",
            "owner": null
        }));
        assert_eq!(d.number("auto_suspend"), Some(600));
        assert_eq!(d.bool("auto_resume"), Some(true));
        assert_eq!(d.number("min_cluster_count"), Some(1));
        assert_eq!(d.string("comment"), None);
        assert_eq!(d.string("owner"), None);
    }

    #[test]
    fn details_split_list_strings() {
        let d = details(json!({
            "external_access_integrations": "[A, \"B\"]",
            "imports": ["@stage/a.jar"]
        }));
        assert_eq!(
            d.string_list("external_access_integrations"),
            Some(vec!["A".to_string(), "\"B\"".to_string()])
        );
        assert_eq!(d.string_list("imports"), Some(vec!["@stage/a.jar".to_string()]));
    }

    #[test]
    fn alter_options_serialize_with_action_tag() {
        let alter = AlterOptions::Unset {
            properties: vec!["comment".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&alter).unwrap(),
            json!({"action": "unset", "properties": ["comment"]})
        );

        let rename = AlterOptions::Rename {
            new_name: Identifier::Account(crate::identifier::AccountObjectIdentifier::new("NEW")),
        };
        assert_eq!(
            serde_json::to_value(&rename).unwrap(),
            json!({"action": "rename", "new_name": "\"NEW\""})
        );
    }
}
