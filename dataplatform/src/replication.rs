//! Replication sub-controller
//!
//! A database replicates to a set of target accounts, each optionally with
//! failover. The configured set lives in the `replication` block:
//!
//! ```hcl
//! replication {
//!   enable_to_account {
//!     account_identifier = "ORG.SECONDARY"
//!     with_failover      = true
//!   }
//!   ignore_edition_check = true
//! }
//! ```
//!
//! Moving from one set to another is a sequence of platform alterations:
//! failover is disabled before replication is, and replication is enabled
//! before failover is.

use crate::api::{AlterOptions, ObjectDetails};
use crate::error::{ProviderError, Result};
use crate::identifier::{AccountIdentifier, ObjectIdentifier};
use serde_json::Value;
use std::collections::BTreeMap;
use tfplug::validator::ConfigValidator;
use tfplug::{AttributePath, AttributeType, Diagnostics, Dynamic, DynamicValue};

pub const ATTRIBUTE: &str = "replication";
/// Key under which the platform reports replication targets
pub const DETAILS_KEY: &str = "replication_accounts";

pub fn attribute_type() -> AttributeType {
    AttributeType::object(&[
        (
            "enable_to_account",
            AttributeType::List(Box::new(AttributeType::object(&[
                ("account_identifier", AttributeType::String),
                ("with_failover", AttributeType::Bool),
            ]))),
        ),
        ("ignore_edition_check", AttributeType::Bool),
    ])
}

/// Replication targets keyed by account, valued by failover
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationConfig {
    pub targets: BTreeMap<AccountIdentifier, bool>,
    pub ignore_edition_check: bool,
}

impl ReplicationConfig {
    /// Read the `replication` block; a null block means replication is off
    pub fn from_state(block: &Dynamic) -> Result<Self> {
        let mut config = Self::default();
        if block.is_null() {
            return Ok(config);
        }

        config.ignore_edition_check = block.field("ignore_edition_check").as_bool().unwrap_or(false);

        let mut errors = Vec::new();
        for entry in block.field("enable_to_account").as_list().unwrap_or_default() {
            let Some(raw) = entry.field("account_identifier").as_str() else {
                errors.push("enable_to_account: account_identifier is required".to_string());
                continue;
            };
            let failover = entry.field("with_failover").as_bool().unwrap_or(false);
            match AccountIdentifier::parse(raw) {
                Ok(account) => {
                    if config.targets.insert(account.clone(), failover).is_some() {
                        errors.push(format!("replication target {} is listed more than once", account));
                    }
                }
                Err(e) => errors.push(e.to_string()),
            }
        }

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ProviderError::Validation(errors))
        }
    }

    /// Targets the platform reports; unparseable entries are skipped
    pub fn from_details(details: &ObjectDetails) -> Self {
        let mut config = Self::default();
        let Some(Value::Array(entries)) = details.get(DETAILS_KEY) else {
            return config;
        };
        for entry in entries {
            let Some(raw) = entry.get("account").and_then(Value::as_str) else {
                continue;
            };
            match AccountIdentifier::parse(raw) {
                Ok(account) => {
                    let failover = entry
                        .get("with_failover")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    config.targets.insert(account, failover);
                }
                Err(e) => tracing::warn!(account = raw, error = %e, "skipping replication target"),
            }
        }
        config
    }

    pub fn is_enabled(&self) -> bool {
        !self.targets.is_empty()
    }

    /// Public form; `surface` supplies account spellings already in state
    pub fn to_dynamic(&self, surface: &Dynamic) -> Dynamic {
        if !self.is_enabled() && !self.ignore_edition_check {
            return Dynamic::Null;
        }

        let known: BTreeMap<AccountIdentifier, String> = surface
            .field("enable_to_account")
            .as_list()
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| entry.field("account_identifier").as_str())
            .filter_map(|raw| AccountIdentifier::parse(raw).ok().map(|a| (a, raw.to_string())))
            .collect();

        let entries = self
            .targets
            .iter()
            .map(|(account, failover)| {
                let spelling = known
                    .get(account)
                    .cloned()
                    .unwrap_or_else(|| account.fully_qualified_name());
                Dynamic::Map(BTreeMap::from([
                    ("account_identifier".to_string(), Dynamic::String(spelling)),
                    ("with_failover".to_string(), Dynamic::Bool(*failover)),
                ]))
            })
            .collect();

        Dynamic::Map(BTreeMap::from([
            ("enable_to_account".to_string(), Dynamic::List(entries)),
            (
                "ignore_edition_check".to_string(),
                Dynamic::Bool(self.ignore_edition_check),
            ),
        ]))
    }

    /// Snapshot scalar, `None` when replication is off
    pub fn snapshot_form(&self) -> Option<Value> {
        if !self.is_enabled() {
            return None;
        }
        let rendered = self
            .targets
            .iter()
            .map(|(account, failover)| format!("{}={}", account.fully_qualified_name(), failover))
            .collect::<Vec<_>>()
            .join(",");
        Some(Value::String(rendered))
    }
}

/// Alterations that take the object from `prior` targets to `planned`
pub fn transitions(prior: &ReplicationConfig, planned: &ReplicationConfig) -> Vec<AlterOptions> {
    let mut disable_failover = Vec::new();
    let mut disable_replication = Vec::new();
    let mut enable_replication = Vec::new();
    let mut enable_failover = Vec::new();

    for (account, had_failover) in &prior.targets {
        match planned.targets.get(account) {
            None => {
                if *had_failover {
                    disable_failover.push(account.clone());
                }
                disable_replication.push(account.clone());
            }
            Some(false) if *had_failover => disable_failover.push(account.clone()),
            Some(true) if !*had_failover => enable_failover.push(account.clone()),
            Some(_) => {}
        }
    }
    for (account, failover) in &planned.targets {
        if !prior.targets.contains_key(account) {
            enable_replication.push(account.clone());
            if *failover {
                enable_failover.push(account.clone());
            }
        }
    }

    let mut steps = Vec::new();
    if !disable_failover.is_empty() {
        steps.push(AlterOptions::DisableFailover {
            accounts: disable_failover,
        });
    }
    if !disable_replication.is_empty() {
        steps.push(AlterOptions::DisableReplication {
            accounts: disable_replication,
        });
    }
    if !enable_replication.is_empty() {
        steps.push(AlterOptions::EnableReplication {
            accounts: enable_replication,
            ignore_edition_check: planned.ignore_edition_check,
        });
    }
    if !enable_failover.is_empty() {
        steps.push(AlterOptions::EnableFailover {
            accounts: enable_failover,
        });
    }
    steps
}

/// Rejects a replication block naming the same account twice
pub struct UniqueReplicationTargets;

impl ConfigValidator for UniqueReplicationTargets {
    fn description(&self) -> String {
        "replication targets must be unique".to_string()
    }

    fn validate(&self, config: &DynamicValue, diagnostics: &mut Diagnostics) {
        let block = config.attr(ATTRIBUTE);
        if block.contains_unknown() {
            return;
        }
        if let Err(ProviderError::Validation(errors)) = ReplicationConfig::from_state(block) {
            for error in errors {
                diagnostics.add_attribute_error(
                    AttributePath::new(ATTRIBUTE),
                    "Invalid replication configuration",
                    error,
                );
            }
        }
    }
}
