//! Database resource, including replication to other accounts

use super::common::{identity_attributes, string_attr, ObjectModel, ObjectResource};
use crate::api::{AlterOptions, ObjectDetails, ObjectKind};
use crate::drift::{Observation, Observed};
use crate::error::Result;
use crate::identifier::{AccountObjectIdentifier, Identifier, ObjectIdentifier};
use crate::marshal::{AttributeSpec, ValueKind};
use crate::replication::{self, ReplicationConfig, UniqueReplicationTargets};
use std::sync::Arc;
use tfplug::plan_modifier::RequiresReplaceIfChanged;
use tfplug::schema::Attribute;
use tfplug::validator::{NumberRangeValidator, OneOfValidator, StringLengthValidator};
use tfplug::{AttributeBuilder, AttributeType, Dynamic, DynamicValue, Schema, SchemaBuilder};

pub const LOG_LEVELS: &[&str] = &["TRACE", "DEBUG", "INFO", "WARN", "ERROR", "FATAL", "OFF"];
pub const TRACE_LEVELS: &[&str] = &["ALWAYS", "ON_EVENT", "OFF"];
pub const SERIALIZATION_POLICIES: &[&str] = &["COMPATIBLE", "OPTIMIZED"];

const ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec::property("is_transient", ValueKind::Bool).only_on_create(),
    AttributeSpec::property("comment", ValueKind::String),
    AttributeSpec::property("drop_public_schema_on_creation", ValueKind::Bool)
        .only_on_create()
        .write_only(),
    AttributeSpec::parameter(
        "data_retention_time_in_days",
        "DATA_RETENTION_TIME_IN_DAYS",
        ValueKind::Number,
    ),
    AttributeSpec::parameter(
        "max_data_extension_time_in_days",
        "MAX_DATA_EXTENSION_TIME_IN_DAYS",
        ValueKind::Number,
    ),
    AttributeSpec::parameter("default_ddl_collation", "DEFAULT_DDL_COLLATION", ValueKind::String),
    AttributeSpec::parameter("log_level", "LOG_LEVEL", ValueKind::Enum(LOG_LEVELS)),
    AttributeSpec::parameter("trace_level", "TRACE_LEVEL", ValueKind::Enum(TRACE_LEVELS)),
    AttributeSpec::parameter(
        "suspend_task_after_num_failures",
        "SUSPEND_TASK_AFTER_NUM_FAILURES",
        ValueKind::Number,
    ),
    AttributeSpec::parameter(
        "task_auto_retry_attempts",
        "TASK_AUTO_RETRY_ATTEMPTS",
        ValueKind::Number,
    ),
    AttributeSpec::parameter(
        "storage_serialization_policy",
        "STORAGE_SERIALIZATION_POLICY",
        ValueKind::Enum(SERIALIZATION_POLICIES),
    ),
];

pub(crate) fn number_parameter(name: &str, description: &str, max: Option<f64>) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Number)
        .description(description)
        .optional()
        .validator(Arc::new(NumberRangeValidator { min: Some(0.0), max }))
        .build()
}

pub(crate) fn enum_parameter(name: &str, description: &str, domain: &[&str]) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .optional()
        .validator(Arc::new(OneOfValidator::new(domain.iter().copied()).case_insensitive()))
        .build()
}

pub(crate) fn database_name() -> Attribute {
    AttributeBuilder::new("name", AttributeType::String)
        .description("Database name; changing it renames the database")
        .required()
        .validator(Arc::new(StringLengthValidator {
            min: Some(1),
            max: Some(255),
        }))
        .build()
}

pub struct Database;

impl ObjectModel for Database {
    const TYPE_NAME: &'static str = "dataplatform_database";
    const LABEL: &'static str = "database";
    const KIND: ObjectKind = ObjectKind::Database;
    const IDENTITY: &'static [&'static str] = &["name"];
    const EXTRA_ATTRIBUTES: &'static [&'static str] = &[replication::ATTRIBUTE];

    fn schema() -> Schema {
        let [id, fully_qualified_name] = identity_attributes();
        SchemaBuilder::new()
            .version(0)
            .description("Manages a database")
            .attribute(id)
            .attribute(fully_qualified_name)
            .attribute(database_name())
            .attribute(
                AttributeBuilder::new("is_transient", AttributeType::Bool)
                    .description("Transient databases have no fail-safe period")
                    .optional()
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("comment", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("drop_public_schema_on_creation", AttributeType::Bool)
                    .description("Drop the PUBLIC schema right after the database is created")
                    .optional()
                    .build(),
            )
            .attribute(number_parameter(
                "data_retention_time_in_days",
                "Days historical data is retained for time travel",
                Some(90.0),
            ))
            .attribute(number_parameter(
                "max_data_extension_time_in_days",
                "Days data retention may be extended to keep streams from going stale",
                Some(90.0),
            ))
            .attribute(
                AttributeBuilder::new("default_ddl_collation", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(enum_parameter("log_level", "Severity of messages ingested into the event table", LOG_LEVELS))
            .attribute(enum_parameter("trace_level", "Tracing of function and procedure calls", TRACE_LEVELS))
            .attribute(number_parameter(
                "suspend_task_after_num_failures",
                "Consecutive failed runs after which a task is suspended",
                None,
            ))
            .attribute(number_parameter(
                "task_auto_retry_attempts",
                "Automatic retries of failed task graphs",
                Some(30.0),
            ))
            .attribute(enum_parameter(
                "storage_serialization_policy",
                "Storage serialization policy for managed tables",
                SERIALIZATION_POLICIES,
            ))
            .attribute(
                AttributeBuilder::new(replication::ATTRIBUTE, replication::attribute_type())
                    .description("Accounts this database replicates to")
                    .optional()
                    .build(),
            )
            .config_validator(Arc::new(UniqueReplicationTargets))
            .build()
    }

    fn attributes() -> &'static [AttributeSpec] {
        ATTRIBUTES
    }

    fn identifier(state: &DynamicValue) -> Result<Identifier> {
        Ok(AccountObjectIdentifier::new(string_attr(state, "name")?).into())
    }

    fn parse_id(id: &str) -> Result<Identifier> {
        Ok(AccountObjectIdentifier::from_resource_id(id)?.into())
    }

    fn write_identity(id: &Identifier, _details: &ObjectDetails, state: &mut DynamicValue) {
        state.set_attr("name", Dynamic::string(id.name()));
    }

    fn extra_alters(prior: &DynamicValue, plan: &DynamicValue) -> Result<Vec<AlterOptions>> {
        let prior = ReplicationConfig::from_state(prior.attr(replication::ATTRIBUTE))?;
        let planned = ReplicationConfig::from_state(plan.attr(replication::ATTRIBUTE))?;
        Ok(replication::transitions(&prior, &planned))
    }

    fn observe_extra(details: &ObjectDetails, current: &DynamicValue, observation: &mut Observation) {
        let mut observed = ReplicationConfig::from_details(details);
        let surface = current.attr(replication::ATTRIBUTE);
        // Not reported by the platform
        observed.ignore_edition_check = surface
            .field("ignore_edition_check")
            .as_bool()
            .unwrap_or(false);
        observation.insert(
            replication::ATTRIBUTE,
            Observed {
                value: observed.to_dynamic(surface),
                snapshot: observed.snapshot_form(),
                inherited: false,
            },
        );
    }
}

pub type DatabaseResource = ObjectResource<Database>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn with_replication(targets: &[(&str, bool)]) -> DynamicValue {
        let mut state = DynamicValue::object();
        state.set_attr("name", Dynamic::string("DB"));
        let entries = targets
            .iter()
            .map(|(account, failover)| {
                Dynamic::Map(BTreeMap::from([
                    ("account_identifier".to_string(), Dynamic::string(*account)),
                    ("with_failover".to_string(), Dynamic::Bool(*failover)),
                ]))
            })
            .collect();
        state.set_attr(
            replication::ATTRIBUTE,
            Dynamic::Map(BTreeMap::from([
                ("enable_to_account".to_string(), Dynamic::List(entries)),
                ("ignore_edition_check".to_string(), Dynamic::Bool(false)),
            ])),
        );
        state
    }

    #[test]
    fn replication_changes_become_alterations() {
        let prior = with_replication(&[("ORG.A", false)]);
        let plan = with_replication(&[("ORG.A", true), ("ORG.B", false)]);
        let actions: Vec<_> = Database::extra_alters(&prior, &plan)
            .unwrap()
            .iter()
            .map(AlterOptions::action)
            .collect();
        assert_eq!(actions, vec!["enable_replication", "enable_failover"]);
    }

    #[test]
    fn duplicate_targets_fail_validation() {
        let config = with_replication(&[("ORG.A", false), ("org.a", true), ("ORG.A", true)]);
        assert!(Database::schema().validate_config(&config).has_errors());
    }

    #[test]
    fn schema_rejects_unknown_log_level() {
        let mut config = DynamicValue::object();
        config.set_attr("name", Dynamic::string("DB"));
        config.set_attr("log_level", Dynamic::string("LOUD"));
        assert!(Database::schema().validate_config(&config).has_errors());
    }
}
