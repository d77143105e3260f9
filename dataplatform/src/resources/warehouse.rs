//! Compute warehouse resource

use super::common::{identity_attributes, string_attr, ObjectModel, ObjectResource};
use crate::api::{ObjectDetails, ObjectKind};
use crate::error::Result;
use crate::identifier::{
    AccountObjectIdentifier, Identifier, IdentifierValidator, ObjectIdentifier,
    SuppressIdentifierQuoting,
};
use crate::marshal::{AttributeSpec, DefaultValue, ValueKind};
use std::sync::Arc;
use tfplug::plan_modifier::RequiresReplaceIfRemoved;
use tfplug::validator::{
    ConfigValidator, NumberRangeValidator, OneOfValidator, StringLengthValidator, Validator,
};
use tfplug::schema::Attribute;
use tfplug::{
    AttributeBuilder, AttributePath, AttributeType, Diagnostics, Dynamic, DynamicValue, Schema,
    SchemaBuilder,
};

pub const WAREHOUSE_TYPES: &[&str] = &["STANDARD", "SNOWPARK-OPTIMIZED"];

pub const WAREHOUSE_SIZES: &[&str] = &[
    "XSMALL", "SMALL", "MEDIUM", "LARGE", "XLARGE", "XXLARGE", "XXXLARGE", "X4LARGE", "X5LARGE",
    "X6LARGE",
];

pub const SCALING_POLICIES: &[&str] = &["STANDARD", "ECONOMY"];

const ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec::property("comment", ValueKind::String),
    AttributeSpec::property("warehouse_type", ValueKind::Enum(WAREHOUSE_TYPES))
        .unset_to(DefaultValue::Str("STANDARD")),
    AttributeSpec::property("warehouse_size", ValueKind::Enum(WAREHOUSE_SIZES)).waits(),
    AttributeSpec::property("max_cluster_count", ValueKind::Number),
    AttributeSpec::property("min_cluster_count", ValueKind::Number),
    AttributeSpec::property("scaling_policy", ValueKind::Enum(SCALING_POLICIES))
        .unset_to(DefaultValue::Str("STANDARD")),
    AttributeSpec::property("auto_suspend", ValueKind::Number).unset_to(DefaultValue::Int(600)),
    AttributeSpec::property("auto_resume", ValueKind::Bool).unset_to(DefaultValue::Bool(true)),
    AttributeSpec::property("initially_suspended", ValueKind::Bool)
        .only_on_create()
        .write_only(),
    AttributeSpec::property("resource_monitor", ValueKind::Identifier),
    AttributeSpec::property("enable_query_acceleration", ValueKind::Bool),
    AttributeSpec::property("query_acceleration_max_scale_factor", ValueKind::Number),
    AttributeSpec::parameter(
        "max_concurrency_level",
        "MAX_CONCURRENCY_LEVEL",
        ValueKind::Number,
    ),
    AttributeSpec::parameter(
        "statement_queued_timeout_in_seconds",
        "STATEMENT_QUEUED_TIMEOUT_IN_SECONDS",
        ValueKind::Number,
    ),
    AttributeSpec::parameter(
        "statement_timeout_in_seconds",
        "STATEMENT_TIMEOUT_IN_SECONDS",
        ValueKind::Number,
    ),
];

/// min_cluster_count must not exceed max_cluster_count
struct ClusterCountRange;

impl ConfigValidator for ClusterCountRange {
    fn description(&self) -> String {
        "min_cluster_count must be less than or equal to max_cluster_count".to_string()
    }

    fn validate(&self, config: &DynamicValue, diagnostics: &mut Diagnostics) {
        let (Some(min), Some(max)) = (
            config.attr("min_cluster_count").as_number(),
            config.attr("max_cluster_count").as_number(),
        ) else {
            return;
        };
        if min > max {
            diagnostics.add_attribute_error(
                AttributePath::new("min_cluster_count"),
                "Invalid cluster count",
                format!(
                    "min_cluster_count ({}) is greater than max_cluster_count ({})",
                    min, max
                ),
            );
        }
    }
}

fn cluster_count(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Number)
        .description(description)
        .optional()
        .validator(Arc::new(NumberRangeValidator {
            min: Some(1.0),
            max: Some(10.0),
        }))
        .build()
}

fn parameter(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Number)
        .description(description)
        .optional()
        .validator(Arc::new(NumberRangeValidator {
            min: Some(0.0),
            max: None,
        }))
        .build()
}

pub struct Warehouse;

impl ObjectModel for Warehouse {
    const TYPE_NAME: &'static str = "dataplatform_warehouse";
    const LABEL: &'static str = "warehouse";
    const KIND: ObjectKind = ObjectKind::Warehouse;
    const IDENTITY: &'static [&'static str] = &["name"];

    fn schema() -> Schema {
        let [id, fully_qualified_name] = identity_attributes();
        SchemaBuilder::new()
            .version(0)
            .description("Manages a compute warehouse")
            .attribute(id)
            .attribute(fully_qualified_name)
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Warehouse name; changing it renames the warehouse")
                    .required()
                    .validator(Arc::new(StringLengthValidator {
                        min: Some(1),
                        max: Some(255),
                    }))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("comment", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("warehouse_type", AttributeType::String)
                    .description("STANDARD or SNOWPARK-OPTIMIZED")
                    .optional()
                    .validator(Arc::new(OneOfValidator::new(WAREHOUSE_TYPES.iter().copied()).case_insensitive()))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("warehouse_size", AttributeType::String)
                    .description("Warehouse size, e.g. XSMALL or X-Small; removing it forces a new warehouse")
                    .optional()
                    .validator(Arc::new(WarehouseSizeValidator))
                    .plan_modifier(Arc::new(RequiresReplaceIfRemoved))
                    .build(),
            )
            .attribute(cluster_count(
                "max_cluster_count",
                "Maximum number of clusters for a multi-cluster warehouse",
            ))
            .attribute(cluster_count(
                "min_cluster_count",
                "Minimum number of clusters for a multi-cluster warehouse",
            ))
            .attribute(
                AttributeBuilder::new("scaling_policy", AttributeType::String)
                    .optional()
                    .validator(Arc::new(OneOfValidator::new(SCALING_POLICIES.iter().copied()).case_insensitive()))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("auto_suspend", AttributeType::Number)
                    .description("Seconds of inactivity after which the warehouse suspends")
                    .optional()
                    .validator(Arc::new(NumberRangeValidator {
                        min: Some(0.0),
                        max: None,
                    }))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("auto_resume", AttributeType::Bool)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("initially_suspended", AttributeType::Bool)
                    .description("Create the warehouse suspended; only used on create")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_monitor", AttributeType::String)
                    .optional()
                    .validator(Arc::new(IdentifierValidator::exact(1)))
                    .plan_modifier(Arc::new(SuppressIdentifierQuoting))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable_query_acceleration", AttributeType::Bool)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("query_acceleration_max_scale_factor", AttributeType::Number)
                    .optional()
                    .validator(Arc::new(NumberRangeValidator {
                        min: Some(0.0),
                        max: Some(100.0),
                    }))
                    .build(),
            )
            .attribute(parameter(
                "max_concurrency_level",
                "Concurrency level for SQL statements executed by the warehouse",
            ))
            .attribute(parameter(
                "statement_queued_timeout_in_seconds",
                "Seconds a statement may stay queued before it is cancelled",
            ))
            .attribute(parameter(
                "statement_timeout_in_seconds",
                "Seconds after which a running statement is cancelled",
            ))
            .config_validator(Arc::new(ClusterCountRange))
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
}

/// Accepts any spelling that normalizes into the size domain
struct WarehouseSizeValidator;

impl Validator for WarehouseSizeValidator {
    fn description(&self) -> String {
        format!("one of {}", WAREHOUSE_SIZES.join(", "))
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Diagnostics) {
        let Some(size) = value.as_str() else { return };
        if crate::marshal::normalize_enum(WAREHOUSE_SIZES, size).is_none() {
            diagnostics.add_attribute_error(
                path.clone(),
                "Invalid warehouse size",
                format!("{:?} is not {}", size, self.description()),
            );
        }
    }
}

pub type WarehouseResource = ObjectResource<Warehouse>;
