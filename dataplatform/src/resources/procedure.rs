//! Stored procedure
//!
//! Procedures are overloadable, so the argument data types are part of the
//! identifier. Argument types are compared in the canonical form the platform
//! reports (`NUMBER` for `INT`, no precision), and changing them replaces the
//! procedure.

use super::common::{
    identity_attributes, schema_object_attributes, schema_object_id,
    write_schema_object_identity, ObjectModel, ObjectResource,
};
use super::database::{enum_parameter, LOG_LEVELS, TRACE_LEVELS};
use crate::api::{CreateOptions, ObjectDetails, ObjectKind};
use crate::error::{ProviderError, Result};
use crate::identifier::{normalize_data_type, Identifier, SchemaObjectIdentifierWithArguments};
use crate::marshal::{AttributeSpec, CreateBuilder, DefaultValue, ValueKind};
use serde_json::{json, Value};
use std::sync::Arc;
use tfplug::plan_modifier::{
    PlanModifier, PlanModifyRequest, PlanModifyResponse, RequiresReplaceIf,
    RequiresReplaceIfChanged,
};
use tfplug::validator::{ListLengthValidator, OneOfValidator, StringLengthValidator};
use tfplug::{
    AttributeBuilder, AttributeType, Diagnostics, Dynamic, DynamicValue, Schema, SchemaBuilder,
};

pub const LANGUAGES: &[&str] = &["SQL", "JAVA", "JAVASCRIPT", "PYTHON", "SCALA"];
pub const EXECUTE_AS: &[&str] = &["CALLER", "OWNER", "RESTRICTED CALLER"];

const ARGUMENTS: &str = "arguments";
const ARG_NAME: &str = "arg_name";
const ARG_DATA_TYPE: &str = "arg_data_type";

const ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec::property("language", ValueKind::Enum(LANGUAGES)).only_on_create(),
    AttributeSpec::property("return_type", ValueKind::String)
        .only_on_create()
        .write_only(),
    AttributeSpec::property("procedure_definition", ValueKind::String)
        .only_on_create()
        .write_only(),
    AttributeSpec::property("imports", ValueKind::StringSet).only_on_create(),
    AttributeSpec::property("execute_as", ValueKind::Enum(EXECUTE_AS))
        .unset_to(DefaultValue::Str("OWNER")),
    AttributeSpec::property("is_secure", ValueKind::Bool),
    AttributeSpec::property("comment", ValueKind::String),
    AttributeSpec::parameter("log_level", "LOG_LEVEL", ValueKind::Enum(LOG_LEVELS)),
    AttributeSpec::parameter("trace_level", "TRACE_LEVEL", ValueKind::Enum(TRACE_LEVELS)),
];

/// One declared argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub data_type: String,
}

impl Argument {
    fn from_dynamic(value: &Dynamic) -> Option<Self> {
        Some(Self {
            name: value.field(ARG_NAME).as_str()?.to_string(),
            data_type: value.field(ARG_DATA_TYPE).as_str()?.to_string(),
        })
    }

    fn to_dynamic(&self) -> Dynamic {
        Dynamic::Map(
            [
                (ARG_NAME.to_string(), Dynamic::string(&self.name)),
                (ARG_DATA_TYPE.to_string(), Dynamic::string(&self.data_type)),
            ]
            .into_iter()
            .collect(),
        )
    }

    /// Same argument up to name case and data type synonyms
    fn equivalent(&self, other: &Argument) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && normalize_data_type(&self.data_type) == normalize_data_type(&other.data_type)
    }
}

/// Arguments of a state or plan; `None` when any entry is incomplete
pub fn arguments(value: &Dynamic) -> Option<Vec<Argument>> {
    match value {
        Dynamic::Null => Some(Vec::new()),
        Dynamic::List(items) => items.iter().map(Argument::from_dynamic).collect(),
        _ => None,
    }
}

/// Keeps the prior argument list when the planned one only respells it
struct SuppressEquivalentArguments;

impl PlanModifier for SuppressEquivalentArguments {
    fn description(&self) -> String {
        "data type synonyms and name case in arguments are ignored".to_string()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let equivalent = match (arguments(&request.state), arguments(&request.plan)) {
            (Some(prior), Some(planned)) => {
                !request.state.is_null()
                    && prior.len() == planned.len()
                    && prior.iter().zip(&planned).all(|(a, b)| a.equivalent(b))
            }
            _ => false,
        };
        PlanModifyResponse {
            plan_value: if equivalent {
                request.state.clone()
            } else {
                request.plan.clone()
            },
            requires_replace: false,
            diagnostics: Diagnostics::new(),
        }
    }
}

fn argument_type() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::object(&[
        (ARG_NAME, AttributeType::String),
        (ARG_DATA_TYPE, AttributeType::String),
    ])))
}

pub struct Procedure;

impl ObjectModel for Procedure {
    const TYPE_NAME: &'static str = "dataplatform_procedure";
    const LABEL: &'static str = "procedure";
    const KIND: ObjectKind = ObjectKind::Procedure;
    const IDENTITY: &'static [&'static str] = &["database", "schema", "name"];

    fn schema() -> Schema {
        let [id, fully_qualified_name] = identity_attributes();
        let [database, schema, name] = schema_object_attributes("procedure");
        SchemaBuilder::new()
            .version(0)
            .description("Manages a stored procedure")
            .attribute(id)
            .attribute(fully_qualified_name)
            .attribute(database)
            .attribute(schema)
            .attribute(name)
            .attribute(
                AttributeBuilder::new(ARGUMENTS, argument_type())
                    .description("Arguments of the procedure; part of its signature")
                    .optional()
                    .plan_modifier(Arc::new(SuppressEquivalentArguments))
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("language", AttributeType::String)
                    .optional()
                    .validator(Arc::new(
                        OneOfValidator::new(LANGUAGES.iter().copied()).case_insensitive(),
                    ))
                    .plan_modifier(Arc::new(RequiresReplaceIf::new(
                        language_changed,
                        "changing the language forces a new procedure",
                    )))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("return_type", AttributeType::String)
                    .required()
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("procedure_definition", AttributeType::String)
                    .description("Body of the procedure")
                    .required()
                    .validator(Arc::new(StringLengthValidator {
                        min: Some(1),
                        max: None,
                    }))
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("imports", AttributeType::Set(Box::new(AttributeType::String)))
                    .description("Stage files the procedure imports")
                    .optional()
                    .validator(Arc::new(ListLengthValidator {
                        min: Some(1),
                        max: None,
                    }))
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("execute_as", AttributeType::String)
                    .description("CALLER, OWNER or RESTRICTED CALLER")
                    .optional()
                    .validator(Arc::new(
                        OneOfValidator::new(EXECUTE_AS.iter().copied()).case_insensitive(),
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("is_secure", AttributeType::Bool)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("comment", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(enum_parameter("log_level", "Severity of messages ingested into the event table", LOG_LEVELS))
            .attribute(enum_parameter("trace_level", "Tracing of procedure calls", TRACE_LEVELS))
            .build()
    }

    fn attributes() -> &'static [AttributeSpec] {
        ATTRIBUTES
    }

    fn identifier(state: &DynamicValue) -> Result<Identifier> {
        let declared = arguments(state.attr(ARGUMENTS)).ok_or_else(|| {
            ProviderError::Validation(vec![format!("{}: value is not known yet", ARGUMENTS)])
        })?;
        let types = declared
            .iter()
            .map(|a| normalize_data_type(&a.data_type))
            .collect();
        Ok(schema_object_id(state)?.with_arguments(types).into())
    }

    fn parse_id(id: &str) -> Result<Identifier> {
        let parsed = SchemaObjectIdentifierWithArguments::from_resource_id(id)?;
        let types = parsed
            .argument_types()
            .iter()
            .map(|t| normalize_data_type(t))
            .collect();
        Ok(parsed.schema_object_id().clone().with_arguments(types).into())
    }

    fn write_identity(id: &Identifier, details: &ObjectDetails, state: &mut DynamicValue) {
        let Identifier::SchemaObjectWithArguments(inner) = id else {
            return;
        };
        write_schema_object_identity(inner.schema_object_id(), state);

        // Declared names are only known when the platform reports them
        let declared: Vec<Argument> = match details.get(ARGUMENTS) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| {
                    Some(Argument {
                        name: item.get("name")?.as_str()?.to_string(),
                        data_type: item.get("data_type")?.as_str()?.to_string(),
                    })
                })
                .collect(),
            _ => inner
                .argument_types()
                .iter()
                .enumerate()
                .map(|(idx, data_type)| Argument {
                    name: format!("ARG{}", idx + 1),
                    data_type: data_type.clone(),
                })
                .collect(),
        };
        if !declared.is_empty() {
            state.set_attr(
                ARGUMENTS,
                Dynamic::List(declared.iter().map(Argument::to_dynamic).collect()),
            );
        }
    }

    fn create_options(plan: &DynamicValue) -> Result<CreateOptions> {
        let builder = CreateBuilder::new(plan).attributes(ATTRIBUTES);
        let builder = match arguments(plan.attr(ARGUMENTS)) {
            Some(declared) if !declared.is_empty() => builder.property(
                ARGUMENTS,
                Value::Array(
                    declared
                        .iter()
                        .map(|a| json!({"name": a.name, "data_type": a.data_type}))
                        .collect(),
                ),
            ),
            Some(_) => builder,
            None => builder.error(format!("{}: value is not known at apply time", ARGUMENTS)),
        };
        builder.build()
    }
}

/// Languages compare without regard to case
fn language_changed(request: &PlanModifyRequest) -> bool {
    if request.plan.is_unknown() {
        return false;
    }
    match (request.state.as_str(), request.plan.as_str()) {
        (Some(prior), Some(planned)) => !prior.eq_ignore_ascii_case(planned),
        (prior, planned) => prior.is_some() != planned.is_some(),
    }
}

pub type ProcedureResource = ObjectResource<Procedure>;
