//! Managed service running on a compute pool
//!
//! The service specification comes from exactly one source: inline text, an
//! inline template rendered with `specification_template_using`, or a file
//! on a stage. Switching sources is an update; the whole new source is sent.

use super::common::{
    identity_attributes, schema_object_attributes, schema_object_id, write_schema_object_identity,
    ObjectModel, ObjectResource,
};
use crate::api::{ObjectDetails, ObjectKind};
use crate::error::Result;
use crate::identifier::{
    Identifier, IdentifierValidator, ObjectIdentifier, SchemaObjectIdentifier,
    SuppressIdentifierQuoting,
};
use crate::marshal::{AttributeSpec, ChangeSet, ValueKind};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use tfplug::plan_modifier::RequiresReplaceIfChanged;
use tfplug::validator::{
    ConfigValidator, ExactlyOneOf, ListLengthValidator, NumberRangeValidator, OneOfValidator,
};
use tfplug::{
    AttributeBuilder, AttributePath, AttributeType, Diagnostics, Dynamic, DynamicValue, Schema,
    SchemaBuilder,
};

pub const SERVICE_TYPES: &[&str] = &["LONG_RUNNING", "JOB"];

const SPECIFICATION: &str = "specification";
const SPECIFICATION_TEMPLATE: &str = "specification_template";
const SPECIFICATION_TEMPLATE_USING: &str = "specification_template_using";
const SPECIFICATION_FILE: &str = "specification_file";
const SPECIFICATION_STAGE: &str = "specification_stage";
const COMPUTE_POOL: &str = "compute_pool";
const SERVICE_TYPE: &str = "service_type";
const MIN_INSTANCES: &str = "min_instances";
const MAX_INSTANCES: &str = "max_instances";
const QUERY_WAREHOUSE: &str = "query_warehouse";
const AUTO_RESUME: &str = "auto_resume";
const EXTERNAL_ACCESS_INTEGRATIONS: &str = "external_access_integrations";
const COMMENT: &str = "comment";

const fn source(attribute: &'static str, kind: ValueKind) -> AttributeSpec {
    AttributeSpec::property(attribute, kind).write_only()
}

const SPECIFICATION_SOURCES: &[AttributeSpec] = &[
    source(SPECIFICATION, ValueKind::String),
    source(SPECIFICATION_TEMPLATE, ValueKind::String),
    source(SPECIFICATION_TEMPLATE_USING, ValueKind::StringMap),
    source(SPECIFICATION_FILE, ValueKind::String),
    source(SPECIFICATION_STAGE, ValueKind::String),
];

const ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec::property(COMPUTE_POOL, ValueKind::Identifier).only_on_create(),
    AttributeSpec::property(SERVICE_TYPE, ValueKind::Enum(SERVICE_TYPES)).only_on_create(),
    SPECIFICATION_SOURCES[0],
    SPECIFICATION_SOURCES[1],
    SPECIFICATION_SOURCES[2],
    SPECIFICATION_SOURCES[3],
    SPECIFICATION_SOURCES[4],
    AttributeSpec::property(MIN_INSTANCES, ValueKind::Number),
    AttributeSpec::property(MAX_INSTANCES, ValueKind::Number),
    AttributeSpec::property(QUERY_WAREHOUSE, ValueKind::Identifier),
    AttributeSpec::property(AUTO_RESUME, ValueKind::Bool),
    AttributeSpec::property(EXTERNAL_ACCESS_INTEGRATIONS, ValueKind::IdentifierSet),
    AttributeSpec::property(COMMENT, ValueKind::String),
];

fn is_specification_source(spec: &AttributeSpec) -> bool {
    SPECIFICATION_SOURCES
        .iter()
        .any(|source| source.attribute == spec.attribute)
}

fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").ok())
        .as_ref()
}

/// Placeholder names a template refers to
pub fn template_placeholders(template: &str) -> BTreeSet<String> {
    placeholder_pattern()
        .map(|re| {
            re.captures_iter(template)
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Cross-attribute rules of the specification sources
struct SpecificationSource;

impl ConfigValidator for SpecificationSource {
    fn description(&self) -> String {
        "service specification sources are complete and well formed".to_string()
    }

    fn validate(&self, config: &DynamicValue, diagnostics: &mut Diagnostics) {
        let file = config.attr(SPECIFICATION_FILE);
        let stage = config.attr(SPECIFICATION_STAGE);
        if file.is_null() != stage.is_null() && !file.is_unknown() && !stage.is_unknown() {
            diagnostics.add_attribute_error(
                AttributePath::new(SPECIFICATION_STAGE),
                "Incomplete specification source",
                "specification_file and specification_stage must be set together",
            );
        }

        let template = config.attr(SPECIFICATION_TEMPLATE);
        let using = config.attr(SPECIFICATION_TEMPLATE_USING);
        if template.is_null() && !using.is_null() {
            diagnostics.add_attribute_error(
                AttributePath::new(SPECIFICATION_TEMPLATE_USING),
                "Unused template values",
                "specification_template_using requires specification_template",
            );
        }

        let Some(template) = template.as_str() else {
            return;
        };
        if using.is_unknown() {
            return;
        }
        let bound = using.as_map();
        let missing: Vec<_> = template_placeholders(template)
            .into_iter()
            .filter(|name| !bound.is_some_and(|values| values.contains_key(name)))
            .collect();
        if !missing.is_empty() {
            diagnostics.add_attribute_error(
                AttributePath::new(SPECIFICATION_TEMPLATE),
                "Unbound template placeholders",
                format!(
                    "specification_template_using has no value for {}",
                    missing.join(", ")
                ),
            );
        }
    }
}

pub struct Service;

impl ObjectModel for Service {
    const TYPE_NAME: &'static str = "dataplatform_service";
    const LABEL: &'static str = "service";
    const KIND: ObjectKind = ObjectKind::Service;
    const IDENTITY: &'static [&'static str] = &["database", "schema", "name"];

    fn schema() -> Schema {
        let [id, fully_qualified_name] = identity_attributes();
        let [database, schema, name] = schema_object_attributes("service");
        SchemaBuilder::new()
            .version(0)
            .description("Manages a service running on a compute pool")
            .attribute(id)
            .attribute(fully_qualified_name)
            .attribute(database)
            .attribute(schema)
            .attribute(name)
            .attribute(
                AttributeBuilder::new(COMPUTE_POOL, AttributeType::String)
                    .description("Compute pool the service runs on")
                    .required()
                    .validator(Arc::new(IdentifierValidator::exact(1)))
                    .plan_modifier(Arc::new(SuppressIdentifierQuoting))
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(SERVICE_TYPE, AttributeType::String)
                    .description("LONG_RUNNING or JOB; changing it forces a new service")
                    .optional()
                    .validator(Arc::new(
                        OneOfValidator::new(SERVICE_TYPES.iter().copied()).case_insensitive(),
                    ))
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(SPECIFICATION, AttributeType::String)
                    .description("Inline service specification")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(SPECIFICATION_TEMPLATE, AttributeType::String)
                    .description("Inline specification template with {{ placeholder }} variables")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    SPECIFICATION_TEMPLATE_USING,
                    AttributeType::Map(Box::new(AttributeType::String)),
                )
                .description("Values substituted into specification_template")
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::new(SPECIFICATION_FILE, AttributeType::String)
                    .description("Path of a specification file on specification_stage")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(SPECIFICATION_STAGE, AttributeType::String)
                    .description("Stage holding specification_file")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(MIN_INSTANCES, AttributeType::Number)
                    .optional()
                    .validator(Arc::new(NumberRangeValidator {
                        min: Some(1.0),
                        max: None,
                    }))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(MAX_INSTANCES, AttributeType::Number)
                    .optional()
                    .validator(Arc::new(NumberRangeValidator {
                        min: Some(1.0),
                        max: None,
                    }))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(QUERY_WAREHOUSE, AttributeType::String)
                    .optional()
                    .validator(Arc::new(IdentifierValidator::exact(1)))
                    .plan_modifier(Arc::new(SuppressIdentifierQuoting))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(AUTO_RESUME, AttributeType::Bool)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    EXTERNAL_ACCESS_INTEGRATIONS,
                    AttributeType::Set(Box::new(AttributeType::String)),
                )
                .optional()
                .validator(Arc::new(ListLengthValidator {
                    min: Some(1),
                    max: None,
                }))
                .validator(Arc::new(IdentifierValidator::exact(1)))
                .build(),
            )
            .attribute(
                AttributeBuilder::new(COMMENT, AttributeType::String)
                    .optional()
                    .build(),
            )
            .config_validator(Arc::new(ExactlyOneOf::new(&[
                SPECIFICATION,
                SPECIFICATION_TEMPLATE,
                SPECIFICATION_FILE,
            ])))
            .config_validator(Arc::new(SpecificationSource))
            .build()
    }

    fn attributes() -> &'static [AttributeSpec] {
        ATTRIBUTES
    }

    fn identifier(state: &DynamicValue) -> Result<Identifier> {
        Ok(schema_object_id(state)?.into())
    }

    fn parse_id(id: &str) -> Result<Identifier> {
        Ok(SchemaObjectIdentifier::from_resource_id(id)?.into())
    }

    fn write_identity(id: &Identifier, _details: &ObjectDetails, state: &mut DynamicValue) {
        if let Identifier::SchemaObject(inner) = id {
            write_schema_object_identity(inner, state);
        }
    }

    fn uses_create_or_alter() -> bool {
        true
    }

    fn changes(prior: &DynamicValue, plan: &DynamicValue) -> ChangeSet {
        let plain: Vec<AttributeSpec> = ATTRIBUTES
            .iter()
            .filter(|spec| !is_specification_source(spec))
            .copied()
            .collect();
        let mut changes = ChangeSet::diff(&plain, prior, plan);

        let source_changed = SPECIFICATION_SOURCES.iter().any(|spec| {
            !prior
                .attr(spec.attribute)
                .semantically_equal(plan.attr(spec.attribute))
        });
        if source_changed {
            // Null prior forces every attribute of the new source into SET
            for spec in SPECIFICATION_SOURCES {
                changes.compare(spec, &Dynamic::Null, plan.attr(spec.attribute));
            }
        }
        changes
    }
}

pub type ServiceResource = ObjectResource<Service>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn config() -> DynamicValue {
        let mut config = DynamicValue::object();
        config.set_attr("database", Dynamic::string("DB"));
        config.set_attr("schema", Dynamic::string("SCH"));
        config.set_attr("name", Dynamic::string("SVC"));
        config.set_attr(COMPUTE_POOL, Dynamic::string("POOL"));
        config
    }

    #[test]
    fn exactly_one_specification_source() {
        let schema = Service::schema();
        let mut c = config();
        assert!(schema.validate_config(&c).has_errors());

        c.set_attr(SPECIFICATION, Dynamic::string("spec: {}"));
        assert!(!schema.validate_config(&c).has_errors());

        c.set_attr(SPECIFICATION_FILE, Dynamic::string("spec.yaml"));
        c.set_attr(SPECIFICATION_STAGE, Dynamic::string("@DB.SCH.STAGE"));
        assert!(schema.validate_config(&c).has_errors());
    }

    #[test]
    fn template_placeholders_must_be_bound() {
        let schema = Service::schema();
        let mut c = config();
        c.set_attr(
            SPECIFICATION_TEMPLATE,
            Dynamic::string("image: {{ image }}\ntag: {{tag}}"),
        );
        c.set_attr(
            SPECIFICATION_TEMPLATE_USING,
            Dynamic::Map(BTreeMap::from([("image".to_string(), Dynamic::string("app"))])),
        );
        let diagnostics = schema.validate_config(&c);
        assert!(diagnostics.has_errors());

        c.set_attr(
            SPECIFICATION_TEMPLATE_USING,
            Dynamic::Map(BTreeMap::from([
                ("image".to_string(), Dynamic::string("app")),
                ("tag".to_string(), Dynamic::string("v1")),
            ])),
        );
        assert!(!schema.validate_config(&c).has_errors());
    }

    #[test]
    fn every_marshaled_attribute_is_in_the_schema() {
        let schema = Service::schema();
        for spec in ATTRIBUTES {
            assert!(schema.attribute(spec.attribute).is_some(), "{}", spec.attribute);
        }
        assert!(SPECIFICATION_SOURCES.iter().all(|spec| ATTRIBUTES.contains(spec)));
    }

    #[test]
    fn placeholders_are_extracted() {
        assert_eq!(
            template_placeholders("{{ a }} {{b}} {{ a }}"),
            BTreeSet::from(["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn switching_source_sets_the_new_source() {
        let mut prior = config();
        prior.set_attr(SPECIFICATION, Dynamic::string("spec: {}"));
        let mut plan = config();
        plan.set_attr(SPECIFICATION_FILE, Dynamic::string("spec.yaml"));
        plan.set_attr(SPECIFICATION_STAGE, Dynamic::string("@DB.SCH.STAGE"));

        let changes = Service::changes(&prior, &plan);
        assert_eq!(changes.set.len(), 2);
        assert!(changes.set.contains_key(SPECIFICATION_FILE));
        assert!(changes.set.contains_key(SPECIFICATION_STAGE));
        assert!(changes.unset.is_empty());
    }

    #[test]
    fn unchanged_source_is_not_resent() {
        let mut prior = config();
        prior.set_attr(SPECIFICATION, Dynamic::string("spec: {}"));
        prior.set_attr(COMMENT, Dynamic::string("old"));
        let mut plan = prior.clone();
        plan.set_attr(COMMENT, Dynamic::string("new"));

        let changes = Service::changes(&prior, &plan);
        assert_eq!(changes.set_attributes, vec![COMMENT]);
    }
}
