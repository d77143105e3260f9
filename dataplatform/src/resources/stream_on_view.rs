//! Change-tracking stream over a view
//!
//! A stream can be positioned `at` or `before` a point in the view's history,
//! given as exactly one of an offset in seconds, a timestamp, a statement id
//! or another stream. Positions only take effect on create, so any change to
//! them replaces the stream. A stream that went stale after it was applied is
//! replaced on the next apply; one that was already stale when created is not.

use super::common::{
    identity_attributes, replace_when_raised, schema_object_attributes, schema_object_id,
    write_schema_object_identity, ObjectModel, ObjectResource,
};
use crate::api::{CreateOptions, ObjectDetails, ObjectKind};
use crate::error::Result;
use crate::identifier::{
    canonical_identifier, parse_parts, Identifier, IdentifierValidator, ObjectIdentifier,
    SchemaObjectIdentifier, SuppressIdentifierQuoting,
};
use crate::marshal::{whole_number, AttributeSpec, CreateBuilder, ValueKind};
use crate::private_state::ObjectSnapshot;
use serde_json::{json, Value};
use std::sync::Arc;
use tfplug::plan_modifier::RequiresReplaceIfChanged;
use tfplug::resource::ModifyPlanResponse;
use tfplug::schema::Attribute;
use tfplug::validator::{ConflictsWith, Validator};
use tfplug::{
    AttributeBuilder, AttributePath, AttributeType, Diagnostics, Dynamic, DynamicValue, Schema,
    SchemaBuilder,
};

pub const AT: &str = "at";
pub const BEFORE: &str = "before";
const STALE: &str = "stale";
const POSITION_KINDS: &[&str] = &["offset", "timestamp", "statement", "stream"];

const ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec::property("view", ValueKind::Identifier)
        .key("table_name")
        .only_on_create(),
    AttributeSpec::property("append_only", ValueKind::Bool)
        .only_on_create()
        .write_only(),
    AttributeSpec::property("show_initial_rows", ValueKind::Bool)
        .only_on_create()
        .write_only(),
    AttributeSpec::property("copy_grants", ValueKind::Bool)
        .only_on_create()
        .write_only(),
    AttributeSpec::property("comment", ValueKind::String),
    AttributeSpec::read_only(STALE, ValueKind::Bool),
    AttributeSpec::read_only("mode", ValueKind::String),
];

fn position_type() -> AttributeType {
    AttributeType::object(&[
        ("offset", AttributeType::Number),
        ("timestamp", AttributeType::String),
        ("statement", AttributeType::String),
        ("stream", AttributeType::String),
    ])
}

/// Exactly one well-formed position kind per clause
struct PositionValidator;

impl Validator for PositionValidator {
    fn description(&self) -> String {
        format!("exactly one of {}", POSITION_KINDS.join(", "))
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Diagnostics) {
        if !value.is_known() {
            return;
        }
        if POSITION_KINDS.iter().any(|kind| value.field(kind).is_unknown()) {
            return;
        }
        let given: Vec<&str> = POSITION_KINDS
            .iter()
            .copied()
            .filter(|kind| value.field(kind).is_known())
            .collect();
        if given.len() != 1 {
            diagnostics.add_attribute_error(
                path.clone(),
                "Invalid stream position",
                format!("{}, got {}", self.description(), given.len()),
            );
            return;
        }

        let kind = given[0];
        let raw = value.field(kind);
        let problem = match kind {
            "timestamp" => raw.as_str().and_then(|s| {
                chrono::DateTime::parse_from_rfc3339(s)
                    .err()
                    .map(|e| format!("{:?} is not an RFC 3339 timestamp: {}", s, e))
            }),
            "statement" => raw.as_str().and_then(|s| {
                uuid::Uuid::parse_str(s)
                    .err()
                    .map(|e| format!("{:?} is not a statement id: {}", s, e))
            }),
            "stream" => raw.as_str().and_then(|s| match parse_parts(s) {
                Ok(parts) if parts.len() == 3 => None,
                Ok(_) => Some(format!("{:?} must be DATABASE.SCHEMA.STREAM", s)),
                Err(e) => Some(e.to_string()),
            }),
            _ => None,
        };
        if let Some(detail) = problem {
            diagnostics.add_attribute_error(
                path.clone().attribute(kind),
                "Invalid stream position",
                detail,
            );
        }
    }
}

fn position(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, position_type())
        .description(description)
        .optional()
        .validator(Arc::new(PositionValidator))
        .plan_modifier(Arc::new(RequiresReplaceIfChanged))
        .build()
}

/// Platform form of a position clause
fn position_payload(value: &Dynamic) -> std::result::Result<Option<Value>, String> {
    if value.is_null() {
        return Ok(None);
    }
    if value.contains_unknown() {
        return Err("position is not known at apply time".to_string());
    }
    let payload = match (
        value.field("offset"),
        value.field("timestamp"),
        value.field("statement"),
        value.field("stream"),
    ) {
        (Dynamic::Number(n), _, _, _) => {
            json!({ "offset": whole_number("offset", *n).map_err(|e| e.to_string())? })
        }
        (_, Dynamic::String(ts), _, _) => json!({ "timestamp": ts }),
        (_, _, Dynamic::String(statement), _) => json!({ "statement": statement }),
        (_, _, _, Dynamic::String(stream)) => json!({ "stream": canonical_identifier(stream) }),
        _ => return Err(format!("exactly one of {} is required", POSITION_KINDS.join(", "))),
    };
    Ok(Some(payload))
}

pub struct StreamOnView;

impl ObjectModel for StreamOnView {
    const TYPE_NAME: &'static str = "dataplatform_stream_on_view";
    const LABEL: &'static str = "stream";
    const KIND: ObjectKind = ObjectKind::Stream;
    const IDENTITY: &'static [&'static str] = &["database", "schema", "name"];
    const SNAPSHOT_ON_APPLY: &'static [&'static str] = &[STALE];

    fn schema() -> Schema {
        let [id, fully_qualified_name] = identity_attributes();
        let [database, schema, name] = schema_object_attributes("stream");
        SchemaBuilder::new()
            .version(0)
            .description("Manages a stream tracking changes of a view")
            .attribute(id)
            .attribute(fully_qualified_name)
            .attribute(database)
            .attribute(schema)
            .attribute(name)
            .attribute(
                AttributeBuilder::new("view", AttributeType::String)
                    .description("Fully qualified view the stream tracks")
                    .required()
                    .validator(Arc::new(IdentifierValidator::exact(3)))
                    .plan_modifier(Arc::new(SuppressIdentifierQuoting))
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("append_only", AttributeType::Bool)
                    .description("Track inserts only")
                    .optional()
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("show_initial_rows", AttributeType::Bool)
                    .description("Return the rows present when the stream was created on first consumption")
                    .optional()
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("copy_grants", AttributeType::Bool)
                    .description("Keep grants of the replaced stream; only used on create")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("comment", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(position(AT, "Start tracking at this point in the view's history"))
            .attribute(position(BEFORE, "Start tracking right before this point in the view's history"))
            .attribute(
                AttributeBuilder::new(STALE, AttributeType::Bool)
                    .description("Whether the stream can no longer be read; a stale stream is recreated")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("mode", AttributeType::String)
                    .description("Change tracking mode reported by the platform")
                    .computed()
                    .build(),
            )
            .config_validator(Arc::new(ConflictsWith::new(AT, &[BEFORE])))
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

    fn write_identity(id: &Identifier, details: &ObjectDetails, state: &mut DynamicValue) {
        if let Identifier::SchemaObject(inner) = id {
            write_schema_object_identity(inner, state);
        }
        if let Some(view) = details.string("table_name") {
            state.set_attr("view", Dynamic::String(canonical_identifier(&view)));
        }
    }

    fn create_options(plan: &DynamicValue) -> Result<CreateOptions> {
        let mut builder = CreateBuilder::new(plan).attributes(ATTRIBUTES);
        for clause in [AT, BEFORE] {
            match position_payload(plan.attr(clause)) {
                Ok(Some(payload)) => builder = builder.property(clause, payload),
                Ok(None) => {}
                Err(e) => builder = builder.error(format!("{}: {}", clause, e)),
            }
        }
        builder.build()
    }

    fn plan(
        prior: &DynamicValue,
        _config: &DynamicValue,
        snapshot: &ObjectSnapshot,
        response: &mut ModifyPlanResponse,
    ) {
        replace_when_raised(prior, snapshot, STALE, response);
    }
}

pub type StreamOnViewResource = ObjectResource<StreamOnView>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn clause(kind: &str, value: Dynamic) -> Dynamic {
        Dynamic::Map(BTreeMap::from([(kind.to_string(), value)]))
    }

    fn config() -> DynamicValue {
        let mut config = DynamicValue::object();
        config.set_attr("database", Dynamic::string("DB"));
        config.set_attr("schema", Dynamic::string("SCH"));
        config.set_attr("name", Dynamic::string("STREAM"));
        config.set_attr("view", Dynamic::string("DB.SCH.VIEW"));
        config
    }

    #[test]
    fn at_and_before_conflict() {
        let mut c = config();
        c.set_attr(AT, clause("offset", Dynamic::Number(-60.0)));
        assert!(!StreamOnView::schema().validate_config(&c).has_errors());

        c.set_attr(BEFORE, clause("offset", Dynamic::Number(-30.0)));
        assert!(StreamOnView::schema().validate_config(&c).has_errors());
    }

    #[test]
    fn position_needs_exactly_one_kind() {
        let mut diagnostics = Diagnostics::new();
        let path = AttributePath::new(AT);
        let both = Dynamic::Map(BTreeMap::from([
            ("offset".to_string(), Dynamic::Number(-60.0)),
            ("stream".to_string(), Dynamic::string("DB.SCH.OTHER")),
        ]));
        PositionValidator.validate(&both, &path, &mut diagnostics);
        assert!(diagnostics.has_errors());

        let mut diagnostics = Diagnostics::new();
        PositionValidator.validate(&Dynamic::Map(BTreeMap::new()), &path, &mut diagnostics);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn position_values_are_checked() {
        let path = AttributePath::new(BEFORE);
        let cases = [
            (clause("timestamp", Dynamic::string("2024-03-01T10:00:00Z")), false),
            (clause("timestamp", Dynamic::string("yesterday")), true),
            (
                clause("statement", Dynamic::string("8e3b1f2c-58a4-4f5e-9a77-2c9d0e4b6a10")),
                false,
            ),
            (clause("statement", Dynamic::string("not-a-query")), true),
            (clause("stream", Dynamic::string("OTHER")), true),
        ];
        for (value, invalid) in cases {
            let mut diagnostics = Diagnostics::new();
            PositionValidator.validate(&value, &path, &mut diagnostics);
            assert_eq!(diagnostics.has_errors(), invalid, "{:?}", value);
        }
    }

    #[test]
    fn create_carries_position_and_view() {
        let mut plan = config();
        plan.set_attr("append_only", Dynamic::Bool(true));
        plan.set_attr(BEFORE, clause("stream", Dynamic::string("DB.SCH.OTHER")));
        plan.set_attr("stale", Dynamic::Unknown);
        plan.set_attr("mode", Dynamic::Unknown);

        let opts = StreamOnView::create_options(&plan).unwrap();
        assert_eq!(opts.properties.get("table_name"), Some(&json!("\"DB\".\"SCH\".\"VIEW\"")));
        assert_eq!(
            opts.properties.get(BEFORE),
            Some(&json!({"stream": "\"DB\".\"SCH\".\"OTHER\""}))
        );
        assert_eq!(opts.properties.get("append_only"), Some(&json!(true)));
        assert!(!opts.properties.contains_key("stale"));
    }

    fn plan_stale(prior_stale: bool, applied: Option<bool>) -> ModifyPlanResponse {
        let mut prior = config();
        prior.set_attr(STALE, Dynamic::Bool(prior_stale));
        let mut snapshot = ObjectSnapshot::new();
        snapshot.set(STALE, applied.map(Value::Bool));
        let mut response = ModifyPlanResponse {
            planned_state: prior.clone(),
            requires_replace: Vec::new(),
            planned_private: Vec::new(),
            diagnostics: Diagnostics::new(),
        };
        StreamOnView::plan(&prior, &prior, &snapshot, &mut response);
        response
    }

    #[test]
    fn stream_that_went_stale_is_replaced() {
        let response = plan_stale(true, Some(false));
        assert_eq!(response.requires_replace, vec![AttributePath::new(STALE)]);
        assert!(response.planned_state.attr(STALE).is_unknown());
    }

    #[test]
    fn stream_stale_since_apply_is_kept() {
        assert!(plan_stale(true, Some(true)).requires_replace.is_empty());
        assert!(plan_stale(true, None).requires_replace.is_empty());
        assert!(plan_stale(false, Some(false)).requires_replace.is_empty());
    }

    #[test]
    fn offsets_must_be_whole_numbers_in_range() {
        assert_eq!(
            position_payload(&clause("offset", Dynamic::Number(-60.0))),
            Ok(Some(json!({"offset": -60})))
        );
        assert!(position_payload(&clause("offset", Dynamic::Number(-1.5))).is_err());
        assert!(position_payload(&clause("offset", Dynamic::Number(1e20))).is_err());
    }
}
