//! Database created from a share published by another account

use super::common::{identity_attributes, string_attr, ObjectModel, ObjectResource};
use super::database::{database_name, enum_parameter, LOG_LEVELS, TRACE_LEVELS};
use crate::api::{ObjectDetails, ObjectKind};
use crate::error::Result;
use crate::identifier::{
    AccountObjectIdentifier, ExternalObjectIdentifier, Identifier, IdentifierValidator,
    ObjectIdentifier, SuppressIdentifierQuoting,
};
use crate::marshal::{AttributeSpec, ValueKind};
use std::sync::Arc;
use tfplug::plan_modifier::RequiresReplaceIfChanged;
use tfplug::{AttributeBuilder, AttributeType, Dynamic, DynamicValue, Schema, SchemaBuilder};

const ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec::property("from_share", ValueKind::Identifier)
        .only_on_create()
        .write_only(),
    AttributeSpec::property("comment", ValueKind::String),
    AttributeSpec::parameter("log_level", "LOG_LEVEL", ValueKind::Enum(LOG_LEVELS)),
    AttributeSpec::parameter("trace_level", "TRACE_LEVEL", ValueKind::Enum(TRACE_LEVELS)),
];

pub struct SharedDatabase;

impl ObjectModel for SharedDatabase {
    const TYPE_NAME: &'static str = "dataplatform_shared_database";
    const LABEL: &'static str = "shared database";
    const KIND: ObjectKind = ObjectKind::Database;
    const IDENTITY: &'static [&'static str] = &["name"];

    fn schema() -> Schema {
        let [id, fully_qualified_name] = identity_attributes();
        SchemaBuilder::new()
            .version(0)
            .description("Manages a database created from a share")
            .attribute(id)
            .attribute(fully_qualified_name)
            .attribute(database_name())
            .attribute(
                AttributeBuilder::new("from_share", AttributeType::String)
                    .description("Share the database is created from, as ORGANIZATION.ACCOUNT.SHARE")
                    .required()
                    .validator(Arc::new(IdentifierValidator::exact(3)))
                    .plan_modifier(Arc::new(SuppressIdentifierQuoting))
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("comment", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(enum_parameter("log_level", "Severity of messages ingested into the event table", LOG_LEVELS))
            .attribute(enum_parameter("trace_level", "Tracing of function and procedure calls", TRACE_LEVELS))
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

    fn write_identity(id: &Identifier, details: &ObjectDetails, state: &mut DynamicValue) {
        state.set_attr("name", Dynamic::string(id.name()));
        if let Some(origin) = details
            .string("origin")
            .or_else(|| details.string("from_share"))
            .and_then(|raw| ExternalObjectIdentifier::parse(&raw).ok())
        {
            state.set_attr("from_share", Dynamic::String(origin.fully_qualified_name()));
        }
    }
}

pub type SharedDatabaseResource = ObjectResource<SharedDatabase>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::CreateBuilder;
    use serde_json::json;

    #[test]
    fn share_is_sent_fully_qualified() {
        let mut plan = DynamicValue::object();
        plan.set_attr("name", Dynamic::string("SHARED"));
        plan.set_attr("from_share", Dynamic::string("ORG.PROVIDER.SALES"));

        let opts = CreateBuilder::new(&plan)
            .attributes(SharedDatabase::attributes())
            .build()
            .unwrap();
        assert_eq!(
            opts.properties.get("from_share"),
            Some(&json!("\"ORG\".\"PROVIDER\".\"SALES\""))
        );
    }

    #[test]
    fn share_needs_three_parts() {
        let mut config = DynamicValue::object();
        config.set_attr("name", Dynamic::string("SHARED"));
        config.set_attr("from_share", Dynamic::string("PROVIDER.SALES"));
        assert!(SharedDatabase::schema().validate_config(&config).has_errors());
    }
}
