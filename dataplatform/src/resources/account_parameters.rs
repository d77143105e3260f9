//! Parameters of the current account and the current organization account
//!
//! Both accounts always exist. The resources only pin parameters on them, so
//! create applies the configuration like an update and delete leaves every
//! parameter in place.

use super::common::{identity_attributes, ObjectModel, ObjectResource};
use super::database::{enum_parameter, number_parameter, LOG_LEVELS, TRACE_LEVELS};
use crate::api::{ObjectDetails, ObjectKind};
use crate::error::{ProviderError, Result};
use crate::identifier::Identifier;
use crate::marshal::{AttributeSpec, ValueKind};
use regex::Regex;
use std::marker::PhantomData;
use std::sync::Arc;
use tfplug::schema::Attribute;
use tfplug::validator::StringPatternValidator;
use tfplug::{AttributeBuilder, AttributeType, DynamicValue, Schema, SchemaBuilder};

const ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec::parameter(
        "statement_timeout_in_seconds",
        "STATEMENT_TIMEOUT_IN_SECONDS",
        ValueKind::Number,
    ),
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
    AttributeSpec::parameter("timezone", "TIMEZONE", ValueKind::String),
    AttributeSpec::parameter("log_level", "LOG_LEVEL", ValueKind::Enum(LOG_LEVELS)),
    AttributeSpec::parameter("trace_level", "TRACE_LEVEL", ValueKind::Enum(TRACE_LEVELS)),
    AttributeSpec::parameter(
        "enable_unredacted_query_syntax_error",
        "ENABLE_UNREDACTED_QUERY_SYNTAX_ERROR",
        ValueKind::Bool,
    ),
];

/// Which implicit account a resource manages
pub trait AccountScope: Send + Sync + 'static {
    const TYPE_NAME: &'static str;
    const LABEL: &'static str;
    const KIND: ObjectKind;
}

pub struct CurrentAccountScope;

impl AccountScope for CurrentAccountScope {
    const TYPE_NAME: &'static str = "dataplatform_current_account";
    const LABEL: &'static str = "current account";
    const KIND: ObjectKind = ObjectKind::Account;
}

pub struct CurrentOrganizationAccountScope;

impl AccountScope for CurrentOrganizationAccountScope {
    const TYPE_NAME: &'static str = "dataplatform_current_organization_account";
    const LABEL: &'static str = "current organization account";
    const KIND: ObjectKind = ObjectKind::OrganizationAccount;
}

fn timezone_attribute() -> Attribute {
    let builder = AttributeBuilder::new("timezone", AttributeType::String)
        .description("Time zone of sessions, e.g. Europe/Berlin")
        .optional();
    match Regex::new(r"^[A-Za-z][A-Za-z0-9_+\-]*(/[A-Za-z0-9_+\-]+)*$") {
        Ok(pattern) => builder
            .validator(Arc::new(StringPatternValidator {
                pattern,
                description: "a time zone name such as UTC or America/New_York".to_string(),
            }))
            .build(),
        Err(_) => builder.build(),
    }
}

pub struct AccountParameters<S>(PhantomData<fn() -> S>);

impl<S: AccountScope> ObjectModel for AccountParameters<S> {
    const TYPE_NAME: &'static str = S::TYPE_NAME;
    const LABEL: &'static str = S::LABEL;
    const KIND: ObjectKind = S::KIND;
    const IDENTITY: &'static [&'static str] = &[];
    const SINGLETON: bool = true;

    fn schema() -> Schema {
        let [id, fully_qualified_name] = identity_attributes();
        SchemaBuilder::new()
            .version(0)
            .description(&format!("Manages parameters of the {}", S::LABEL))
            .attribute(id)
            .attribute(fully_qualified_name)
            .attribute(number_parameter(
                "statement_timeout_in_seconds",
                "Seconds after which a running statement is cancelled",
                Some(604800.0),
            ))
            .attribute(number_parameter(
                "data_retention_time_in_days",
                "Default days historical data is retained for time travel",
                Some(90.0),
            ))
            .attribute(number_parameter(
                "max_data_extension_time_in_days",
                "Default days data retention may be extended for streams",
                Some(90.0),
            ))
            .attribute(timezone_attribute())
            .attribute(enum_parameter("log_level", "Default severity of messages ingested into event tables", LOG_LEVELS))
            .attribute(enum_parameter("trace_level", "Default tracing of function and procedure calls", TRACE_LEVELS))
            .attribute(
                AttributeBuilder::new("enable_unredacted_query_syntax_error", AttributeType::Bool)
                    .optional()
                    .build(),
            )
            .build()
    }

    fn attributes() -> &'static [AttributeSpec] {
        ATTRIBUTES
    }

    fn identifier(_state: &DynamicValue) -> Result<Identifier> {
        Ok(Identifier::Current)
    }

    fn parse_id(id: &str) -> Result<Identifier> {
        if id.trim().is_empty() {
            return Err(ProviderError::malformed(id, "empty account id"));
        }
        Ok(Identifier::Current)
    }

    fn write_identity(_id: &Identifier, _details: &ObjectDetails, _state: &mut DynamicValue) {}
}

pub type CurrentAccountResource = ObjectResource<AccountParameters<CurrentAccountScope>>;
pub type CurrentOrganizationAccountResource =
    ObjectResource<AccountParameters<CurrentOrganizationAccountScope>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::ChangeSet;
    use serde_json::json;
    use tfplug::Dynamic;

    type Account = AccountParameters<CurrentAccountScope>;

    #[test]
    fn identity_is_the_session_account() {
        assert_eq!(Account::identifier(&DynamicValue::object()).unwrap(), Identifier::Current);
        assert_eq!(Account::parse_id("ORG.ACCOUNT").unwrap(), Identifier::Current);
        assert!(Account::parse_id(" ").is_err());
    }

    #[test]
    fn first_apply_sets_configured_parameters() {
        let mut plan = DynamicValue::object();
        plan.set_attr("timezone", Dynamic::string("UTC"));
        plan.set_attr("statement_timeout_in_seconds", Dynamic::Number(3600.0));

        let changes = ChangeSet::diff(Account::attributes(), &DynamicValue::object(), &plan);
        assert_eq!(changes.set.get("TIMEZONE"), Some(&json!("UTC")));
        assert_eq!(changes.set.get("STATEMENT_TIMEOUT_IN_SECONDS"), Some(&json!(3600)));
        assert!(changes.unset.is_empty());
    }

    #[test]
    fn timezone_must_name_a_zone() {
        let schema = Account::schema();
        for zone in ["UTC", "America/New_York", "Etc/GMT+5"] {
            let mut config = DynamicValue::object();
            config.set_attr("timezone", Dynamic::string(zone));
            assert!(!schema.validate_config(&config).has_errors(), "{zone}");
        }

        let mut config = DynamicValue::object();
        config.set_attr("timezone", Dynamic::string("not a zone"));
        assert!(schema.validate_config(&config).has_errors());
    }

    #[test]
    fn scopes_have_distinct_type_names() {
        assert_ne!(
            <AccountParameters<CurrentAccountScope> as ObjectModel>::TYPE_NAME,
            <AccountParameters<CurrentOrganizationAccountScope> as ObjectModel>::TYPE_NAME
        );
    }
}
