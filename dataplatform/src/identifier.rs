//! Hierarchical object identifiers
//!
//! Identifiers have one to three dot-separated parts, each optionally
//! double-quoted (a literal quote is written as two quotes). Parsing strips
//! the quoting, so `"DB"."SCH".T` and `DB.SCH.T` are the same identifier.
//! Formatting always quotes every part.
//!
//! Resource ids use the fully qualified form. Ids written by older provider
//! versions used `|` between unquoted parts; both encodings parse.

use crate::error::{ProviderError, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tfplug::plan_modifier::{PlanModifier, PlanModifyRequest, PlanModifyResponse};
use tfplug::types::{AttributePath, Diagnostics, Dynamic};
use tfplug::validator::Validator;

const LEGACY_DELIMITER: char = '|';

/// Quote one identifier part
pub fn quote(part: &str) -> String {
    format!("\"{}\"", part.replace('"', "\"\""))
}

/// Split an identifier into its unquoted parts
pub fn parse_parts(input: &str) -> Result<Vec<String>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::malformed(input, "identifier is empty"));
    }

    let mut parts = Vec::new();
    let mut chars = trimmed.chars().peekable();

    loop {
        let mut part = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        part.push('"');
                    }
                    Some('"') => break,
                    Some(c) => part.push(c),
                    None => return Err(ProviderError::malformed(input, "unterminated quote")),
                }
            }
            match chars.peek() {
                None | Some('.') => {}
                Some(c) => {
                    return Err(ProviderError::malformed(
                        input,
                        format!("unexpected {:?} after closing quote", c),
                    ))
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                if c == '"' {
                    return Err(ProviderError::malformed(
                        input,
                        "quote inside an unquoted part",
                    ));
                }
                part.push(c);
                chars.next();
            }
        }

        if part.is_empty() {
            return Err(ProviderError::malformed(input, "empty identifier part"));
        }
        parts.push(part);

        match chars.next() {
            None => break,
            Some('.') => continue,
            Some(c) => {
                return Err(ProviderError::malformed(
                    input,
                    format!("unexpected {:?}", c),
                ))
            }
        }
    }

    Ok(parts)
}

/// Index of the first occurrence of `needle` outside double quotes
pub(crate) fn find_unquoted(input: &str, needle: char) -> Option<usize> {
    let mut in_quotes = false;
    for (idx, c) in input.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c == needle && !in_quotes => return Some(idx),
            _ => {}
        }
    }
    None
}

pub(crate) fn split_unquoted(input: &str, needle: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = input;
    while let Some(idx) = find_unquoted(rest, needle) {
        pieces.push(&rest[..idx]);
        rest = &rest[idx + needle.len_utf8()..];
    }
    pieces.push(rest);
    pieces
}

/// Common behaviour of fixed-depth identifiers
pub trait ObjectIdentifier: Sized + Clone + fmt::Debug + PartialEq {
    const PARTS: usize;
    const LEVEL: &'static str;

    fn from_parts(parts: Vec<String>) -> Self;

    fn parts(&self) -> Vec<&str>;

    /// Unquoted leaf name
    fn name(&self) -> &str;

    fn fully_qualified_name(&self) -> String {
        self.parts()
            .iter()
            .map(|p| quote(p))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn parse(input: &str) -> Result<Self> {
        let parts = parse_parts(input)?;
        if parts.len() != Self::PARTS {
            return Err(ProviderError::malformed(
                input,
                format!(
                    "{} identifier needs {} part(s), got {}",
                    Self::LEVEL,
                    Self::PARTS,
                    parts.len()
                ),
            ));
        }
        Ok(Self::from_parts(parts))
    }

    /// Decode a resource id in either the qualified or the legacy encoding
    fn from_resource_id(id: &str) -> Result<Self> {
        if find_unquoted(id, LEGACY_DELIMITER).is_none() {
            return Self::parse(id);
        }
        let parts: Vec<String> = split_unquoted(id, LEGACY_DELIMITER)
            .into_iter()
            .map(|p| p.trim().trim_matches('"').to_string())
            .collect();
        if parts.len() != Self::PARTS || parts.iter().any(String::is_empty) {
            return Err(ProviderError::malformed(
                id,
                format!("expected {} parts separated by '|'", Self::PARTS),
            ));
        }
        Ok(Self::from_parts(parts))
    }
}

macro_rules! impl_identifier_traits {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.fully_qualified_name())
            }
        }

        impl FromStr for $ty {
            type Err = ProviderError;

            fn from_str(s: &str) -> Result<Self> {
                <$ty as ObjectIdentifier>::parse(s)
            }
        }
    };
}

/// Account-level object: warehouse, database, user
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountObjectIdentifier {
    name: String,
}

impl AccountObjectIdentifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ObjectIdentifier for AccountObjectIdentifier {
    const PARTS: usize = 1;
    const LEVEL: &'static str = "account object";

    fn from_parts(mut parts: Vec<String>) -> Self {
        Self {
            name: parts.remove(0),
        }
    }

    fn parts(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl_identifier_traits!(AccountObjectIdentifier);

/// Object inside a database, i.e. a schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatabaseObjectIdentifier {
    database: String,
    name: String,
}

impl DatabaseObjectIdentifier {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

impl ObjectIdentifier for DatabaseObjectIdentifier {
    const PARTS: usize = 2;
    const LEVEL: &'static str = "database object";

    fn from_parts(mut parts: Vec<String>) -> Self {
        let name = parts.remove(1);
        Self {
            database: parts.remove(0),
            name,
        }
    }

    fn parts(&self) -> Vec<&str> {
        vec![self.database.as_str(), self.name.as_str()]
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl_identifier_traits!(DatabaseObjectIdentifier);

/// Object inside a schema: service, stream, view
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaObjectIdentifier {
    database: String,
    schema: String,
    name: String,
}

impl SchemaObjectIdentifier {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn schema_id(&self) -> DatabaseObjectIdentifier {
        DatabaseObjectIdentifier::new(&self.database, &self.schema)
    }

    pub fn with_arguments(self, argument_types: Vec<String>) -> SchemaObjectIdentifierWithArguments {
        SchemaObjectIdentifierWithArguments {
            inner: self,
            argument_types: argument_types
                .iter()
                .map(|t| normalize_data_type(t))
                .collect(),
        }
    }
}

impl ObjectIdentifier for SchemaObjectIdentifier {
    const PARTS: usize = 3;
    const LEVEL: &'static str = "schema object";

    fn from_parts(mut parts: Vec<String>) -> Self {
        let name = parts.remove(2);
        let schema = parts.remove(1);
        Self {
            database: parts.remove(0),
            schema,
            name,
        }
    }

    fn parts(&self) -> Vec<&str> {
        vec![self.database.as_str(), self.schema.as_str(), self.name.as_str()]
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl_identifier_traits!(SchemaObjectIdentifier);

/// Overloadable schema object (procedure) identified by name plus argument
/// data types: `"DB"."SCH"."PROC"(VARCHAR, NUMBER)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaObjectIdentifierWithArguments {
    inner: SchemaObjectIdentifier,
    argument_types: Vec<String>,
}

impl SchemaObjectIdentifierWithArguments {
    pub fn schema_object_id(&self) -> &SchemaObjectIdentifier {
        &self.inner
    }

    pub fn database(&self) -> &str {
        self.inner.database()
    }

    pub fn schema(&self) -> &str {
        self.inner.schema()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn argument_types(&self) -> &[String] {
        &self.argument_types
    }

    pub fn signature(&self) -> String {
        format!("({})", self.argument_types.join(", "))
    }

    pub fn fully_qualified_name(&self) -> String {
        format!("{}{}", self.inner.fully_qualified_name(), self.signature())
    }

    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let open = find_unquoted(trimmed, '(')
            .ok_or_else(|| ProviderError::malformed(input, "missing argument list"))?;
        if !trimmed.ends_with(')') {
            return Err(ProviderError::malformed(input, "argument list is not closed"));
        }
        let inner = SchemaObjectIdentifier::parse(&trimmed[..open])?;
        let arguments = &trimmed[open + 1..trimmed.len() - 1];
        Ok(inner.with_arguments(split_argument_types(arguments)))
    }

    /// Decode a resource id; the legacy form is `db|schema|name|T1-T2`
    pub fn from_resource_id(id: &str) -> Result<Self> {
        if find_unquoted(id, LEGACY_DELIMITER).is_none() {
            return Self::parse(id);
        }
        let pieces = split_unquoted(id, LEGACY_DELIMITER);
        if pieces.len() != 4 {
            return Err(ProviderError::malformed(
                id,
                "expected database|schema|name|argument-types",
            ));
        }
        let inner = SchemaObjectIdentifier::from_resource_id(&pieces[..3].join("|"))?;
        let types = pieces[3]
            .split('-')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Ok(inner.with_arguments(types))
    }
}

impl fmt::Display for SchemaObjectIdentifierWithArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fully_qualified_name())
    }
}

impl FromStr for SchemaObjectIdentifierWithArguments {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split `VARCHAR, NUMBER(38, 0)` on top-level commas
pub fn split_argument_types(arguments: &str) -> Vec<String> {
    let mut types = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in arguments.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                types.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    types.push(current);
    types
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Canonical data type name as the platform reports it in signatures:
/// synonyms collapse and precision/length is dropped
pub fn normalize_data_type(data_type: &str) -> String {
    let upper = data_type.trim().to_ascii_uppercase();
    let base = match upper.find('(') {
        Some(idx) => upper[..idx].trim_end().to_string(),
        None => upper,
    };
    let base = base.split_whitespace().collect::<Vec<_>>().join(" ");
    match base.as_str() {
        "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "BYTEINT" | "DECIMAL"
        | "NUMERIC" => "NUMBER".to_string(),
        "STRING" | "TEXT" | "CHAR" | "CHARACTER" | "NCHAR" | "NVARCHAR" | "NVARCHAR2"
        | "CHAR VARYING" | "NCHAR VARYING" => "VARCHAR".to_string(),
        "FLOAT4" | "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" | "REAL" => "FLOAT".to_string(),
        "DATETIME" => "TIMESTAMP_NTZ".to_string(),
        "VARBINARY" => "BINARY".to_string(),
        _ => base,
    }
}

/// Organization-qualified account, used for replication targets
/// (`ORG.ACCOUNT`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountIdentifier {
    organization: String,
    account: String,
}

impl AccountIdentifier {
    pub fn new(organization: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            account: account.into(),
        }
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

impl ObjectIdentifier for AccountIdentifier {
    const PARTS: usize = 2;
    const LEVEL: &'static str = "account";

    fn from_parts(mut parts: Vec<String>) -> Self {
        let account = parts.remove(1);
        Self {
            organization: parts.remove(0),
            account,
        }
    }

    fn parts(&self) -> Vec<&str> {
        vec![self.organization.as_str(), self.account.as_str()]
    }

    fn name(&self) -> &str {
        &self.account
    }
}

impl_identifier_traits!(AccountIdentifier);

impl Serialize for AccountIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.fully_qualified_name())
    }
}

/// Object owned by another account, such as a share (`ORG.ACCOUNT.SHARE`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalObjectIdentifier {
    account: AccountIdentifier,
    name: String,
}

impl ExternalObjectIdentifier {
    pub fn account(&self) -> &AccountIdentifier {
        &self.account
    }
}

impl ObjectIdentifier for ExternalObjectIdentifier {
    const PARTS: usize = 3;
    const LEVEL: &'static str = "external object";

    fn from_parts(mut parts: Vec<String>) -> Self {
        let name = parts.remove(2);
        Self {
            account: AccountIdentifier::from_parts(parts),
            name,
        }
    }

    fn parts(&self) -> Vec<&str> {
        let mut parts = self.account.parts();
        parts.push(self.name.as_str());
        parts
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl_identifier_traits!(ExternalObjectIdentifier);

/// Any identifier a platform call can address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    Account(AccountObjectIdentifier),
    Database(DatabaseObjectIdentifier),
    SchemaObject(SchemaObjectIdentifier),
    SchemaObjectWithArguments(SchemaObjectIdentifierWithArguments),
    /// The account (or organization account) the session is connected to
    Current,
}

impl Identifier {
    pub fn name(&self) -> &str {
        match self {
            Identifier::Account(id) => id.name(),
            Identifier::Database(id) => id.name(),
            Identifier::SchemaObject(id) => id.name(),
            Identifier::SchemaObjectWithArguments(id) => id.name(),
            Identifier::Current => "CURRENT",
        }
    }

    pub fn fully_qualified_name(&self) -> String {
        match self {
            Identifier::Account(id) => id.fully_qualified_name(),
            Identifier::Database(id) => id.fully_qualified_name(),
            Identifier::SchemaObject(id) => id.fully_qualified_name(),
            Identifier::SchemaObjectWithArguments(id) => id.fully_qualified_name(),
            Identifier::Current => "CURRENT".to_string(),
        }
    }

    /// Unquoted path parts, leaf last
    pub fn parts(&self) -> Vec<&str> {
        match self {
            Identifier::Account(id) => id.parts(),
            Identifier::Database(id) => id.parts(),
            Identifier::SchemaObject(id) => id.parts(),
            Identifier::SchemaObjectWithArguments(id) => id.schema_object_id().parts(),
            Identifier::Current => vec![],
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fully_qualified_name())
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.fully_qualified_name())
    }
}

impl From<AccountObjectIdentifier> for Identifier {
    fn from(id: AccountObjectIdentifier) -> Self {
        Identifier::Account(id)
    }
}

impl From<DatabaseObjectIdentifier> for Identifier {
    fn from(id: DatabaseObjectIdentifier) -> Self {
        Identifier::Database(id)
    }
}

impl From<SchemaObjectIdentifier> for Identifier {
    fn from(id: SchemaObjectIdentifier) -> Self {
        Identifier::SchemaObject(id)
    }
}

impl From<SchemaObjectIdentifierWithArguments> for Identifier {
    fn from(id: SchemaObjectIdentifierWithArguments) -> Self {
        Identifier::SchemaObjectWithArguments(id)
    }
}

/// Structural equality of two identifier strings of any depth
pub fn same_identifier(a: &str, b: &str) -> bool {
    match (parse_parts(a), parse_parts(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}

/// Canonical (fully quoted) form of an identifier string, or the trimmed
/// input when it does not parse
pub fn canonical_identifier(input: &str) -> String {
    match parse_parts(input) {
        Ok(parts) => parts.iter().map(|p| quote(p)).collect::<Vec<_>>().join("."),
        Err(_) => input.trim().to_string(),
    }
}

/// Validates that a string parses as an identifier with the given depth
pub struct IdentifierValidator {
    pub parts: std::ops::RangeInclusive<usize>,
}

impl IdentifierValidator {
    pub fn exact(parts: usize) -> Self {
        Self {
            parts: parts..=parts,
        }
    }
}

impl Validator for IdentifierValidator {
    fn description(&self) -> String {
        format!(
            "identifier with {} to {} parts",
            self.parts.start(),
            self.parts.end()
        )
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Diagnostics) {
        let Some(s) = value.as_str() else { return };
        match parse_parts(s) {
            Ok(parts) if self.parts.contains(&parts.len()) => {}
            Ok(parts) => diagnostics.add_attribute_error(
                path.clone(),
                "Invalid identifier",
                format!(
                    "{:?} has {} part(s), expected {}",
                    s,
                    parts.len(),
                    self.description()
                ),
            ),
            Err(e) => diagnostics.add_attribute_error(path.clone(), "Invalid identifier", e.to_string()),
        }
    }
}

/// Keeps the prior value when the planned identifier differs only in quoting
pub struct SuppressIdentifierQuoting;

impl PlanModifier for SuppressIdentifierQuoting {
    fn description(&self) -> String {
        "quoting differences in identifiers are ignored".to_string()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let plan_value = match (&request.state, &request.plan) {
            (Dynamic::String(prior), Dynamic::String(planned))
                if prior != planned && same_identifier(prior, planned) =>
            {
                request.state.clone()
            }
            _ => request.plan.clone(),
        };
        PlanModifyResponse {
            plan_value,
            requires_replace: false,
            diagnostics: Diagnostics::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_and_unquoted_parts_are_equal() {
        let a = SchemaObjectIdentifier::parse("\"DB\".\"SCH\".\"T\"").unwrap();
        let b = SchemaObjectIdentifier::parse("DB.SCH.T").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fully_qualified_name(), "\"DB\".\"SCH\".\"T\"");
    }

    #[test]
    fn unquoted_parts_stay_case_sensitive() {
        let lower = AccountObjectIdentifier::parse("wh").unwrap();
        let upper = AccountObjectIdentifier::parse("WH").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn quoted_parts_may_contain_dots_and_quotes() {
        let id = SchemaObjectIdentifier::parse("\"my.db\".\"sch\".\"a\"\"b\"").unwrap();
        assert_eq!(id.database(), "my.db");
        assert_eq!(id.name(), "a\"b");
        assert_eq!(id.fully_qualified_name(), "\"my.db\".\"sch\".\"a\"\"b\"");
    }

    #[test]
    fn format_then_parse_is_identity() {
        let id = SchemaObjectIdentifier::new("Db", "with space", "x\"y");
        let reparsed = SchemaObjectIdentifier::parse(&id.fully_qualified_name()).unwrap();
        assert_eq!(reparsed, id);
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        for input in ["", "a..b", "\"open", "\"a\"b", "a\"b", "a."] {
            let err = parse_parts(input).unwrap_err();
            assert!(
                matches!(err, ProviderError::MalformedIdentifier { .. }),
                "{input:?} should be malformed"
            );
        }
    }

    #[test]
    fn wrong_depth_is_rejected() {
        assert!(AccountObjectIdentifier::parse("DB.SCH").is_err());
        assert!(SchemaObjectIdentifier::parse("DB.SCH").is_err());
    }

    #[test]
    fn legacy_pipe_ids_decode() {
        let id = SchemaObjectIdentifier::from_resource_id("DB|SCH|STREAM").unwrap();
        assert_eq!(id, SchemaObjectIdentifier::new("DB", "SCH", "STREAM"));

        let current = SchemaObjectIdentifier::from_resource_id("\"DB\".\"SCH\".\"STREAM\"").unwrap();
        assert_eq!(current, id);
        assert!(SchemaObjectIdentifier::from_resource_id("DB|SCH").is_err());
    }

    #[test]
    fn identifier_with_arguments_round_trips() {
        let id =
            SchemaObjectIdentifierWithArguments::parse("\"DB\".\"SCH\".\"PROC\"(varchar(100), NUMBER(38, 0))")
                .unwrap();
        assert_eq!(id.argument_types(), ["VARCHAR", "NUMBER"]);
        assert_eq!(
            id.fully_qualified_name(),
            "\"DB\".\"SCH\".\"PROC\"(VARCHAR, NUMBER)"
        );
        assert_eq!(
            SchemaObjectIdentifierWithArguments::parse(&id.fully_qualified_name()).unwrap(),
            id
        );
    }

    #[test]
    fn identifier_without_arguments_has_empty_signature() {
        let id = SchemaObjectIdentifierWithArguments::parse("DB.SCH.PROC()").unwrap();
        assert!(id.argument_types().is_empty());
        assert_eq!(id.signature(), "()");
    }

    #[test]
    fn legacy_procedure_ids_decode() {
        let id = SchemaObjectIdentifierWithArguments::from_resource_id("DB|SCH|PROC|VARCHAR-INT").unwrap();
        assert_eq!(id.argument_types(), ["VARCHAR", "NUMBER"]);
    }

    #[test]
    fn data_type_synonyms_collapse() {
        assert_eq!(normalize_data_type("int"), "NUMBER");
        assert_eq!(normalize_data_type("String"), "VARCHAR");
        assert_eq!(normalize_data_type("double precision"), "FLOAT");
        assert_eq!(normalize_data_type("TIMESTAMP_LTZ(9)"), "TIMESTAMP_LTZ");
    }

    #[test]
    fn account_and_external_identifiers() {
        let share = ExternalObjectIdentifier::parse("ORG.PROVIDER.SALES_SHARE").unwrap();
        assert_eq!(share.account(), &AccountIdentifier::new("ORG", "PROVIDER"));
        assert_eq!(share.name(), "SALES_SHARE");
        assert_eq!(share.to_string(), "\"ORG\".\"PROVIDER\".\"SALES_SHARE\"");
    }

    #[test]
    fn quoting_suppression_keeps_prior_surface_form() {
        let response = SuppressIdentifierQuoting.modify_plan(PlanModifyRequest {
            state: Dynamic::string("RM1"),
            plan: Dynamic::string("\"RM1\""),
            config: Dynamic::string("\"RM1\""),
            attribute_path: AttributePath::new("resource_monitor"),
            resource_exists: true,
        });
        assert_eq!(response.plan_value, Dynamic::string("RM1"));
    }

    #[test]
    fn identifier_validator_checks_depth() {
        let mut diags = Diagnostics::new();
        IdentifierValidator::exact(3).validate(
            &Dynamic::string("DB.SCH"),
            &AttributePath::new("view"),
            &mut diags,
        );
        assert_eq!(diags.errors.len(), 1);
    }
}
