//! Attribute marshaling
//!
//! Every resource describes its platform-backed attributes with a static
//! table of [`AttributeSpec`]s. The table drives the CREATE payload, the
//! SET/UNSET batches of an update, and the observation of platform values.
//! Conversion errors are collected across all attributes so one failed call
//! reports every invalid value at once.

use crate::api::{AlterOptions, CreateOptions, ObjectDetails, PropertyMap};
use crate::error::{ProviderError, Result};
use crate::identifier::canonical_identifier;
use crate::parameters::{ParameterSpec, ParameterType};
use serde_json::Value;
use std::collections::BTreeMap;
use tfplug::{Dynamic, DynamicValue};

/// Value domain of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    /// String restricted to a fixed domain of platform spellings
    Enum(&'static [&'static str]),
    /// Whole number
    Number,
    Bool,
    /// Object identifier, compared structurally
    Identifier,
    StringSet,
    IdentifierSet,
    StringMap,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Str(&'static str),
    Int(i64),
    Bool(bool),
}

impl DefaultValue {
    fn to_json(self) -> Value {
        match self {
            DefaultValue::Str(s) => Value::String(s.to_string()),
            DefaultValue::Int(n) => Value::from(n),
            DefaultValue::Bool(b) => Value::Bool(b),
        }
    }
}

/// What removing the attribute from configuration issues
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OnUnset {
    Unset,
    /// The platform has no UNSET for the attribute; SET its documented default
    SetDefault(DefaultValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Property,
    Parameter,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeSpec {
    pub attribute: &'static str,
    /// Platform property name or parameter key
    pub key: &'static str,
    pub kind: ValueKind,
    pub origin: Origin,
    pub on_unset: OnUnset,
    /// Changes block until provisioning completes
    pub wait_for_completion: bool,
    /// Sent on create, never altered afterwards
    pub create_only: bool,
    /// Reported by the platform, never sent
    pub computed: bool,
    /// Read back from the platform for drift detection
    pub observed: bool,
}

impl AttributeSpec {
    pub const fn property(attribute: &'static str, kind: ValueKind) -> Self {
        Self {
            attribute,
            key: attribute,
            kind,
            origin: Origin::Property,
            on_unset: OnUnset::Unset,
            wait_for_completion: false,
            create_only: false,
            computed: false,
            observed: true,
        }
    }

    pub const fn parameter(attribute: &'static str, key: &'static str, kind: ValueKind) -> Self {
        Self {
            key,
            origin: Origin::Parameter,
            ..Self::property(attribute, kind)
        }
    }

    pub const fn read_only(attribute: &'static str, kind: ValueKind) -> Self {
        Self {
            computed: true,
            ..Self::property(attribute, kind)
        }
    }

    pub const fn key(mut self, key: &'static str) -> Self {
        self.key = key;
        self
    }

    pub const fn unset_to(mut self, default: DefaultValue) -> Self {
        self.on_unset = OnUnset::SetDefault(default);
        self
    }

    pub const fn waits(mut self) -> Self {
        self.wait_for_completion = true;
        self
    }

    pub const fn only_on_create(mut self) -> Self {
        self.create_only = true;
        self
    }

    /// Not reported back by the platform
    pub const fn write_only(mut self) -> Self {
        self.observed = false;
        self
    }

    pub fn parameter_spec(&self) -> Option<ParameterSpec> {
        if self.origin != Origin::Parameter {
            return None;
        }
        let kind = match self.kind {
            ValueKind::Number => ParameterType::Number,
            ValueKind::Bool => ParameterType::Bool,
            _ => ParameterType::String,
        };
        Some(ParameterSpec {
            key: self.key,
            attribute: self.attribute,
            kind,
        })
    }
}

pub fn parameter_specs(specs: &[AttributeSpec]) -> Vec<ParameterSpec> {
    specs.iter().filter_map(AttributeSpec::parameter_spec).collect()
}

/// Domain spelling of `raw`, ignoring case and `-`/`_`/space separators
pub fn normalize_enum(domain: &[&'static str], raw: &str) -> Option<&'static str> {
    let squash = |s: &str| -> String {
        s.chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_uppercase)
            .collect()
    };
    let wanted = squash(raw);
    domain.iter().copied().find(|candidate| squash(candidate) == wanted)
}

fn canonical_element(kind: ValueKind, element: &str) -> String {
    match kind {
        ValueKind::IdentifierSet => canonical_identifier(element),
        _ => element.trim().to_string(),
    }
}

fn sorted_elements(kind: ValueKind, items: &[Dynamic]) -> std::result::Result<Vec<String>, String> {
    let mut elements = items
        .iter()
        .map(|item| {
            item.as_str()
                .map(|s| canonical_element(kind, s))
                .ok_or_else(|| format!("expected a set of strings, got {}", item.type_name()))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    elements.sort();
    elements.dedup();
    Ok(elements)
}

/// Integer form of a number, rejecting fractions and values outside `i64`
pub fn whole_number(key: &str, n: f64) -> Result<i64> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Ok(n as i64)
    } else {
        Err(ProviderError::InvalidParameter {
            key: key.to_string(),
            value: n.to_string(),
            expected: "a whole number",
        })
    }
}

/// Platform payload for a known value
pub fn to_platform(spec: &AttributeSpec, value: &Dynamic) -> std::result::Result<Value, String> {
    let mismatch = |expected: &str| format!("expected {}, got {}", expected, value.type_name());

    match (spec.kind, value) {
        (_, Dynamic::Unknown) => Err("value is not known at apply time".to_string()),
        (_, Dynamic::Null) => Ok(Value::Null),
        (ValueKind::String, Dynamic::String(s)) => Ok(Value::String(s.clone())),
        (ValueKind::Enum(domain), Dynamic::String(s)) => normalize_enum(domain, s)
            .map(|v| Value::String(v.to_string()))
            .ok_or_else(|| format!("{:?} is not one of {}", s, domain.join(", "))),
        (ValueKind::Number, Dynamic::Number(n)) => whole_number(spec.attribute, *n)
            .map(Value::from)
            .map_err(|e| e.to_string()),
        (ValueKind::Bool, Dynamic::Bool(b)) => Ok(Value::Bool(*b)),
        (ValueKind::Identifier, Dynamic::String(s)) => crate::identifier::parse_parts(s)
            .map(|_| Value::String(canonical_identifier(s)))
            .map_err(|e| e.to_string()),
        (ValueKind::StringSet | ValueKind::IdentifierSet, Dynamic::List(items)) => {
            if spec.kind == ValueKind::IdentifierSet {
                for item in items {
                    if let Some(s) = item.as_str() {
                        crate::identifier::parse_parts(s).map_err(|e| e.to_string())?;
                    }
                }
            }
            Ok(Value::from(sorted_elements(spec.kind, items)?))
        }
        (ValueKind::StringMap, Dynamic::Map(entries)) => entries
            .iter()
            .map(|(k, v)| match v {
                Dynamic::String(s) => Ok((k.clone(), Value::String(s.clone()))),
                other => Err(format!("map value for {} must be a string, got {}", k, other.type_name())),
            })
            .collect::<std::result::Result<serde_json::Map<_, _>, _>>()
            .map(Value::Object),
        (ValueKind::String | ValueKind::Enum(_) | ValueKind::Identifier, _) => Err(mismatch("a string")),
        (ValueKind::Number, _) => Err(mismatch("a number")),
        (ValueKind::Bool, _) => Err(mismatch("a bool")),
        (ValueKind::StringSet | ValueKind::IdentifierSet, _) => Err(mismatch("a set")),
        (ValueKind::StringMap, _) => Err(mismatch("a map")),
    }
}

/// Public-state form of a platform-reported property
pub fn from_platform(spec: &AttributeSpec, details: &ObjectDetails, current: &Dynamic) -> Dynamic {
    match spec.kind {
        ValueKind::String => details.string(spec.key).map(Dynamic::String).unwrap_or(Dynamic::Null),
        ValueKind::Enum(_) => details
            .string(spec.key)
            .map(|s| normalize_public(spec, Dynamic::String(s)))
            .unwrap_or(Dynamic::Null),
        ValueKind::Number => details
            .number(spec.key)
            .map(|n| Dynamic::Number(n as f64))
            .unwrap_or(Dynamic::Null),
        ValueKind::Bool => details.bool(spec.key).map(Dynamic::Bool).unwrap_or(Dynamic::Null),
        ValueKind::Identifier => details
            .string(spec.key)
            .map(|s| Dynamic::String(canonical_identifier(&s)))
            .unwrap_or(Dynamic::Null),
        ValueKind::StringSet | ValueKind::IdentifierSet => match details.string_list(spec.key) {
            Some(elements) if !elements.is_empty() => merge_set_surface(spec.kind, elements, current),
            _ => Dynamic::Null,
        },
        ValueKind::StringMap => Dynamic::Null,
    }
}

/// Enum values take their domain spelling; anything else passes through
pub fn normalize_public(spec: &AttributeSpec, value: Dynamic) -> Dynamic {
    match (spec.kind, &value) {
        (ValueKind::Enum(domain), Dynamic::String(s)) => normalize_enum(domain, s)
            .map(Dynamic::string)
            .unwrap_or_else(|| Dynamic::String(s.to_ascii_uppercase())),
        _ => value,
    }
}

/// Sorted set of observed elements where an element equal to one already in
/// `current` keeps the surface form from `current`
pub fn merge_set_surface(kind: ValueKind, observed: Vec<String>, current: &Dynamic) -> Dynamic {
    let known: BTreeMap<String, String> = current
        .as_list()
        .unwrap_or_default()
        .iter()
        .filter_map(Dynamic::as_str)
        .map(|s| (canonical_element(kind, s), s.to_string()))
        .collect();

    let mut merged: BTreeMap<String, String> = BTreeMap::new();
    for element in observed {
        let canonical = canonical_element(kind, &element);
        let surface = known.get(&canonical).cloned().unwrap_or_else(|| canonical.clone());
        merged.insert(canonical, surface);
    }
    Dynamic::List(merged.into_values().map(Dynamic::String).collect())
}

/// Scalar recorded in the snapshot for a public value; `None` for null
pub fn snapshot_form(spec: &AttributeSpec, value: &Dynamic) -> Option<Value> {
    match (spec.kind, value) {
        (_, Dynamic::Null | Dynamic::Unknown) => None,
        (ValueKind::StringSet | ValueKind::IdentifierSet, Dynamic::List(items)) => {
            sorted_elements(spec.kind, items).ok().map(|e| Value::String(e.join(",")))
        }
        (ValueKind::StringMap, _) => None,
        _ => to_platform(spec, value).ok().filter(|v| !v.is_null()),
    }
}

fn validation(errors: Vec<String>) -> ProviderError {
    ProviderError::Validation(errors)
}

/// Builds the CREATE payload from a plan
pub struct CreateBuilder<'a> {
    plan: &'a DynamicValue,
    properties: PropertyMap,
    errors: Vec<String>,
}

impl<'a> CreateBuilder<'a> {
    pub fn new(plan: &'a DynamicValue) -> Self {
        Self {
            plan,
            properties: PropertyMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn attributes(mut self, specs: &[AttributeSpec]) -> Self {
        for spec in specs.iter().filter(|s| !s.computed) {
            let value = self.plan.attr(spec.attribute);
            if value.is_null() {
                continue;
            }
            match to_platform(spec, value) {
                Ok(v) => {
                    self.properties.insert(spec.key.to_string(), v);
                }
                Err(e) => self.errors.push(format!("{}: {}", spec.attribute, e)),
            }
        }
        self
    }

    pub fn property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    pub fn build(self) -> Result<CreateOptions> {
        if !self.errors.is_empty() {
            return Err(validation(self.errors));
        }
        Ok(CreateOptions {
            properties: self.properties,
        })
    }
}

/// SET and UNSET batches of one update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub set: PropertyMap,
    pub unset: Vec<String>,
    pub wait_for_completion: bool,
    /// Attributes carried by the SET batch
    pub set_attributes: Vec<String>,
    /// Attributes carried by the UNSET batch
    pub unset_attributes: Vec<String>,
    errors: Vec<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairwise comparison of plan and prior state for every settable,
    /// non-create-only attribute
    pub fn diff(specs: &[AttributeSpec], prior: &DynamicValue, plan: &DynamicValue) -> Self {
        let mut changes = Self::new();
        for spec in specs.iter().filter(|s| !s.computed && !s.create_only) {
            changes.compare(spec, prior.attr(spec.attribute), plan.attr(spec.attribute));
        }
        changes
    }

    pub fn compare(&mut self, spec: &AttributeSpec, prior: &Dynamic, planned: &Dynamic) {
        let planned_value = match to_platform(spec, planned) {
            Ok(v) => v,
            Err(e) => {
                self.errors.push(format!("{}: {}", spec.attribute, e));
                return;
            }
        };
        // A prior value that no longer marshals is treated as different
        let prior_value = to_platform(spec, prior).ok();

        match (prior_value, planned_value) {
            (Some(p), v) if p == v => {}
            (_, Value::Null) if prior.is_null() => {}
            (_, Value::Null) => match spec.on_unset {
                OnUnset::Unset => self.unset_key(spec),
                OnUnset::SetDefault(default) => self.set_key(spec, default.to_json()),
            },
            (_, v) => self.set_key(spec, v),
        }
    }

    fn set_key(&mut self, spec: &AttributeSpec, value: Value) {
        self.set.insert(spec.key.to_string(), value);
        self.set_attributes.push(spec.attribute.to_string());
        self.wait_for_completion |= spec.wait_for_completion;
    }

    fn unset_key(&mut self, spec: &AttributeSpec) {
        self.unset.push(spec.key.to_string());
        self.unset_attributes.push(spec.attribute.to_string());
    }

    /// SET a property outside the attribute table
    pub fn set(&mut self, attribute: &str, key: &str, value: Value) {
        self.set.insert(key.to_string(), value);
        self.set_attributes.push(attribute.to_string());
    }

    pub fn error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Fails with every accumulated conversion error
    pub fn validate(self) -> Result<Self> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(validation(self.errors))
        }
    }

    pub fn set_batch(&self) -> Option<AlterOptions> {
        (!self.set.is_empty()).then(|| AlterOptions::Set {
            properties: self.set.clone(),
            wait_for_completion: self.wait_for_completion,
        })
    }

    pub fn unset_batch(&self) -> Option<AlterOptions> {
        (!self.unset.is_empty()).then(|| AlterOptions::Unset {
            properties: self.unset.clone(),
        })
    }
}
