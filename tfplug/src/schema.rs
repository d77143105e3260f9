//! Schema types and builders for tfplug
//!
//! This module provides the schema system for defining resource schemas,
//! including attribute types, validators and plan modifiers, and the
//! plan-time configuration check built on top of them.

use crate::plan_modifier::PlanModifier;
use crate::types::{AttributePath, Diagnostics, Dynamic, DynamicValue};
use crate::validator::{ConfigValidator, Validator};
use std::collections::BTreeMap;
use std::sync::Arc;

/// AttributeType defines the type system for attributes
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),                // Ordered, allows duplicates
    Set(Box<AttributeType>),                 // Unordered, no duplicates
    Map(Box<AttributeType>),                 // String keys only
    Object(BTreeMap<String, AttributeType>), // Fixed structure
}

impl AttributeType {
    /// Shorthand for an object type built from `(name, type)` pairs
    pub fn object(fields: &[(&str, AttributeType)]) -> Self {
        AttributeType::Object(
            fields
                .iter()
                .map(|(name, ty)| (name.to_string(), ty.clone()))
                .collect(),
        )
    }

    /// Whether a known value conforms to this type
    pub fn accepts(&self, value: &Dynamic) -> bool {
        match (self, value) {
            (_, Dynamic::Null) | (_, Dynamic::Unknown) => true,
            (AttributeType::String, Dynamic::String(_)) => true,
            (AttributeType::Number, Dynamic::Number(_)) => true,
            (AttributeType::Bool, Dynamic::Bool(_)) => true,
            (AttributeType::List(elem), Dynamic::List(items))
            | (AttributeType::Set(elem), Dynamic::List(items)) => {
                items.iter().all(|item| elem.accepts(item))
            }
            (AttributeType::Map(elem), Dynamic::Map(entries)) => {
                entries.values().all(|v| elem.accepts(v))
            }
            (AttributeType::Object(fields), Dynamic::Map(entries)) => {
                entries.iter().all(|(k, v)| {
                    fields
                        .get(k)
                        .is_some_and(|field_type| field_type.accepts(v))
                })
            }
            _ => false,
        }
    }
}

/// Schema is returned by resources
/// Version is used for state migration
#[derive(Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

/// Block represents the root configuration block
#[derive(Clone)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub config_validators: Vec<Arc<dyn ConfigValidator>>,
    pub description: String,
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
}

// Manual Debug implementation since validators/modifiers don't implement Debug
impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field(
                "validators",
                &format!("{} validators", self.validators.len()),
            )
            .field(
                "plan_modifiers",
                &format!("{} plan modifiers", self.plan_modifiers.len()),
            )
            .finish()
    }
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }

    /// Plan-time configuration check: presence, types, attribute
    /// validators and configuration validators
    pub fn validate_config(&self, config: &DynamicValue) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();

        for attribute in &self.block.attributes {
            let path = AttributePath::new(&attribute.name);
            let value = config.attr(&attribute.name);

            if value.is_null() {
                if attribute.required {
                    diagnostics.add_attribute_error(
                        path,
                        "Missing required attribute",
                        format!("The attribute \"{}\" is required", attribute.name),
                    );
                }
                continue;
            }

            if attribute.computed && !attribute.optional && !attribute.required {
                diagnostics.add_attribute_error(
                    path,
                    "Invalid configuration",
                    format!(
                        "\"{}\" is computed by the provider and cannot be set",
                        attribute.name
                    ),
                );
                continue;
            }

            if !attribute.r#type.accepts(value) {
                diagnostics.add_attribute_error(
                    path,
                    "Incorrect attribute value type",
                    format!(
                        "\"{}\" expects {:?}, got {}",
                        attribute.name,
                        attribute.r#type,
                        value.type_name()
                    ),
                );
                continue;
            }

            if value.is_unknown() {
                continue;
            }

            for validator in &attribute.validators {
                validator.validate(value, &path, &mut diagnostics);
                // Scalar validators on collections apply per element
                if let Dynamic::List(items) = value {
                    for (idx, item) in items.iter().enumerate() {
                        if item.is_known() && !matches!(item, Dynamic::Map(_) | Dynamic::List(_)) {
                            let item_path = path.clone().index(idx as i64);
                            validator.validate(item, &item_path, &mut diagnostics);
                        }
                    }
                }
            }
        }

        for validator in &self.block.config_validators {
            validator.validate(config, &mut diagnostics);
        }

        diagnostics
    }
}

/// AttributeBuilder provides fluent API for building attributes
/// ALWAYS use this instead of constructing Attribute directly
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    /// Mark as sensitive (hidden)
    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.attribute.validators.push(validator);
        self
    }

    pub fn plan_modifier(mut self, modifier: Arc<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(modifier);
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// SchemaBuilder provides fluent API for building schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block {
                    attributes: Vec::new(),
                    config_validators: Vec::new(),
                    description: String::new(),
                },
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn config_validator(mut self, validator: Arc<dyn ConfigValidator>) -> Self {
        self.schema.block.config_validators.push(validator);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
