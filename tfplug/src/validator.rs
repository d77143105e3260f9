//! Attribute and configuration validators run at plan time

use crate::types::{AttributePath, Diagnostics, Dynamic, DynamicValue};

/// Validates a single attribute value
/// Only called with known, non-null values
pub trait Validator: Send + Sync {
    fn description(&self) -> String;

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Diagnostics);
}

/// Validates relationships between attributes of one configuration
pub trait ConfigValidator: Send + Sync {
    fn description(&self) -> String;

    fn validate(&self, config: &DynamicValue, diagnostics: &mut Diagnostics);
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        format!("string length between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Diagnostics) {
        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if let Some(min) = self.min {
                if len < min {
                    diagnostics.add_attribute_error(
                        path.clone(),
                        format!("{} must have minimum length of {}", path, min),
                        format!("Got length {}", len),
                    );
                }
            }
            if let Some(max) = self.max {
                if len > max {
                    diagnostics.add_attribute_error(
                        path.clone(),
                        format!("{} must have maximum length of {}", path, max),
                        format!("Got length {}", len),
                    );
                }
            }
        }
    }
}

pub struct StringPatternValidator {
    pub pattern: regex::Regex,
    pub description: String,
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Diagnostics) {
        if let Some(s) = value.as_str() {
            if !self.pattern.is_match(s) {
                diagnostics.add_attribute_error(
                    path.clone(),
                    format!("{} must match {}", path, self.description),
                    format!("Value '{}' does not match pattern", s),
                );
            }
        }
    }
}

/// Restricts a string to a fixed domain
pub struct OneOfValidator {
    pub allowed: Vec<String>,
    pub case_insensitive: bool,
}

impl OneOfValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            case_insensitive: false,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    fn matches(&self, s: &str) -> bool {
        self.allowed.iter().any(|a| {
            if self.case_insensitive {
                a.eq_ignore_ascii_case(s)
            } else {
                a == s
            }
        })
    }
}

impl Validator for OneOfValidator {
    fn description(&self) -> String {
        format!("one of {}", self.allowed.join(", "))
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Diagnostics) {
        if let Some(s) = value.as_str() {
            if !self.matches(s) {
                diagnostics.add_attribute_error(
                    path.clone(),
                    format!("Invalid value for {}", path),
                    format!("'{}' is not {}", s, self.description()),
                );
            }
        }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        format!("number between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Diagnostics) {
        if let Some(n) = value.as_number() {
            if let Some(min) = self.min {
                if n < min {
                    diagnostics.add_attribute_error(
                        path.clone(),
                        format!("{} must be at least {}", path, min),
                        format!("Got {}", n),
                    );
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    diagnostics.add_attribute_error(
                        path.clone(),
                        format!("{} must be at most {}", path, max),
                        format!("Got {}", n),
                    );
                }
            }
        }
    }
}

/// Element count bounds for lists and sets
pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for ListLengthValidator {
    fn description(&self) -> String {
        format!("between {:?} and {:?} items", self.min, self.max)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Diagnostics) {
        if let Dynamic::List(items) = value {
            if let Some(min) = self.min {
                if items.len() < min {
                    diagnostics.add_attribute_error(
                        path.clone(),
                        format!("{} must have at least {} items", path, min),
                        format!("Got {} items", items.len()),
                    );
                }
            }
            if let Some(max) = self.max {
                if items.len() > max {
                    diagnostics.add_attribute_error(
                        path.clone(),
                        format!("{} must have at most {} items", path, max),
                        format!("Got {} items", items.len()),
                    );
                }
            }
        }
    }
}

/// Exactly one of the named top-level attributes must be set
///
/// Unknown values count as possibly set, so the check is deferred when the
/// outcome depends on them.
pub struct ExactlyOneOf {
    pub attributes: Vec<String>,
}

impl ExactlyOneOf {
    pub fn new(attributes: &[&str]) -> Self {
        Self {
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl ConfigValidator for ExactlyOneOf {
    fn description(&self) -> String {
        format!("exactly one of {}", self.attributes.join(", "))
    }

    fn validate(&self, config: &DynamicValue, diagnostics: &mut Diagnostics) {
        let set = self
            .attributes
            .iter()
            .filter(|a| config.attr(a).is_known())
            .count();
        let unknown = self
            .attributes
            .iter()
            .filter(|a| config.attr(a).is_unknown())
            .count();

        if set > 1 {
            diagnostics.add_error(
                "Conflicting attributes",
                Some(format!(
                    "only one of {} may be set",
                    self.attributes.join(", ")
                )),
            );
        } else if set == 0 && unknown == 0 {
            diagnostics.add_error(
                "Missing required attribute",
                Some(format!(
                    "exactly one of {} must be set",
                    self.attributes.join(", ")
                )),
            );
        }
    }
}

/// `attribute` may not be combined with any of `conflicts`
pub struct ConflictsWith {
    pub attribute: String,
    pub conflicts: Vec<String>,
}

impl ConflictsWith {
    pub fn new(attribute: &str, conflicts: &[&str]) -> Self {
        Self {
            attribute: attribute.to_string(),
            conflicts: conflicts.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl ConfigValidator for ConflictsWith {
    fn description(&self) -> String {
        format!("{} conflicts with {}", self.attribute, self.conflicts.join(", "))
    }

    fn validate(&self, config: &DynamicValue, diagnostics: &mut Diagnostics) {
        if config.attr(&self.attribute).is_null() {
            return;
        }
        for other in &self.conflicts {
            if !config.attr(other).is_null() {
                diagnostics.add_attribute_error(
                    AttributePath::new(&self.attribute),
                    "Conflicting attributes",
                    format!("{} cannot be set together with {}", self.attribute, other),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> AttributePath {
        AttributePath::new("attr")
    }

    #[test]
    fn string_length_validator_accepts_valid_length() {
        let validator = StringLengthValidator {
            min: Some(3),
            max: Some(10),
        };
        let mut diags = Diagnostics::new();
        validator.validate(&Dynamic::string("hello"), &path(), &mut diags);
        assert!(diags.errors.is_empty());
    }

    #[test]
    fn string_length_validator_rejects_too_long() {
        let validator = StringLengthValidator {
            min: None,
            max: Some(3),
        };
        let mut diags = Diagnostics::new();
        validator.validate(&Dynamic::string("toolong"), &path(), &mut diags);
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(diags.errors[0].attribute, Some(path()));
    }

    #[test]
    fn pattern_validator_rejects_mismatch() {
        let validator = StringPatternValidator {
            pattern: regex::Regex::new("^[A-Z]+$").unwrap(),
            description: "upper case letters".to_string(),
        };
        let mut diags = Diagnostics::new();
        validator.validate(&Dynamic::string("abc"), &path(), &mut diags);
        assert!(diags.errors[0].summary.contains("upper case letters"));
    }

    #[test]
    fn one_of_validator_honours_case_mode() {
        let strict = OneOfValidator::new(["STANDARD", "ECONOMY"]);
        let relaxed = OneOfValidator::new(["STANDARD", "ECONOMY"]).case_insensitive();

        let mut diags = Diagnostics::new();
        strict.validate(&Dynamic::string("economy"), &path(), &mut diags);
        assert_eq!(diags.errors.len(), 1);

        let mut diags = Diagnostics::new();
        relaxed.validate(&Dynamic::string("economy"), &path(), &mut diags);
        assert!(diags.errors.is_empty());
    }

    #[test]
    fn number_range_validator_rejects_out_of_range() {
        let validator = NumberRangeValidator {
            min: Some(1.0),
            max: Some(10.0),
        };
        let mut diags = Diagnostics::new();
        validator.validate(&Dynamic::Number(11.0), &path(), &mut diags);
        validator.validate(&Dynamic::Number(0.0), &path(), &mut diags);
        assert_eq!(diags.errors.len(), 2);
    }

    #[test]
    fn list_length_validator_enforces_minimum() {
        let validator = ListLengthValidator {
            min: Some(1),
            max: None,
        };
        let mut diags = Diagnostics::new();
        validator.validate(&Dynamic::List(vec![]), &path(), &mut diags);
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn exactly_one_of_reports_none_and_many() {
        let validator = ExactlyOneOf::new(&["a", "b"]);

        let mut diags = Diagnostics::new();
        validator.validate(&DynamicValue::object(), &mut diags);
        assert_eq!(diags.errors[0].summary, "Missing required attribute");

        let mut both = DynamicValue::object();
        both.set_attr("a", Dynamic::string("x"));
        both.set_attr("b", Dynamic::string("y"));
        let mut diags = Diagnostics::new();
        validator.validate(&both, &mut diags);
        assert_eq!(diags.errors[0].summary, "Conflicting attributes");
    }

    #[test]
    fn exactly_one_of_defers_on_unknown() {
        let validator = ExactlyOneOf::new(&["a", "b"]);
        let mut config = DynamicValue::object();
        config.set_attr("a", Dynamic::Unknown);

        let mut diags = Diagnostics::new();
        validator.validate(&config, &mut diags);
        assert!(diags.is_empty());
    }

    #[test]
    fn conflicts_with_flags_pairs() {
        let validator = ConflictsWith::new("at", &["before"]);
        let mut config = DynamicValue::object();
        config.set_attr("at", Dynamic::Map(Default::default()));
        config.set_attr("before", Dynamic::Map(Default::default()));

        let mut diags = Diagnostics::new();
        validator.validate(&config, &mut diags);
        assert_eq!(diags.errors.len(), 1);
    }
}
