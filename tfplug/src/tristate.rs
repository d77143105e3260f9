//! Tri-state attribute values
//!
//! Every attribute read from a plan, configuration or state is either set to a
//! concrete value, explicitly null, or unknown until apply. [`TriState`] keeps
//! the three cases apart so that callers can never treat an unknown value as
//! absent.

use crate::error::{Result, TfplugError};
use crate::types::{Dynamic, DynamicValue};

#[derive(Debug, Clone, PartialEq)]
pub enum TriState<T> {
    Set(T),
    Null,
    Unknown,
}

impl<T> TriState<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, TriState::Set(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TriState::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TriState::Unknown)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            TriState::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_set(self) -> Option<T> {
        match self {
            TriState::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TriState<U> {
        match self {
            TriState::Set(v) => TriState::Set(f(v)),
            TriState::Null => TriState::Null,
            TriState::Unknown => TriState::Unknown,
        }
    }
}

/// Conversion from a known, non-null dynamic value
pub trait FromDynamic: Sized {
    const TYPE_NAME: &'static str;

    fn from_dynamic(value: &Dynamic) -> Option<Self>;
}

impl FromDynamic for String {
    const TYPE_NAME: &'static str = "string";

    fn from_dynamic(value: &Dynamic) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromDynamic for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_dynamic(value: &Dynamic) -> Option<Self> {
        value.as_bool()
    }
}

impl FromDynamic for f64 {
    const TYPE_NAME: &'static str = "number";

    fn from_dynamic(value: &Dynamic) -> Option<Self> {
        value.as_number()
    }
}

impl FromDynamic for i64 {
    const TYPE_NAME: &'static str = "whole number";

    fn from_dynamic(value: &Dynamic) -> Option<Self> {
        value
            .as_number()
            .filter(|n| n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64)
            .map(|n| n as i64)
    }
}

impl FromDynamic for Vec<String> {
    const TYPE_NAME: &'static str = "list of string";

    fn from_dynamic(value: &Dynamic) -> Option<Self> {
        value
            .as_list()?
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect()
    }
}

impl FromDynamic for Dynamic {
    const TYPE_NAME: &'static str = "any";

    fn from_dynamic(value: &Dynamic) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: FromDynamic> TriState<T> {
    pub fn from_dynamic(value: &Dynamic) -> Result<Self> {
        match value {
            Dynamic::Null => Ok(TriState::Null),
            Dynamic::Unknown => Ok(TriState::Unknown),
            other => T::from_dynamic(other)
                .map(TriState::Set)
                .ok_or_else(|| TfplugError::TypeMismatch {
                    expected: T::TYPE_NAME.to_string(),
                    actual: other.type_name().to_string(),
                }),
        }
    }
}

impl DynamicValue {
    /// Tri-state view of a top-level attribute
    pub fn tri<T: FromDynamic>(&self, name: &str) -> Result<TriState<T>> {
        TriState::from_dynamic(self.attr(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_unknown_stay_distinct() {
        let mut dv = DynamicValue::object();
        dv.set_attr("comment", Dynamic::Null);
        dv.set_attr("warehouse_size", Dynamic::Unknown);

        assert_eq!(dv.tri::<String>("comment").unwrap(), TriState::Null);
        assert_eq!(dv.tri::<String>("warehouse_size").unwrap(), TriState::Unknown);
        assert_eq!(dv.tri::<String>("missing").unwrap(), TriState::Null);
    }

    #[test]
    fn whole_numbers_reject_fractions() {
        let err = TriState::<i64>::from_dynamic(&Dynamic::Number(1.5)).unwrap_err();
        assert!(matches!(err, TfplugError::TypeMismatch { .. }));
        assert_eq!(
            TriState::<i64>::from_dynamic(&Dynamic::Number(60.0)).unwrap(),
            TriState::Set(60)
        );
    }

    #[test]
    fn string_lists_require_string_elements() {
        let value = Dynamic::List(vec![Dynamic::string("A"), Dynamic::Bool(true)]);
        assert!(TriState::<Vec<String>>::from_dynamic(&value).is_err());
    }
}
