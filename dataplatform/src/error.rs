//! Provider error kinds and their rendering as diagnostics

use crate::api::ApiError;
use std::fmt;
use tfplug::{Diagnostic, TfplugError};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("malformed identifier {input:?}: {reason}")]
    MalformedIdentifier { input: String, reason: String },

    #[error("{0}")]
    PlatformNotFound(String),

    #[error(transparent)]
    Platform(ApiError),

    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("parameter {key} has unexpected value {value:?} (expected {expected})")]
    InvalidParameter {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("private state is corrupt: {0}")]
    PrivateStateCorrupt(String),

    #[error("invalid provider configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Framework(#[from] TfplugError),
}

impl ProviderError {
    pub fn malformed(input: &str, reason: impl Into<String>) -> Self {
        ProviderError::MalformedIdentifier {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::PlatformNotFound(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Framework(TfplugError::Cancelled))
    }
}

impl From<ApiError> for ProviderError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound(object) => ProviderError::PlatformNotFound(format!(
                "object {} does not exist or not authorized",
                object
            )),
            other => ProviderError::Platform(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Lifecycle step a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Plan,
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Operation::Plan => "plan",
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Import => "import",
        };
        f.write_str(verb)
    }
}

/// Error diagnostic scoped to one resource: the summary names the failed
/// step, the detail starts with the resource type and object
pub fn failure(op: Operation, label: &str, type_name: &str, object: &str, err: &ProviderError) -> Diagnostic {
    Diagnostic::error(
        format!("Failed to {} {}", op, label),
        format!("{} {}: {}", type_name, object, err),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_sentinel() {
        let err: ProviderError = ApiError::NotFound("\"WH\"".to_string()).into();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("\"WH\""));
    }

    #[test]
    fn other_platform_errors_keep_message() {
        let err: ProviderError = ApiError::Rejected("warehouse is busy".to_string()).into();
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "warehouse is busy");
    }

    #[test]
    fn failure_diagnostic_is_resource_scoped() {
        let err = ProviderError::Validation(vec!["a".into(), "b".into()]);
        let diag = failure(
            Operation::Create,
            "warehouse",
            "dataplatform_warehouse",
            "\"WH\"",
            &err,
        );
        assert_eq!(diag.summary, "Failed to create warehouse");
        assert_eq!(diag.detail, "dataplatform_warehouse \"WH\": a; b");
    }
}
