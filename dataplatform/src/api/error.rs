use thiserror::Error;

use super::common::ApiErrorDetails;

/// Failure of a single platform call
///
/// `NotFound` is the only variant controllers branch on; everything else is
/// reported to the user with its message intact.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("object does not exist or not authorized: {0}")]
    NotFound(String),

    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {message}")]
    ApiError {
        status: u16,
        message: String,
        #[source]
        details: Option<Box<ApiErrorDetails>>,
    },

    #[error("{0}")]
    Rejected(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}
