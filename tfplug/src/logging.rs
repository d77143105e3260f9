//! Structured logging bootstrap
//!
//! Providers log through `tracing`. All output goes to stderr since the host
//! owns stdout. Filtering follows `RUST_LOG`.

use crate::error::{Result, TfplugError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber with `info` as the default level
///
/// Panics if a global subscriber is already set; use [`try_init_logging`]
/// when that can happen (tests, embedding).
pub fn init_logging() {
    init_logging_with_default("info");
}

pub fn init_logging_with_default(default_level: &str) {
    if let Err(e) = try_init_logging_with_default(default_level) {
        panic!("{}", e);
    }
}

/// Like [`init_logging`] but reports an already-installed subscriber as an error
pub fn try_init_logging() -> Result<()> {
    try_init_logging_with_default("info")
}

pub fn try_init_logging_with_default(default_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
        .map_err(|e| TfplugError::LoggingInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_initialization_is_reported() {
        // The first call may lose against another test in the same binary
        let _ = try_init_logging_with_default("debug");
        assert!(matches!(
            try_init_logging(),
            Err(TfplugError::LoggingInit(_))
        ));
    }
}
