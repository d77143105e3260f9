//! tfplug - plugin framework for infrastructure-as-code providers
//!
//! The framework owns the value model exchanged with the host (tri-state
//! dynamic values, diagnostics, private state), schemas with validators and
//! plan modifiers, request contexts, and the traits a provider implements.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod tristate;
pub mod types;

// Provider API modules
pub mod provider;
pub mod resource;

// Helper modules
pub mod import;
pub mod logging;
pub mod plan_modifier;
pub mod validator;

// Re-exports for convenience
pub use context::Context;
pub use error::{Result, TfplugError};
pub use import::import_state_passthrough_id;
pub use logging::{init_logging, try_init_logging};
pub use provider::{ConfigureProviderRequest, ConfigureProviderResponse, Provider};
pub use resource::Resource;
pub use schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use tristate::TriState;
pub use types::{
    AttributePath, Diagnostic, DiagnosticSeverity, Diagnostics, Dynamic, DynamicValue,
    PrivateStateData,
};
