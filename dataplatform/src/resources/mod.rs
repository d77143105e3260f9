//! Resource implementations

pub mod account_parameters;
pub mod authentication_policy_attachment;
pub mod common;
pub mod database;
pub mod procedure;
pub mod service;
pub mod shared_database;
pub mod stream_on_view;
pub mod warehouse;

pub use account_parameters::{CurrentAccountResource, CurrentOrganizationAccountResource};
pub use authentication_policy_attachment::AuthenticationPolicyAttachmentResource;
pub use common::{ObjectModel, ObjectResource};
pub use database::DatabaseResource;
pub use procedure::ProcedureResource;
pub use service::ServiceResource;
pub use shared_database::SharedDatabaseResource;
pub use stream_on_view::StreamOnViewResource;
pub use warehouse::WarehouseResource;
