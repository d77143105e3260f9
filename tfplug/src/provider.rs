//! Provider trait: configuration plus a factory for configured resources

use crate::context::Context;
use crate::resource::Resource;
use crate::schema::Schema;
use crate::types::{Diagnostics, DynamicValue};
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Prefix shared by every resource type name (e.g., "dataplatform")
    fn type_name(&self) -> &str;

    fn schema(&self) -> Schema;

    /// Called once before any resource is created
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse;

    /// Resource type names this provider serves
    fn resource_types(&self) -> Vec<String>;

    /// Schemas by resource type name; available without configuration
    fn resource_schemas(&self) -> BTreeMap<String, Schema>;

    /// Build a configured resource. Fails when the provider is not configured
    /// or the type is unknown.
    async fn create_resource(&self, type_name: &str) -> Result<Box<dyn Resource>>;
}

pub struct ConfigureProviderRequest {
    pub config: DynamicValue,
}

pub struct ConfigureProviderResponse {
    pub diagnostics: Diagnostics,
}
