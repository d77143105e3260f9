//! Infrastructure-as-code provider for a cloud data platform
//!
//! Resources reconcile configuration against the platform through
//! [`api::PlatformClient`]. The shared controller in [`resources::common`]
//! drives every object resource; the modules below it cover identifiers,
//! attribute marshaling, parameter inheritance, private snapshots and drift.

pub mod api;
pub mod config;
pub mod drift;
pub mod error;
pub mod identifier;
pub mod marshal;
pub mod parameters;
pub mod private_state;
pub mod provider_data;
pub mod replication;
pub mod resources;

use async_trait::async_trait;
use config::ProviderConfig;
use provider_data::DataPlatformProviderData;
use resources::account_parameters::{
    AccountParameters, CurrentAccountScope, CurrentOrganizationAccountScope,
};
use resources::authentication_policy_attachment::{self, AuthenticationPolicyAttachmentResource};
use resources::database::Database;
use resources::procedure::Procedure;
use resources::service::Service;
use resources::shared_database::SharedDatabase;
use resources::stream_on_view::StreamOnView;
use resources::warehouse::Warehouse;
use resources::{ObjectModel, ObjectResource};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tfplug::validator::NumberRangeValidator;
use tfplug::{
    AttributeBuilder, AttributeType, ConfigureProviderRequest, ConfigureProviderResponse, Context,
    Diagnostics, Provider, Resource, Schema, SchemaBuilder, TfplugError,
};

pub use error::{ProviderError, Result};

type CurrentAccount = AccountParameters<CurrentAccountScope>;
type CurrentOrganizationAccount = AccountParameters<CurrentOrganizationAccountScope>;

pub struct DataPlatformProvider {
    data: Option<DataPlatformProviderData>,
}

impl Default for DataPlatformProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataPlatformProvider {
    pub fn new() -> Self {
        Self { data: None }
    }

    /// A provider already bound to a platform client
    pub fn with_data(data: DataPlatformProviderData) -> Self {
        Self { data: Some(data) }
    }

    fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Cloud data platform provider")
            .attribute(
                AttributeBuilder::new("endpoint", AttributeType::String)
                    .description("Platform API endpoint; defaults to DATAPLATFORM_ENDPOINT")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("token", AttributeType::String)
                    .description("API token; defaults to DATAPLATFORM_TOKEN")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("insecure", AttributeType::Bool)
                    .description("Skip TLS certificate verification; defaults to DATAPLATFORM_INSECURE")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("request_timeout_seconds", AttributeType::Number)
                    .description("Timeout of a single platform request")
                    .optional()
                    .validator(Arc::new(NumberRangeValidator {
                        min: Some(1.0),
                        max: None,
                    }))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("suppress_snapshot_diffs", AttributeType::Bool)
                    .description("Drop planned changes that match the last value observed on the platform")
                    .optional()
                    .build(),
            )
            .build()
    }

    fn object_resource<M: ObjectModel>(data: &DataPlatformProviderData) -> Box<dyn Resource> {
        Box::new(ObjectResource::<M>::new(data.clone()))
    }
}

#[async_trait]
impl Provider for DataPlatformProvider {
    fn type_name(&self) -> &str {
        "dataplatform"
    }

    fn schema(&self) -> Schema {
        Self::schema_static()
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let mut diagnostics = Diagnostics::new();

        let configured = ProviderConfig::from_config(&request.config).and_then(|config| {
            let client = api::RestClient::with_timeout(
                &config.endpoint,
                &config.token,
                config.insecure,
                config.request_timeout(),
            )
            .map_err(ProviderError::Platform)?;
            tracing::info!(endpoint = %config.endpoint, "configured platform client");
            Ok(DataPlatformProviderData::new(Arc::new(client))
                .with_snapshot_suppression(config.suppress_snapshot_diffs))
        });

        match configured {
            Ok(data) => self.data = Some(data),
            Err(e) => diagnostics.add_error("Failed to configure provider", Some(e.to_string())),
        }

        ConfigureProviderResponse { diagnostics }
    }

    fn resource_types(&self) -> Vec<String> {
        self.resource_schemas().into_keys().collect()
    }

    fn resource_schemas(&self) -> BTreeMap<String, Schema> {
        static SCHEMAS: OnceLock<BTreeMap<String, Schema>> = OnceLock::new();

        SCHEMAS
            .get_or_init(|| {
                BTreeMap::from([
                    (Warehouse::TYPE_NAME.to_string(), Warehouse::schema()),
                    (Database::TYPE_NAME.to_string(), Database::schema()),
                    (SharedDatabase::TYPE_NAME.to_string(), SharedDatabase::schema()),
                    (Service::TYPE_NAME.to_string(), Service::schema()),
                    (StreamOnView::TYPE_NAME.to_string(), StreamOnView::schema()),
                    (Procedure::TYPE_NAME.to_string(), Procedure::schema()),
                    (CurrentAccount::TYPE_NAME.to_string(), CurrentAccount::schema()),
                    (
                        CurrentOrganizationAccount::TYPE_NAME.to_string(),
                        CurrentOrganizationAccount::schema(),
                    ),
                    (
                        authentication_policy_attachment::TYPE_NAME.to_string(),
                        AuthenticationPolicyAttachmentResource::schema_definition(),
                    ),
                ])
            })
            .clone()
    }

    async fn create_resource(&self, type_name: &str) -> tfplug::Result<Box<dyn Resource>> {
        let data = self.data.as_ref().ok_or(TfplugError::ProviderNotConfigured)?;

        let resource = match type_name {
            Warehouse::TYPE_NAME => Self::object_resource::<Warehouse>(data),
            Database::TYPE_NAME => Self::object_resource::<Database>(data),
            SharedDatabase::TYPE_NAME => Self::object_resource::<SharedDatabase>(data),
            Service::TYPE_NAME => Self::object_resource::<Service>(data),
            StreamOnView::TYPE_NAME => Self::object_resource::<StreamOnView>(data),
            Procedure::TYPE_NAME => Self::object_resource::<Procedure>(data),
            CurrentAccount::TYPE_NAME => Self::object_resource::<CurrentAccount>(data),
            CurrentOrganizationAccount::TYPE_NAME => {
                Self::object_resource::<CurrentOrganizationAccount>(data)
            }
            authentication_policy_attachment::TYPE_NAME => {
                Box::new(AuthenticationPolicyAttachmentResource::new(data.clone()))
            }
            other => return Err(TfplugError::ResourceNotFound(other.to_string())),
        };
        Ok(resource)
    }
}
