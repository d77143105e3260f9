//! Attachment of an authentication policy to a user
//!
//! There is no platform object behind this resource, only the policy setting
//! on the user. The resource id is `"USER"|"DB"."SCHEMA"."POLICY"`.

use super::common::{identity_attributes, string_attr, ID};
use crate::api::{AlterOptions, ObjectKind, PropertyMap};
use crate::error::{failure, Operation, ProviderError, Result};
use crate::identifier::{
    same_identifier, split_unquoted, AccountObjectIdentifier, Identifier, IdentifierValidator,
    ObjectIdentifier, SchemaObjectIdentifier, SuppressIdentifierQuoting,
};
use crate::provider_data::DataPlatformProviderData;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tfplug::plan_modifier::{plan_resource_change, RequiresReplaceIfChanged};
use tfplug::resource::{
    CreateResourceRequest, CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource, ModifyPlanRequest,
    ModifyPlanResponse, ReadResourceRequest, ReadResourceResponse, Resource, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::{AttributeBuilder, AttributeType, Context, Diagnostics, Dynamic, DynamicValue, Schema, SchemaBuilder};

pub const TYPE_NAME: &str = "dataplatform_user_authentication_policy_attachment";
const LABEL: &str = "authentication policy attachment";
const POLICY_PROPERTY: &str = "authentication_policy";

const USER_NAME: &str = "user_name";
const POLICY_NAME: &str = "authentication_policy_name";

/// The user and policy an attachment links
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub user: AccountObjectIdentifier,
    pub policy: SchemaObjectIdentifier,
}

impl Attachment {
    fn from_state(state: &DynamicValue) -> Result<Self> {
        Ok(Self {
            user: AccountObjectIdentifier::parse(&string_attr(state, USER_NAME)?)?,
            policy: SchemaObjectIdentifier::parse(&string_attr(state, POLICY_NAME)?)?,
        })
    }

    /// Identity recorded in state, preferring the encoded `id`
    fn from_recorded(state: &DynamicValue) -> Result<Self> {
        match state.attr(ID).as_str() {
            Some(id) if !id.is_empty() => Self::parse_id(id),
            _ => Self::from_state(state),
        }
    }

    pub fn parse_id(id: &str) -> Result<Self> {
        let pieces = split_unquoted(id, '|');
        let [user, policy] = pieces.as_slice() else {
            return Err(ProviderError::malformed(id, "expected user|policy"));
        };
        Ok(Self {
            user: AccountObjectIdentifier::parse(user)?,
            policy: SchemaObjectIdentifier::parse(policy)?,
        })
    }

    pub fn encode_id(&self) -> String {
        format!(
            "{}|{}",
            self.user.fully_qualified_name(),
            self.policy.fully_qualified_name()
        )
    }

    fn user_id(&self) -> Identifier {
        self.user.clone().into()
    }

    /// Record identity in `state`. User and policy keep the spelling already
    /// there as long as it names the same objects.
    fn write(&self, state: &mut DynamicValue) {
        state.set_attr(ID, Dynamic::String(self.encode_id()));
        keep_spelling(state, USER_NAME, &self.user.fully_qualified_name(), self.user.name());
        let policy = self.policy.fully_qualified_name();
        keep_spelling(state, POLICY_NAME, &policy, &policy);
    }
}

fn keep_spelling(state: &mut DynamicValue, attribute: &str, canonical: &str, fallback: &str) {
    let same = state
        .attr(attribute)
        .as_str()
        .is_some_and(|current| same_identifier(current, canonical));
    if !same {
        state.set_attr(attribute, Dynamic::string(fallback));
    }
}

pub struct AuthenticationPolicyAttachmentResource {
    data: DataPlatformProviderData,
}

impl AuthenticationPolicyAttachmentResource {
    pub fn new(data: DataPlatformProviderData) -> Self {
        Self { data }
    }

    pub fn schema_definition() -> Schema {
        let [id, _] = identity_attributes();
        SchemaBuilder::new()
            .version(0)
            .description("Attaches an authentication policy to a user")
            .attribute(id)
            .attribute(
                AttributeBuilder::new(USER_NAME, AttributeType::String)
                    .description("User the policy applies to")
                    .required()
                    .validator(Arc::new(IdentifierValidator::exact(1)))
                    .plan_modifier(Arc::new(SuppressIdentifierQuoting))
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(POLICY_NAME, AttributeType::String)
                    .description("Fully qualified authentication policy")
                    .required()
                    .validator(Arc::new(IdentifierValidator::exact(3)))
                    .plan_modifier(Arc::new(SuppressIdentifierQuoting))
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .build()
    }

    /// Policy currently set on the user
    async fn attached_policy(&self, ctx: &Context, attachment: &Attachment) -> Result<Option<String>> {
        let details = self
            .data
            .client
            .get_by_id(ctx, ObjectKind::User, &attachment.user_id())
            .await?;
        Ok(details.string(POLICY_PROPERTY))
    }
}

#[async_trait]
impl Resource for AuthenticationPolicyAttachmentResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Self::schema_definition()
    }

    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        plan_resource_change(&Self::schema_definition(), &request)
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = Diagnostics::new();

        let result = async {
            let attachment = Attachment::from_state(&request.planned_state)?;
            ctx.check_cancelled()?;
            let properties = PropertyMap::from([(
                POLICY_PROPERTY.to_string(),
                Value::String(attachment.policy.fully_qualified_name()),
            )]);
            tracing::debug!(
                user = %attachment.user,
                policy = %attachment.policy,
                "attaching authentication policy"
            );
            self.data
                .client
                .alter(
                    &ctx,
                    ObjectKind::User,
                    &attachment.user_id(),
                    &AlterOptions::Set {
                        properties,
                        wait_for_completion: false,
                    },
                )
                .await?;
            Ok::<_, ProviderError>(attachment)
        }
        .await;

        match result {
            Ok(attachment) => {
                let mut state = request.planned_state;
                attachment.write(&mut state);
                CreateResourceResponse {
                    new_state: state,
                    private: request.planned_private,
                    diagnostics,
                }
            }
            Err(e) => {
                let object = string_attr(&request.planned_state, USER_NAME).unwrap_or_default();
                diagnostics.push(failure(Operation::Create, LABEL, TYPE_NAME, &object, &e));
                CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    private: request.planned_private,
                    diagnostics,
                }
            }
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = Diagnostics::new();
        let current = request.current_state;

        let attachment = match Attachment::from_recorded(&current) {
            Ok(attachment) => attachment,
            Err(e) => {
                diagnostics.push(failure(Operation::Read, LABEL, TYPE_NAME, "", &e));
                return ReadResourceResponse {
                    new_state: Some(current),
                    diagnostics,
                    private: request.private,
                };
            }
        };
        let object = attachment.encode_id();

        let detached = match self.attached_policy(&ctx, &attachment).await {
            Ok(Some(policy)) if same_identifier(&policy, &attachment.policy.fully_qualified_name()) => None,
            Ok(Some(other)) => Some(format!("user {} now has policy {}", attachment.user, other)),
            Ok(None) => Some(format!("user {} has no authentication policy", attachment.user)),
            Err(e) if e.is_not_found() => Some(format!("user {} no longer exists", attachment.user)),
            Err(e) => {
                diagnostics.push(failure(Operation::Read, LABEL, TYPE_NAME, &object, &e));
                return ReadResourceResponse {
                    new_state: Some(current),
                    diagnostics,
                    private: request.private,
                };
            }
        };

        if let Some(reason) = detached {
            tracing::warn!(attachment = %object, %reason, "attachment is gone, removing from state");
            diagnostics.add_warning(
                format!("{} {} no longer exists", LABEL, object),
                Some(format!("{}; the attachment will be dropped from state.", reason)),
            );
            return ReadResourceResponse {
                new_state: None,
                diagnostics,
                private: Vec::new(),
            };
        }

        let mut state = current;
        attachment.write(&mut state);
        ReadResourceResponse {
            new_state: Some(state),
            diagnostics,
            private: request.private,
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        // Every attribute forces replacement
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: request.planned_private,
            diagnostics: Diagnostics::new(),
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = Diagnostics::new();

        let result = async {
            let attachment = Attachment::from_recorded(&request.prior_state)?;
            tracing::debug!(user = %attachment.user, "detaching authentication policy");
            let unset = AlterOptions::Unset {
                properties: vec![POLICY_PROPERTY.to_string()],
            };
            match self
                .data
                .client
                .alter(&ctx, ObjectKind::User, &attachment.user_id(), &unset)
                .await
                .map_err(ProviderError::from)
            {
                Err(e) if e.is_not_found() => Ok(()),
                other => other,
            }
        }
        .await;

        if let Err(e) = result {
            let object = Attachment::from_recorded(&request.prior_state)
                .map(|a| a.encode_id())
                .unwrap_or_default();
            diagnostics.push(failure(Operation::Delete, LABEL, TYPE_NAME, &object, &e));
        }

        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();

        let imported = async {
            let attachment = Attachment::parse_id(&request.id)?;
            match self.attached_policy(&ctx, &attachment).await? {
                Some(policy) if same_identifier(&policy, &attachment.policy.fully_qualified_name()) => {
                    Ok(attachment)
                }
                _ => Err(ProviderError::PlatformNotFound(format!(
                    "policy {} is not attached to user {}",
                    attachment.policy, attachment.user
                ))),
            }
        }
        .await;

        match imported {
            Ok(attachment) => {
                let mut state = DynamicValue::object();
                attachment.write(&mut state);
                response.imported_resources.push(ImportedResource {
                    type_name: request.type_name,
                    state,
                    private: Vec::new(),
                });
            }
            Err(e) => response
                .diagnostics
                .push(failure(Operation::Import, LABEL, TYPE_NAME, &request.id, &e)),
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::CallOperation;
    use crate::api::InMemoryPlatform;
    use serde_json::json;

    fn setup() -> (Arc<InMemoryPlatform>, AuthenticationPolicyAttachmentResource) {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.insert(ObjectKind::User, AccountObjectIdentifier::new("ALICE"), PropertyMap::new());
        let resource =
            AuthenticationPolicyAttachmentResource::new(DataPlatformProviderData::new(platform.clone()));
        (platform, resource)
    }

    fn plan() -> DynamicValue {
        let mut plan = DynamicValue::object();
        plan.set_attr(ID, Dynamic::Unknown);
        plan.set_attr(USER_NAME, Dynamic::string("ALICE"));
        plan.set_attr(POLICY_NAME, Dynamic::string("SEC.POLICIES.MFA"));
        plan
    }

    async fn create(resource: &AuthenticationPolicyAttachmentResource) -> CreateResourceResponse {
        resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    planned_state: plan(),
                    config: plan(),
                    planned_private: Vec::new(),
                },
            )
            .await
    }

    async fn read(
        resource: &AuthenticationPolicyAttachmentResource,
        state: DynamicValue,
    ) -> ReadResourceResponse {
        resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: state,
                    private: Vec::new(),
                },
            )
            .await
    }

    #[test]
    fn ids_round_trip() {
        let attachment = Attachment::parse_id("ALICE|SEC.POLICIES.MFA").unwrap();
        assert_eq!(attachment.encode_id(), "\"ALICE\"|\"SEC\".\"POLICIES\".\"MFA\"");
        assert_eq!(Attachment::parse_id(&attachment.encode_id()).unwrap(), attachment);
        assert!(Attachment::parse_id("ALICE").is_err());
    }

    #[tokio::test]
    async fn create_sets_policy_on_user() {
        let (platform, resource) = setup();
        let response = create(&resource).await;
        assert!(!response.diagnostics.has_errors());
        assert_eq!(
            response.new_state.attr(ID),
            &Dynamic::string("\"ALICE\"|\"SEC\".\"POLICIES\".\"MFA\"")
        );
        assert_eq!(response.new_state.attr(USER_NAME), plan().attr(USER_NAME));
        assert_eq!(response.new_state.attr(POLICY_NAME), plan().attr(POLICY_NAME));

        let user = platform
            .details(ObjectKind::User, &AccountObjectIdentifier::new("ALICE").into())
            .unwrap();
        assert_eq!(
            user.string(POLICY_PROPERTY).as_deref(),
            Some("\"SEC\".\"POLICIES\".\"MFA\"")
        );
    }

    #[tokio::test]
    async fn read_removes_attachment_of_dropped_user() {
        let (platform, resource) = setup();
        let created = create(&resource).await;
        platform.remove(ObjectKind::User, &AccountObjectIdentifier::new("ALICE").into());

        let response = read(&resource, created.new_state).await;
        assert!(response.new_state.is_none());
        assert!(!response.diagnostics.has_errors());
        assert!(!response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn read_removes_replaced_policy() {
        let (platform, resource) = setup();
        let created = create(&resource).await;
        platform.set_property(
            ObjectKind::User,
            &AccountObjectIdentifier::new("ALICE").into(),
            POLICY_PROPERTY,
            json!("SEC.POLICIES.OTHER"),
        );
        assert!(read(&resource, created.new_state).await.new_state.is_none());
    }

    #[tokio::test]
    async fn read_keeps_attachment_with_unquoted_policy() {
        let (platform, resource) = setup();
        let created = create(&resource).await;
        platform.set_property(
            ObjectKind::User,
            &AccountObjectIdentifier::new("ALICE").into(),
            POLICY_PROPERTY,
            json!("SEC.POLICIES.MFA"),
        );
        let response = read(&resource, created.new_state.clone()).await;
        assert_eq!(response.new_state, Some(created.new_state));
    }

    #[tokio::test]
    async fn read_keeps_equivalent_spelling() {
        let (_platform, resource) = setup();
        let created = create(&resource).await;

        let mut respelled = created.new_state.clone();
        respelled.set_attr(POLICY_NAME, Dynamic::string("\"SEC\".POLICIES.\"MFA\""));
        let response = read(&resource, respelled.clone()).await;
        assert_eq!(response.new_state, Some(respelled));
    }

    #[tokio::test]
    async fn import_writes_canonical_names() {
        let (_platform, resource) = setup();
        create(&resource).await;

        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: TYPE_NAME.to_string(),
                    id: "ALICE|SEC.POLICIES.MFA".to_string(),
                },
            )
            .await;
        assert!(!response.diagnostics.has_errors());
        let state = &response.imported_resources[0].state;
        assert_eq!(state.attr(USER_NAME), &Dynamic::string("ALICE"));
        assert_eq!(
            state.attr(POLICY_NAME),
            &Dynamic::string("\"SEC\".\"POLICIES\".\"MFA\"")
        );
    }

    #[tokio::test]
    async fn delete_tolerates_missing_user() {
        let (platform, resource) = setup();
        let created = create(&resource).await;
        platform.remove(ObjectKind::User, &AccountObjectIdentifier::new("ALICE").into());

        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: created.new_state,
                    planned_private: Vec::new(),
                },
            )
            .await;
        assert!(!response.diagnostics.has_errors());
    }

    #[tokio::test]
    async fn failed_create_leaves_no_state() {
        let (platform, resource) = setup();
        platform.fail_next(CallOperation::Alter, "policy does not exist");
        let response = create(&resource).await;
        assert!(response.new_state.is_null());
        assert!(response.diagnostics.has_errors());
    }
}
