//! Lifecycle controller shared by every platform object resource
//!
//! A resource type supplies an [`ObjectModel`]: its schema, its attribute
//! table and how its identifier is read from state. [`ObjectResource`] turns
//! that into the full lifecycle:
//!
//! - create marshals the plan, creates the object, observes it and records
//!   the observation as the snapshot; public state stays what was planned
//! - read observes the object and writes only drifted attributes
//! - update issues rename, SET and UNSET in that order, then model-specific
//!   alterations, checking for cancellation between phases
//! - delete drops the object, tolerating its absence
//! - import establishes identity only; the next read fills in the rest

use crate::api::{AlterOptions, CreateOptions, ObjectDetails, ObjectKind};
use crate::drift::{reconcile, suppress_snapshot_equal, Observation};
use crate::error::{failure, Operation, ProviderError, Result};
use crate::identifier::{Identifier, ObjectIdentifier, SchemaObjectIdentifier};
use crate::marshal::{parameter_specs, AttributeSpec, ChangeSet, CreateBuilder};
use crate::parameters::{ParameterResolver, Resolution};
use crate::private_state::ObjectSnapshot;
use crate::provider_data::DataPlatformProviderData;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tfplug::plan_modifier::{plan_resource_change, RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::resource::{
    CreateResourceRequest, CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource, ModifyPlanRequest,
    ModifyPlanResponse, ReadResourceRequest, ReadResourceResponse, Resource, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::Attribute;
use tfplug::{
    AttributeBuilder, AttributePath, AttributeType, Context, Diagnostic, Diagnostics, Dynamic,
    DynamicValue, Schema,
};

pub const ID: &str = "id";
pub const FULLY_QUALIFIED_NAME: &str = "fully_qualified_name";

/// Resource-type specifics driven by [`ObjectResource`]
pub trait ObjectModel: Send + Sync + 'static {
    const TYPE_NAME: &'static str;
    /// Human readable kind used in diagnostics, e.g. "warehouse"
    const LABEL: &'static str;
    const KIND: ObjectKind;
    /// Attributes that make up the identifier; changing them renames
    const IDENTITY: &'static [&'static str];
    /// Attributes applied by [`ObjectModel::extra_alters`]
    const EXTRA_ATTRIBUTES: &'static [&'static str] = &[];
    /// The object always exists: create applies the plan as an update and
    /// delete leaves the object as it is
    const SINGLETON: bool = false;
    /// Attributes whose snapshot entry only create and update refresh, so a
    /// plan can compare the applied value with what a later read found
    const SNAPSHOT_ON_APPLY: &'static [&'static str] = &[];

    fn schema() -> Schema;

    fn attributes() -> &'static [AttributeSpec];

    /// Identifier named by the identity attributes of a state or plan
    fn identifier(state: &DynamicValue) -> Result<Identifier>;

    /// Decode the `id` attribute or an import id
    fn parse_id(id: &str) -> Result<Identifier>;

    fn encode_id(id: &Identifier) -> String {
        id.fully_qualified_name()
    }

    /// Fill identity attributes of an imported object
    fn write_identity(id: &Identifier, details: &ObjectDetails, state: &mut DynamicValue);

    fn create_options(plan: &DynamicValue) -> Result<CreateOptions> {
        CreateBuilder::new(plan).attributes(Self::attributes()).build()
    }

    /// Create through the platform's idempotent upsert
    fn uses_create_or_alter() -> bool {
        false
    }

    /// Resource-specific planning after the framework and rename handling
    fn plan(
        _prior: &DynamicValue,
        _config: &DynamicValue,
        _snapshot: &ObjectSnapshot,
        _response: &mut ModifyPlanResponse,
    ) {
    }

    fn changes(prior: &DynamicValue, plan: &DynamicValue) -> ChangeSet {
        ChangeSet::diff(Self::attributes(), prior, plan)
    }

    /// Alterations issued after the SET and UNSET batches
    fn extra_alters(_prior: &DynamicValue, _plan: &DynamicValue) -> Result<Vec<AlterOptions>> {
        Ok(Vec::new())
    }

    /// Observe attributes the attribute table cannot describe
    fn observe_extra(_details: &ObjectDetails, _current: &DynamicValue, _observation: &mut Observation) {}
}

/// `id` and `fully_qualified_name`, present on every object resource
pub fn identity_attributes() -> [Attribute; 2] {
    [
        AttributeBuilder::new(ID, AttributeType::String)
            .description("Encoded identifier of the object")
            .computed()
            .plan_modifier(Arc::new(UseStateForUnknown))
            .build(),
        AttributeBuilder::new(FULLY_QUALIFIED_NAME, AttributeType::String)
            .description("Fully qualified, quoted name of the object")
            .computed()
            .build(),
    ]
}

/// `database`, `schema` and `name` of a schema-level object; moving it to
/// another schema replaces it, changing the name renames it
pub fn schema_object_attributes(label: &str) -> [Attribute; 3] {
    [
        AttributeBuilder::new("database", AttributeType::String)
            .description(&format!("Database the {} lives in", label))
            .required()
            .plan_modifier(Arc::new(RequiresReplaceIfChanged))
            .build(),
        AttributeBuilder::new("schema", AttributeType::String)
            .description(&format!("Schema the {} lives in", label))
            .required()
            .plan_modifier(Arc::new(RequiresReplaceIfChanged))
            .build(),
        AttributeBuilder::new("name", AttributeType::String)
            .description(&format!("Name of the {}; changing it renames the {}", label, label))
            .required()
            .build(),
    ]
}

pub fn schema_object_id(state: &DynamicValue) -> Result<SchemaObjectIdentifier> {
    Ok(SchemaObjectIdentifier::new(
        string_attr(state, "database")?,
        string_attr(state, "schema")?,
        string_attr(state, "name")?,
    ))
}

pub fn write_schema_object_identity(id: &SchemaObjectIdentifier, state: &mut DynamicValue) {
    state.set_attr("database", Dynamic::string(id.database()));
    state.set_attr("schema", Dynamic::string(id.schema()));
    state.set_attr("name", Dynamic::string(id.name()));
}

/// Required string attribute of a state or plan
pub fn string_attr(state: &DynamicValue, name: &str) -> Result<String> {
    match state.attr(name) {
        Dynamic::String(s) if !s.is_empty() => Ok(s.clone()),
        Dynamic::Unknown => Err(ProviderError::Validation(vec![format!(
            "{}: value is not known yet",
            name
        )])),
        _ => Err(ProviderError::Validation(vec![format!("{}: value is required", name)])),
    }
}

/// Set every top-level attribute still unknown to null
pub fn resolve_unknowns(schema: &Schema, state: &mut DynamicValue) {
    for attribute in &schema.block.attributes {
        if state.attr(&attribute.name).is_unknown() {
            state.set_attr(&attribute.name, Dynamic::Null);
        }
    }
}

/// Observe an object: describe output plus exposed parameters
pub async fn observe<M: ObjectModel>(
    data: &DataPlatformProviderData,
    ctx: &Context,
    id: &Identifier,
    current: &DynamicValue,
) -> Result<Observation> {
    let details = data.client.get_by_id(ctx, M::KIND, id).await?;

    let specs = parameter_specs(M::attributes());
    let own_level = M::KIND.parameter_level();
    let resolution = if specs.is_empty() {
        Resolution::default()
    } else {
        let parameters = data.client.show_parameters(ctx, M::KIND, id).await?;
        ParameterResolver::new(own_level, specs).resolve(&parameters)?
    };

    let mut observation = Observation::collect(M::attributes(), &details, &resolution, own_level, current);
    M::observe_extra(&details, current, &mut observation);
    Ok(observation)
}

pub struct ObjectResource<M> {
    data: DataPlatformProviderData,
    _model: PhantomData<fn() -> M>,
}

impl<M: ObjectModel> ObjectResource<M> {
    pub fn new(data: DataPlatformProviderData) -> Self {
        Self {
            data,
            _model: PhantomData,
        }
    }

    fn failure(&self, op: Operation, object: &str, err: &ProviderError) -> Diagnostic {
        failure(op, M::LABEL, M::TYPE_NAME, object, err)
    }

    /// Identifier recorded in state, preferring the encoded `id`
    fn state_identifier(state: &DynamicValue) -> Result<Identifier> {
        match state.attr(ID).as_str() {
            Some(id) if !id.is_empty() => M::parse_id(id),
            _ => M::identifier(state),
        }
    }

    /// Public state after a successful apply: the plan, with identity and
    /// computed attributes filled from the platform
    fn applied_state(id: &Identifier, plan: &DynamicValue, observation: Option<&Observation>) -> DynamicValue {
        let mut state = plan.clone();
        set_identity(&mut state, &M::encode_id(id), id);
        if let Some(observation) = observation {
            for spec in M::attributes().iter().filter(|s| s.computed) {
                state.set_attr(spec.attribute, observation.value(spec.attribute));
            }
        }
        resolve_unknowns(&M::schema(), &mut state);
        state
    }

    /// Everything an update issues, validated before the first call
    fn prepare_update(
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<(Identifier, Identifier, ChangeSet, Vec<AlterOptions>)> {
        let current = Self::state_identifier(prior)?;
        let target = M::identifier(plan)?;
        let changes = M::changes(prior, plan).validate()?;
        let extras = M::extra_alters(prior, plan)?;
        Ok((current, target, changes, extras))
    }

    async fn apply_alter(&self, ctx: &Context, id: &Identifier, alter: &AlterOptions) -> Result<()> {
        ctx.check_cancelled()?;
        tracing::debug!(
            resource = M::TYPE_NAME,
            object = %id,
            action = alter.action(),
            "altering object"
        );
        self.data.client.alter(ctx, M::KIND, id, alter).await?;
        Ok(())
    }
}

fn set_identity(state: &mut DynamicValue, encoded: &str, id: &Identifier) {
    state.set_attr(ID, Dynamic::string(encoded));
    state.set_attr(FULLY_QUALIFIED_NAME, Dynamic::String(id.fully_qualified_name()));
}

fn copy_attributes<'a>(state: &mut DynamicValue, plan: &DynamicValue, names: impl IntoIterator<Item = &'a str>) {
    for name in names {
        state.set_attr(name, plan.attr(name).clone());
    }
}

#[async_trait]
impl<M: ObjectModel> Resource for ObjectResource<M> {
    fn type_name(&self) -> &str {
        M::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        M::schema()
    }

    async fn modify_plan(&self, _ctx: Context, request: ModifyPlanRequest) -> ModifyPlanResponse {
        let mut response = plan_resource_change(&M::schema(), &request);
        if request.proposed_new_state.is_null() {
            return response;
        }

        let creating = request.prior_state.is_null();
        if !creating {
            let renamed = match (
                M::identifier(&request.prior_state),
                M::identifier(&response.planned_state),
            ) {
                (Ok(prior), Ok(planned)) => prior != planned,
                // Identity not known yet
                _ => true,
            };
            if renamed {
                response.planned_state.set_attr(ID, Dynamic::Unknown);
                response
                    .planned_state
                    .set_attr(FULLY_QUALIFIED_NAME, Dynamic::Unknown);
            }
        }

        let snapshot = ObjectSnapshot::decode_or_default(&request.prior_private);
        M::plan(&request.prior_state, &request.config, &snapshot, &mut response);

        if self.data.suppress_snapshot_diffs && !creating {
            if let Ok(snapshot) = ObjectSnapshot::decode(&request.prior_private) {
                let suppressed = suppress_snapshot_equal(
                    M::attributes(),
                    &request.prior_state,
                    &snapshot,
                    &mut response.planned_state,
                );
                response.requires_replace.retain(|path| {
                    path.root_attribute()
                        .map_or(true, |name| !suppressed.iter().any(|s| *s == name))
                });
            }
        }

        response
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = Diagnostics::new();
        let plan = request.planned_state;

        let created = async {
            let id = M::identifier(&plan)?;
            let opts = M::create_options(&plan)?;
            if M::SINGLETON {
                let changes = M::changes(&DynamicValue::object(), &plan).validate()?;
                if let Some(set) = changes.set_batch() {
                    self.apply_alter(&ctx, &id, &set).await?;
                }
                return Ok(id);
            }
            tracing::debug!(resource = M::TYPE_NAME, object = %id, "creating object");
            if M::uses_create_or_alter() {
                self.data.client.create_or_alter(&ctx, M::KIND, &id, &opts).await?;
            } else {
                self.data.client.create(&ctx, M::KIND, &id, &opts).await?;
            }
            Ok::<_, ProviderError>(id)
        }
        .await;

        let id = match created {
            Ok(id) => id,
            Err(e) => {
                let object = M::identifier(&plan)
                    .map(|id| id.fully_qualified_name())
                    .unwrap_or_default();
                diagnostics.push(self.failure(Operation::Create, &object, &e));
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    private: request.planned_private,
                    diagnostics,
                };
            }
        };
        let object = id.fully_qualified_name();

        // Alterations the create call cannot carry; the object exists from
        // here on, so failures keep it in state
        let follow_up = async {
            for alter in M::extra_alters(&DynamicValue::object(), &plan)? {
                self.apply_alter(&ctx, &id, &alter).await?;
            }
            observe::<M>(&self.data, &ctx, &id, &plan).await
        }
        .await;

        match follow_up {
            Ok(observation) => {
                let snapshot = observation.snapshot(&ObjectSnapshot::new());
                let private = match snapshot.encode(&request.planned_private) {
                    Ok(private) => private,
                    Err(e) => {
                        diagnostics.push(self.failure(Operation::Create, &object, &e));
                        Vec::new()
                    }
                };
                tracing::info!(resource = M::TYPE_NAME, object = %id, "created object");
                CreateResourceResponse {
                    new_state: Self::applied_state(&id, &plan, Some(&observation)),
                    private,
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(self.failure(Operation::Create, &object, &e));
                CreateResourceResponse {
                    new_state: Self::applied_state(&id, &plan, None),
                    private: Vec::new(),
                    diagnostics,
                }
            }
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = Diagnostics::new();
        let current = request.current_state;

        let id = match Self::state_identifier(&current) {
            Ok(id) => id,
            Err(e) => {
                diagnostics.push(self.failure(Operation::Read, "", &e));
                return ReadResourceResponse {
                    new_state: Some(current),
                    diagnostics,
                    private: request.private,
                };
            }
        };
        let object = id.fully_qualified_name();

        let previous = match ObjectSnapshot::decode(&request.private) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                diagnostics.push(self.failure(Operation::Read, &object, &e));
                return ReadResourceResponse {
                    new_state: Some(current),
                    diagnostics,
                    private: request.private,
                };
            }
        };

        let observation = match observe::<M>(&self.data, &ctx, &id, &current).await {
            Ok(observation) => observation,
            Err(e) if e.is_not_found() => {
                tracing::warn!(resource = M::TYPE_NAME, object = %id, "object is gone, removing from state");
                diagnostics.add_warning(
                    format!("{} {} no longer exists", M::LABEL, object),
                    Some("The object was removed outside of configuration and will be dropped from state."),
                );
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics,
                    private: Vec::new(),
                };
            }
            Err(e) => {
                diagnostics.push(self.failure(Operation::Read, &object, &e));
                return ReadResourceResponse {
                    new_state: Some(current),
                    diagnostics,
                    private: request.private,
                };
            }
        };

        let mut state = current;
        set_identity(&mut state, &M::encode_id(&id), &id);
        let mut snapshot = reconcile(&observation, &previous, &mut state).snapshot;
        for attribute in M::SNAPSHOT_ON_APPLY {
            snapshot.set(attribute, previous.get(attribute).cloned());
        }

        match snapshot.encode(&request.private) {
            Ok(private) => ReadResourceResponse {
                new_state: Some(state),
                diagnostics,
                private,
            },
            Err(e) => {
                diagnostics.push(self.failure(Operation::Read, &object, &e));
                ReadResourceResponse {
                    new_state: Some(state),
                    diagnostics,
                    private: request.private,
                }
            }
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = Diagnostics::new();
        let prior = request.prior_state;
        let plan = request.planned_state;

        let (current, target, changes, extras) = match Self::prepare_update(&prior, &plan) {
            Ok(prepared) => prepared,
            Err(e) => {
                let object = Self::state_identifier(&prior)
                    .map(|id| id.fully_qualified_name())
                    .unwrap_or_default();
                diagnostics.push(self.failure(Operation::Update, &object, &e));
                return UpdateResourceResponse {
                    new_state: prior,
                    private: request.planned_private,
                    diagnostics,
                };
            }
        };

        let renamed = current != target;
        if !renamed && changes.is_empty() && extras.is_empty() {
            return UpdateResourceResponse {
                new_state: Self::applied_state(&current, &plan, None),
                private: request.planned_private,
                diagnostics,
            };
        }

        // Every completed phase is copied into `state` so a failure later on
        // still reports what was applied
        let mut state = prior.clone();
        let mut id = current;

        let applied: Result<()> = async {
            if renamed {
                self.apply_alter(&ctx, &id, &AlterOptions::Rename { new_name: target.clone() })
                    .await?;
                id = target.clone();
                copy_attributes(&mut state, &plan, M::IDENTITY.iter().copied());
                set_identity(&mut state, &M::encode_id(&id), &id);
            }
            if let Some(set) = changes.set_batch() {
                self.apply_alter(&ctx, &id, &set).await?;
                copy_attributes(&mut state, &plan, changes.set_attributes.iter().map(String::as_str));
            }
            if let Some(unset) = changes.unset_batch() {
                self.apply_alter(&ctx, &id, &unset).await?;
                copy_attributes(&mut state, &plan, changes.unset_attributes.iter().map(String::as_str));
            }
            for alter in &extras {
                self.apply_alter(&ctx, &id, alter).await?;
            }
            copy_attributes(&mut state, &plan, M::EXTRA_ATTRIBUTES.iter().copied());
            Ok(())
        }
        .await;

        let object = id.fully_qualified_name();
        if let Err(e) = applied {
            if e.is_not_found() {
                diagnostics.push(self.failure(Operation::Update, &object, &e));
                return UpdateResourceResponse {
                    new_state: DynamicValue::null(),
                    private: Vec::new(),
                    diagnostics,
                };
            }
            diagnostics.push(self.failure(Operation::Update, &object, &e));
            return UpdateResourceResponse {
                new_state: state,
                private: request.planned_private,
                diagnostics,
            };
        }

        match observe::<M>(&self.data, &ctx, &id, &plan).await {
            Ok(observation) => {
                let base = ObjectSnapshot::decode_or_default(&request.planned_private);
                let snapshot = observation.snapshot(&base);
                let private = match snapshot.encode(&request.planned_private) {
                    Ok(private) => private,
                    Err(e) => {
                        diagnostics.push(self.failure(Operation::Update, &object, &e));
                        request.planned_private
                    }
                };
                tracing::info!(resource = M::TYPE_NAME, object = %id, "updated object");
                UpdateResourceResponse {
                    new_state: Self::applied_state(&id, &plan, Some(&observation)),
                    private,
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(self.failure(Operation::Update, &object, &e));
                UpdateResourceResponse {
                    new_state: Self::applied_state(&id, &plan, None),
                    private: request.planned_private,
                    diagnostics,
                }
            }
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = Diagnostics::new();

        if M::SINGLETON {
            diagnostics.add_warning(
                format!("{} is not deleted", M::LABEL),
                Some("The resource is removed from state; values it set stay in place."),
            );
            return DeleteResourceResponse { diagnostics };
        }

        let result = async {
            let id = Self::state_identifier(&request.prior_state)?;
            tracing::debug!(resource = M::TYPE_NAME, object = %id, "dropping object");
            self.data.client.drop_safely(&ctx, M::KIND, &id).await?;
            Ok::<_, ProviderError>(())
        }
        .await;

        if let Err(e) = result {
            let object = Self::state_identifier(&request.prior_state)
                .map(|id| id.fully_qualified_name())
                .unwrap_or_default();
            diagnostics.push(self.failure(Operation::Delete, &object, &e));
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
            let id = M::parse_id(&request.id)?;
            let details = self.data.client.get_by_id(&ctx, M::KIND, &id).await?;
            Ok::<_, ProviderError>((id, details))
        }
        .await;

        match imported {
            Ok((id, details)) => {
                let mut state = DynamicValue::object();
                M::write_identity(&id, &details, &mut state);
                set_identity(&mut state, &M::encode_id(&id), &id);
                response.imported_resources.push(ImportedResource {
                    type_name: request.type_name,
                    state,
                    private: Vec::new(),
                });
            }
            Err(e) => {
                response
                    .diagnostics
                    .push(self.failure(Operation::Import, &request.id, &e));
            }
        }

        response
    }
}

/// Replace when a computed boolean turned true since the last apply,
/// planning its recomputation
pub fn replace_when_raised(
    prior: &DynamicValue,
    snapshot: &ObjectSnapshot,
    attribute: &str,
    response: &mut ModifyPlanResponse,
) {
    let applied = snapshot.get(attribute).and_then(serde_json::Value::as_bool);
    if prior.attr(attribute).as_bool() == Some(true) && applied == Some(false) {
        response.planned_state.set_attr(attribute, Dynamic::Unknown);
        let path = AttributePath::new(attribute);
        if !response.requires_replace.contains(&path) {
            response.requires_replace.push(path);
        }
    }
}
