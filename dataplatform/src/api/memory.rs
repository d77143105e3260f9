//! In-process platform
//!
//! Behaves like the platform for the calls controllers make: objects carry
//! platform defaults, parameters resolve through inheritance levels, and
//! replication targets are tracked per database. Every call is journaled and
//! failures can be injected per operation.

use super::{
    AlterOptions, ApiError, CreateOptions, ObjectDetails, ObjectKind, Parameter, PlatformClient,
    PropertyMap,
};
use crate::identifier::{AccountIdentifier, Identifier, ObjectIdentifier};
use crate::parameters::ParameterLevel;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tfplug::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOperation {
    Create,
    Alter,
    DropSafely,
    GetById,
    ShowParameters,
    CreateOrAlter,
}

impl CallOperation {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, CallOperation::GetById | CallOperation::ShowParameters)
    }
}

/// One journaled platform call
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformCall {
    pub operation: CallOperation,
    pub kind: ObjectKind,
    pub object: Identifier,
    pub alter: Option<AlterOptions>,
}

impl PlatformCall {
    /// `alter:set`, `create`, ... for compact assertions
    pub fn label(&self) -> String {
        let op = match self.operation {
            CallOperation::Create => "create",
            CallOperation::Alter => "alter",
            CallOperation::DropSafely => "drop",
            CallOperation::GetById => "get",
            CallOperation::ShowParameters => "show_parameters",
            CallOperation::CreateOrAlter => "create_or_alter",
        };
        match &self.alter {
            Some(alter) => format!("{}:{}", op, alter.action()),
            None => op.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    operation: CallOperation,
    action: Option<&'static str>,
    message: String,
}

#[derive(Debug, Clone, Default)]
struct StoredObject {
    properties: PropertyMap,
    /// Parameters set on the object itself
    parameters: BTreeMap<String, String>,
    /// Values arriving from an enclosing scope
    inherited: BTreeMap<String, (String, ParameterLevel)>,
    replication: BTreeMap<AccountIdentifier, bool>,
}

#[derive(Default)]
struct PlatformState {
    objects: BTreeMap<(ObjectKind, Identifier), StoredObject>,
    calls: Vec<PlatformCall>,
    failures: Vec<InjectedFailure>,
    /// Contexts cancelled once an alter with the action succeeds
    cancellations: Vec<(&'static str, Context)>,
}

pub struct InMemoryPlatform {
    state: Mutex<PlatformState>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

fn default_properties(kind: ObjectKind) -> PropertyMap {
    let defaults = match kind {
        ObjectKind::Warehouse => json!({
            "warehouse_type": "STANDARD",
            "warehouse_size": "XSMALL",
            "max_cluster_count": 1,
            "min_cluster_count": 1,
            "scaling_policy": "STANDARD",
            "auto_suspend": 600,
            "auto_resume": true,
            "enable_query_acceleration": false,
            "query_acceleration_max_scale_factor": 8,
            "state": "STARTED",
            "owner": "ACCOUNTADMIN"
        }),
        ObjectKind::Database => json!({
            "is_transient": false,
            "kind": "STANDARD",
            "owner": "ACCOUNTADMIN"
        }),
        ObjectKind::Service => json!({
            "service_type": "LONG_RUNNING",
            "min_instances": 1,
            "max_instances": 1,
            "auto_resume": true,
            "status": "RUNNING"
        }),
        ObjectKind::Stream => json!({
            "mode": "DEFAULT",
            "stale": false,
            "type": "DELTA"
        }),
        ObjectKind::Procedure => json!({
            "execute_as": "OWNER",
            "is_secure": false
        }),
        ObjectKind::User => json!({}),
        ObjectKind::Account | ObjectKind::OrganizationAccount => json!({}),
    };
    match defaults {
        Value::Object(map) => map.into_iter().collect(),
        _ => PropertyMap::new(),
    }
}

/// Parameter keys per kind with their platform defaults
fn default_parameters(kind: ObjectKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        ObjectKind::Warehouse => &[
            ("MAX_CONCURRENCY_LEVEL", "8"),
            ("STATEMENT_QUEUED_TIMEOUT_IN_SECONDS", "0"),
            ("STATEMENT_TIMEOUT_IN_SECONDS", "172800"),
        ],
        ObjectKind::Database => &[
            ("DATA_RETENTION_TIME_IN_DAYS", "1"),
            ("MAX_DATA_EXTENSION_TIME_IN_DAYS", "14"),
            ("DEFAULT_DDL_COLLATION", ""),
            ("LOG_LEVEL", "OFF"),
            ("TRACE_LEVEL", "OFF"),
            ("SUSPEND_TASK_AFTER_NUM_FAILURES", "10"),
            ("TASK_AUTO_RETRY_ATTEMPTS", "0"),
            ("STORAGE_SERIALIZATION_POLICY", "OPTIMIZED"),
            ("QUOTED_IDENTIFIERS_IGNORE_CASE", "false"),
        ],
        ObjectKind::Procedure => &[("LOG_LEVEL", "OFF"), ("TRACE_LEVEL", "OFF")],
        ObjectKind::Account | ObjectKind::OrganizationAccount => &[
            ("STATEMENT_TIMEOUT_IN_SECONDS", "172800"),
            ("DATA_RETENTION_TIME_IN_DAYS", "1"),
            ("MAX_DATA_EXTENSION_TIME_IN_DAYS", "14"),
            ("TIMEZONE", "America/Los_Angeles"),
            ("LOG_LEVEL", "OFF"),
            ("TRACE_LEVEL", "OFF"),
            ("ENABLE_UNREDACTED_QUERY_SYNTAX_ERROR", "false"),
        ],
        ObjectKind::Service | ObjectKind::Stream | ObjectKind::User => &[],
    }
}

fn is_parameter(kind: ObjectKind, key: &str) -> bool {
    default_parameters(kind)
        .iter()
        .any(|(k, _)| k.eq_ignore_ascii_case(key))
}

fn parameter_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl InMemoryPlatform {
    /// A platform holding only the current account and organization account
    pub fn new() -> Self {
        let mut state = PlatformState::default();
        for kind in [ObjectKind::Account, ObjectKind::OrganizationAccount] {
            state
                .objects
                .insert((kind, Identifier::Current), StoredObject::default());
        }
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Journal a call, then fail it if a matching failure was injected
    fn record(
        state: &mut PlatformState,
        operation: CallOperation,
        kind: ObjectKind,
        id: &Identifier,
        alter: Option<&AlterOptions>,
    ) -> Result<(), ApiError> {
        state.calls.push(PlatformCall {
            operation,
            kind,
            object: id.clone(),
            alter: alter.cloned(),
        });

        let action = alter.map(AlterOptions::action);
        let position = state.failures.iter().position(|f| {
            f.operation == operation && (f.action.is_none() || f.action == action)
        });
        match position {
            Some(idx) => Err(ApiError::Rejected(state.failures.remove(idx).message)),
            None => Ok(()),
        }
    }

    /// Seed an object directly, bypassing the journal
    pub fn insert(&self, kind: ObjectKind, id: impl Into<Identifier>, properties: PropertyMap) {
        let mut object = StoredObject {
            properties: default_properties(kind),
            ..Default::default()
        };
        object.properties.extend(properties);
        self.lock().objects.insert((kind, id.into()), object);
    }

    pub fn exists(&self, kind: ObjectKind, id: &Identifier) -> bool {
        self.lock().objects.contains_key(&(kind, id.clone()))
    }

    /// Out-of-band change of a property
    pub fn set_property(&self, kind: ObjectKind, id: &Identifier, key: &str, value: Value) {
        if let Some(object) = self.lock().objects.get_mut(&(kind, id.clone())) {
            object.properties.insert(key.to_string(), value);
        }
    }

    /// Out-of-band drop
    pub fn remove(&self, kind: ObjectKind, id: &Identifier) {
        self.lock().objects.remove(&(kind, id.clone()));
    }

    /// Out-of-band change of the value an enclosing scope provides
    pub fn set_inherited_parameter(
        &self,
        kind: ObjectKind,
        id: &Identifier,
        key: &str,
        value: &str,
        level: ParameterLevel,
    ) {
        if let Some(object) = self.lock().objects.get_mut(&(kind, id.clone())) {
            object
                .inherited
                .insert(key.to_ascii_uppercase(), (value.to_string(), level));
        }
    }

    /// Out-of-band change of a parameter on the object itself
    pub fn set_own_parameter(&self, kind: ObjectKind, id: &Identifier, key: &str, value: &str) {
        if let Some(object) = self.lock().objects.get_mut(&(kind, id.clone())) {
            object
                .parameters
                .insert(key.to_ascii_uppercase(), value.to_string());
        }
    }

    /// Fail the next call of `operation` with a platform rejection
    pub fn fail_next(&self, operation: CallOperation, message: impl Into<String>) {
        self.lock().failures.push(InjectedFailure {
            operation,
            action: None,
            message: message.into(),
        });
    }

    /// Fail the next alter with the given action tag (`set`, `rename`, ...)
    pub fn fail_next_alter(&self, action: &'static str, message: impl Into<String>) {
        self.lock().failures.push(InjectedFailure {
            operation: CallOperation::Alter,
            action: Some(action),
            message: message.into(),
        });
    }

    /// Cancel `ctx` right after the next successful alter with the given
    /// action tag, as if the caller gave up mid-update
    pub fn cancel_after_alter(&self, action: &'static str, ctx: Context) {
        self.lock().cancellations.push((action, ctx));
    }

    fn fire_cancellation(state: &mut PlatformState, action: &str) {
        if let Some(idx) = state.cancellations.iter().position(|(a, _)| *a == action) {
            state.cancellations.remove(idx).1.cancel();
        }
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().calls.clone()
    }

    /// Calls that change platform state
    pub fn mutations(&self) -> Vec<PlatformCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current describe output without journaling
    pub fn details(&self, kind: ObjectKind, id: &Identifier) -> Option<ObjectDetails> {
        self.lock()
            .objects
            .get(&(kind, id.clone()))
            .map(|object| describe(kind, id, object))
    }

    fn apply_properties(kind: ObjectKind, object: &mut StoredObject, properties: &PropertyMap) {
        for (key, value) in properties {
            if is_parameter(kind, key) {
                object
                    .parameters
                    .insert(key.to_ascii_uppercase(), parameter_text(value));
            } else {
                object.properties.insert(key.clone(), value.clone());
            }
        }
    }
}

fn describe(kind: ObjectKind, id: &Identifier, object: &StoredObject) -> ObjectDetails {
    let mut properties = object.properties.clone();
    properties.insert("name".to_string(), json!(id.name()));
    match id {
        Identifier::SchemaObject(inner) => {
            properties.insert("database_name".to_string(), json!(inner.database()));
            properties.insert("schema_name".to_string(), json!(inner.schema()));
        }
        Identifier::SchemaObjectWithArguments(inner) => {
            properties.insert("database_name".to_string(), json!(inner.database()));
            properties.insert("schema_name".to_string(), json!(inner.schema()));
            properties.insert("argument_types".to_string(), json!(inner.argument_types()));
        }
        _ => {}
    }
    if kind == ObjectKind::Database {
        let accounts: Vec<Value> = object
            .replication
            .iter()
            .map(|(account, failover)| {
                json!({"account": account.fully_qualified_name(), "with_failover": failover})
            })
            .collect();
        properties.insert("replication_accounts".to_string(), Value::Array(accounts));
    }
    ObjectDetails { properties }
}

fn alter_object(
    kind: ObjectKind,
    object: &mut StoredObject,
    alter: &AlterOptions,
) -> Result<(), ApiError> {
    match alter {
        AlterOptions::Rename { .. } => {}
        AlterOptions::Set { properties, .. } => {
            InMemoryPlatform::apply_properties(kind, object, properties);
        }
        AlterOptions::Unset { properties } => {
            let defaults = default_properties(kind);
            for key in properties {
                if is_parameter(kind, key) {
                    object.parameters.remove(&key.to_ascii_uppercase());
                } else if let Some(default) = defaults.get(key) {
                    object.properties.insert(key.clone(), default.clone());
                } else {
                    object.properties.remove(key);
                }
            }
        }
        AlterOptions::EnableReplication { accounts, .. } => {
            for account in accounts {
                object.replication.entry(account.clone()).or_insert(false);
            }
        }
        AlterOptions::DisableReplication { accounts } => {
            for account in accounts {
                if object.replication.remove(account).is_none() {
                    return Err(ApiError::Rejected(format!(
                        "replication to {} is not enabled",
                        account
                    )));
                }
            }
        }
        AlterOptions::EnableFailover { accounts } | AlterOptions::DisableFailover { accounts } => {
            let enable = matches!(alter, AlterOptions::EnableFailover { .. });
            for account in accounts {
                match object.replication.get_mut(account) {
                    Some(failover) => *failover = enable,
                    None => {
                        return Err(ApiError::Rejected(format!(
                            "replication to {} must be enabled before failover",
                            account
                        )))
                    }
                }
            }
        }
    }
    Ok(())
}

#[async_trait]
impl PlatformClient for InMemoryPlatform {
    async fn create(
        &self,
        _ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
        opts: &CreateOptions,
    ) -> Result<(), ApiError> {
        let mut state = self.lock();
        Self::record(&mut state, CallOperation::Create, kind, id, None)?;

        let key = (kind, id.clone());
        if state.objects.contains_key(&key) {
            return Err(ApiError::Rejected(format!(
                "{} {} already exists",
                kind, id
            )));
        }

        let mut object = StoredObject {
            properties: default_properties(kind),
            ..Default::default()
        };
        Self::apply_properties(kind, &mut object, &opts.properties);
        state.objects.insert(key, object);
        Ok(())
    }

    async fn alter(
        &self,
        _ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
        alter: &AlterOptions,
    ) -> Result<(), ApiError> {
        let mut state = self.lock();
        Self::record(&mut state, CallOperation::Alter, kind, id, Some(alter))?;

        let key = (kind, id.clone());
        if let AlterOptions::Rename { new_name } = alter {
            let new_key = (kind, new_name.clone());
            if state.objects.contains_key(&new_key) {
                return Err(ApiError::Rejected(format!(
                    "{} {} already exists",
                    kind, new_name
                )));
            }
            let object = state
                .objects
                .remove(&key)
                .ok_or_else(|| ApiError::NotFound(id.fully_qualified_name()))?;
            state.objects.insert(new_key, object);
            Self::fire_cancellation(&mut state, alter.action());
            return Ok(());
        }

        let object = state
            .objects
            .get_mut(&key)
            .ok_or_else(|| ApiError::NotFound(id.fully_qualified_name()))?;
        alter_object(kind, object, alter)?;
        Self::fire_cancellation(&mut state, alter.action());
        Ok(())
    }

    async fn drop_safely(
        &self,
        _ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
    ) -> Result<(), ApiError> {
        let mut state = self.lock();
        Self::record(&mut state, CallOperation::DropSafely, kind, id, None)?;
        state.objects.remove(&(kind, id.clone()));
        Ok(())
    }

    async fn get_by_id(
        &self,
        _ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
    ) -> Result<ObjectDetails, ApiError> {
        let mut state = self.lock();
        Self::record(&mut state, CallOperation::GetById, kind, id, None)?;
        state
            .objects
            .get(&(kind, id.clone()))
            .map(|object| describe(kind, id, object))
            .ok_or_else(|| ApiError::NotFound(id.fully_qualified_name()))
    }

    async fn show_parameters(
        &self,
        _ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
    ) -> Result<Vec<Parameter>, ApiError> {
        let mut state = self.lock();
        Self::record(&mut state, CallOperation::ShowParameters, kind, id, None)?;
        let object = state
            .objects
            .get(&(kind, id.clone()))
            .ok_or_else(|| ApiError::NotFound(id.fully_qualified_name()))?;

        let own_level = kind.parameter_level();
        Ok(default_parameters(kind)
            .iter()
            .map(|(key, default)| {
                let (value, level) = match (object.parameters.get(*key), object.inherited.get(*key)) {
                    (Some(value), _) => (value.clone(), own_level),
                    (None, Some((value, level))) => (value.clone(), *level),
                    (None, None) => (default.to_string(), ParameterLevel::PlatformDefault),
                };
                Parameter {
                    key: key.to_string(),
                    value,
                    level,
                    default: Some(default.to_string()),
                }
            })
            .collect())
    }

    async fn create_or_alter(
        &self,
        _ctx: &Context,
        kind: ObjectKind,
        id: &Identifier,
        opts: &CreateOptions,
    ) -> Result<(), ApiError> {
        let mut state = self.lock();
        Self::record(&mut state, CallOperation::CreateOrAlter, kind, id, None)?;
        let object = state
            .objects
            .entry((kind, id.clone()))
            .or_insert_with(|| StoredObject {
                properties: default_properties(kind),
                ..Default::default()
            });
        Self::apply_properties(kind, object, &opts.properties);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::AccountObjectIdentifier;

    fn db() -> Identifier {
        AccountObjectIdentifier::new("DB").into()
    }

    fn options(pairs: &[(&str, Value)]) -> CreateOptions {
        CreateOptions {
            properties: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn created_objects_carry_defaults() {
        let platform = InMemoryPlatform::new();
        let ctx = Context::new();
        let wh: Identifier = AccountObjectIdentifier::new("WH").into();

        platform
            .create(&ctx, ObjectKind::Warehouse, &wh, &options(&[("comment", json!("hi"))]))
            .await
            .unwrap();
        let details = platform.get_by_id(&ctx, ObjectKind::Warehouse, &wh).await.unwrap();
        assert_eq!(details.string("comment").as_deref(), Some("hi"));
        assert_eq!(details.number("auto_suspend"), Some(600));
        assert_eq!(details.string("name").as_deref(), Some("WH"));
    }

    #[tokio::test]
    async fn parameters_report_their_level() {
        let platform = InMemoryPlatform::new();
        let ctx = Context::new();
        platform
            .create(
                &ctx,
                ObjectKind::Database,
                &db(),
                &options(&[("DATA_RETENTION_TIME_IN_DAYS", json!(25))]),
            )
            .await
            .unwrap();
        platform.set_inherited_parameter(
            ObjectKind::Database,
            &db(),
            "LOG_LEVEL",
            "INFO",
            ParameterLevel::Account,
        );

        let params = platform
            .show_parameters(&ctx, ObjectKind::Database, &db())
            .await
            .unwrap();
        let find = |key: &str| params.iter().find(|p| p.key == key).unwrap().clone();

        let retention = find("DATA_RETENTION_TIME_IN_DAYS");
        assert_eq!((retention.value.as_str(), retention.level), ("25", ParameterLevel::Database));
        let log = find("LOG_LEVEL");
        assert_eq!((log.value.as_str(), log.level), ("INFO", ParameterLevel::Account));
        let trace = find("TRACE_LEVEL");
        assert_eq!(trace.level, ParameterLevel::PlatformDefault);
    }

    #[tokio::test]
    async fn unset_reverts_to_inherited_value() {
        let platform = InMemoryPlatform::new();
        let ctx = Context::new();
        platform.insert(ObjectKind::Database, db(), PropertyMap::new());
        platform.set_own_parameter(ObjectKind::Database, &db(), "LOG_LEVEL", "DEBUG");
        platform.set_inherited_parameter(
            ObjectKind::Database,
            &db(),
            "LOG_LEVEL",
            "WARN",
            ParameterLevel::Account,
        );

        platform
            .alter(
                &ctx,
                ObjectKind::Database,
                &db(),
                &AlterOptions::Unset {
                    properties: vec!["LOG_LEVEL".to_string()],
                },
            )
            .await
            .unwrap();

        let params = platform
            .show_parameters(&ctx, ObjectKind::Database, &db())
            .await
            .unwrap();
        let log = params.iter().find(|p| p.key == "LOG_LEVEL").unwrap();
        assert_eq!(log.value, "WARN");
        assert_eq!(log.level, ParameterLevel::Account);
    }

    #[tokio::test]
    async fn injected_failures_fire_once() {
        let platform = InMemoryPlatform::new();
        let ctx = Context::new();
        platform.insert(ObjectKind::Database, db(), PropertyMap::new());
        platform.fail_next_alter("set", "insufficient privileges");

        let set = AlterOptions::Set {
            properties: options(&[("comment", json!("x"))]).properties,
            wait_for_completion: false,
        };
        let err = platform
            .alter(&ctx, ObjectKind::Database, &db(), &set)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "insufficient privileges");
        platform
            .alter(&ctx, ObjectKind::Database, &db(), &set)
            .await
            .unwrap();

        let labels: Vec<String> = platform.calls().iter().map(PlatformCall::label).collect();
        assert_eq!(labels, ["alter:set", "alter:set"]);
    }

    #[tokio::test]
    async fn failover_requires_replication() {
        let platform = InMemoryPlatform::new();
        let ctx = Context::new();
        platform.insert(ObjectKind::Database, db(), PropertyMap::new());
        let target = AccountIdentifier::new("ORG", "SECONDARY");

        let err = platform
            .alter(
                &ctx,
                ObjectKind::Database,
                &db(),
                &AlterOptions::EnableFailover {
                    accounts: vec![target.clone()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));

        for alter in [
            AlterOptions::EnableReplication {
                accounts: vec![target.clone()],
                ignore_edition_check: true,
            },
            AlterOptions::EnableFailover {
                accounts: vec![target.clone()],
            },
        ] {
            platform
                .alter(&ctx, ObjectKind::Database, &db(), &alter)
                .await
                .unwrap();
        }

        let details = platform.details(ObjectKind::Database, &db()).unwrap();
        assert_eq!(
            details.get("replication_accounts"),
            Some(&json!([{"account": "\"ORG\".\"SECONDARY\"", "with_failover": true}]))
        );
    }

    #[tokio::test]
    async fn rename_moves_the_object() {
        let platform = InMemoryPlatform::new();
        let ctx = Context::new();
        let renamed: Identifier = AccountObjectIdentifier::new("DB2").into();
        platform.insert(ObjectKind::Database, db(), PropertyMap::new());

        platform
            .alter(
                &ctx,
                ObjectKind::Database,
                &db(),
                &AlterOptions::Rename {
                    new_name: renamed.clone(),
                },
            )
            .await
            .unwrap();

        assert!(!platform.exists(ObjectKind::Database, &db()));
        assert!(platform.exists(ObjectKind::Database, &renamed));
        let err = platform
            .get_by_id(&ctx, ObjectKind::Database, &db())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn cancellation_fires_after_matching_alter() {
        let platform = InMemoryPlatform::new();
        let ctx = Context::new();
        platform.insert(ObjectKind::Database, db(), PropertyMap::new());
        platform.cancel_after_alter("set", ctx.clone());

        let unset = AlterOptions::Unset {
            properties: vec!["comment".to_string()],
        };
        platform.alter(&ctx, ObjectKind::Database, &db(), &unset).await.unwrap();
        assert!(ctx.check_cancelled().is_ok());

        let set = AlterOptions::Set {
            properties: PropertyMap::from([("comment".to_string(), json!("x"))]),
            wait_for_completion: false,
        };
        platform.alter(&ctx, ObjectKind::Database, &db(), &set).await.unwrap();
        assert!(ctx.check_cancelled().is_err());
    }
}
