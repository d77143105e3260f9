#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use std::sync::Arc;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::resource::{
    CreateResourceRequest, CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ModifyPlanRequest, ReadResourceRequest, ReadResourceResponse,
    UpdateResourceRequest, UpdateResourceResponse, ValidateResourceConfigRequest,
};
use tfplug::validator::{ExactlyOneOf, StringLengthValidator};
use tfplug::{
    AttributeBuilder, AttributePath, AttributeType, Context, Diagnostics, Dynamic, DynamicValue,
    PrivateStateData, Resource, Schema, SchemaBuilder,
};

struct TestResource;

#[async_trait]
impl Resource for TestResource {
    fn type_name(&self) -> &str {
        "test_bucket"
    }

    fn schema(&self) -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Test bucket")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(Arc::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .validator(Arc::new(StringLengthValidator {
                        min: Some(3),
                        max: Some(63),
                    }))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("region", AttributeType::String)
                    .optional()
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("source_url", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("source_text", AttributeType::String)
                    .optional()
                    .build(),
            )
            .config_validator(Arc::new(ExactlyOneOf::new(&["source_url", "source_text"])))
            .build()
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut state = request.planned_state;
        state.set_attr("id", Dynamic::string("bucket-1"));
        CreateResourceResponse {
            new_state: state,
            private: request.planned_private,
            diagnostics: Diagnostics::new(),
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        ReadResourceResponse {
            new_state: Some(request.current_state),
            diagnostics: Diagnostics::new(),
            private: request.private,
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: request.planned_private,
            diagnostics: Diagnostics::new(),
        }
    }

    async fn delete(&self, _ctx: Context, _request: DeleteResourceRequest) -> DeleteResourceResponse {
        DeleteResourceResponse {
            diagnostics: Diagnostics::new(),
        }
    }
}

fn object(pairs: &[(&str, Dynamic)]) -> DynamicValue {
    let mut value = DynamicValue::object();
    for (name, v) in pairs {
        value.set_attr(name, v.clone());
    }
    value
}

#[tokio::test]
async fn default_validation_runs_schema_checks() {
    let resource = TestResource;

    let valid = object(&[
        ("name", Dynamic::string("logs")),
        ("source_text", Dynamic::string("hello")),
    ]);
    let response = resource
        .validate(
            Context::new(),
            ValidateResourceConfigRequest {
                type_name: "test_bucket".to_string(),
                config: valid,
            },
        )
        .await;
    assert!(!response.diagnostics.has_errors());

    let invalid = object(&[
        ("name", Dynamic::string("x")),
        ("source_url", Dynamic::string("https://example.com")),
        ("source_text", Dynamic::string("hello")),
    ]);
    let response = resource
        .validate(
            Context::new(),
            ValidateResourceConfigRequest {
                type_name: "test_bucket".to_string(),
                config: invalid,
            },
        )
        .await;
    assert!(response.diagnostics.errors.len() >= 2);
}

#[tokio::test]
async fn default_planning_keeps_ids_and_flags_replacement() {
    let resource = TestResource;
    let prior = object(&[
        ("id", Dynamic::string("bucket-1")),
        ("name", Dynamic::string("logs")),
        ("region", Dynamic::string("eu-west-1")),
        ("source_text", Dynamic::string("hello")),
    ]);
    let config = object(&[
        ("name", Dynamic::string("logs")),
        ("region", Dynamic::string("us-east-1")),
        ("source_text", Dynamic::string("hello")),
    ]);

    let mut private = PrivateStateData::new();
    private.set_key("marker", b"kept".to_vec());
    let private = private.encode().unwrap();

    let response = resource
        .modify_plan(
            Context::new(),
            ModifyPlanRequest {
                type_name: "test_bucket".to_string(),
                config: config.clone(),
                prior_state: prior,
                proposed_new_state: config,
                prior_private: private.clone(),
            },
        )
        .await;

    assert_eq!(response.planned_state.attr("id"), &Dynamic::string("bucket-1"));
    assert_eq!(response.requires_replace, vec![AttributePath::new("region")]);
    assert_eq!(response.planned_private, private);
    let decoded = PrivateStateData::decode(&response.planned_private).unwrap();
    assert_eq!(decoded.get_key("marker"), Some(&b"kept"[..]));
}

#[tokio::test]
async fn default_import_copies_id() {
    let resource = TestResource;
    let response = resource
        .import_state(
            Context::new(),
            ImportResourceStateRequest {
                type_name: "test_bucket".to_string(),
                id: "bucket-7".to_string(),
            },
        )
        .await;
    assert!(!response.diagnostics.has_errors());
    assert_eq!(
        response.imported_resources[0].state.attr("id"),
        &Dynamic::string("bucket-7")
    );

    let empty = resource
        .import_state(
            Context::new(),
            ImportResourceStateRequest {
                type_name: "test_bucket".to_string(),
                id: "  ".to_string(),
            },
        )
        .await;
    assert!(empty.diagnostics.has_errors());
    assert!(empty.imported_resources.is_empty());
}
