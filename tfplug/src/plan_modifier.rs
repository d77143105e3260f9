use crate::resource::{ModifyPlanRequest, ModifyPlanResponse};
use crate::schema::Schema;
use crate::types::{AttributePath, Diagnostics, Dynamic};

#[derive(Debug, Clone)]
pub struct PlanModifyRequest {
    pub state: Dynamic,
    pub plan: Dynamic,
    pub config: Dynamic,
    pub attribute_path: AttributePath,
    /// False while planning a create
    pub resource_exists: bool,
}

#[derive(Debug, Clone)]
pub struct PlanModifyResponse {
    pub plan_value: Dynamic,
    pub requires_replace: bool,
    pub diagnostics: Diagnostics,
}

impl PlanModifyResponse {
    fn keep(request: PlanModifyRequest) -> Self {
        Self {
            plan_value: request.plan,
            requires_replace: false,
            diagnostics: Diagnostics::new(),
        }
    }
}

/// Trait for modifying the planned value of one attribute
///
/// Plan modifiers run after the proposed new state is computed and can:
/// - Modify the planned value
/// - Mark an attribute as requiring replacement
/// - Add warnings or errors to the plan
pub trait PlanModifier: Send + Sync {
    fn description(&self) -> String;

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse;
}

/// Marks an attribute as requiring replacement when it changes
pub struct RequiresReplaceIfChanged;

impl PlanModifier for RequiresReplaceIfChanged {
    fn description(&self) -> String {
        "changing this value forces a new resource".to_string()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let requires_replace = request.resource_exists
            && !request.plan.is_unknown()
            && !request.state.semantically_equal(&request.plan);

        PlanModifyResponse {
            requires_replace,
            ..PlanModifyResponse::keep(request)
        }
    }
}

/// Marks an attribute as requiring replacement when a previously set value
/// is removed from configuration
pub struct RequiresReplaceIfRemoved;

impl PlanModifier for RequiresReplaceIfRemoved {
    fn description(&self) -> String {
        "removing this value forces a new resource".to_string()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let requires_replace =
            request.resource_exists && request.state.is_known() && request.plan.is_null();

        PlanModifyResponse {
            requires_replace,
            ..PlanModifyResponse::keep(request)
        }
    }
}

/// A plan modifier that uses the current state value when the planned value is unknown
///
/// Useful for computed attributes that never change after creation.
pub struct UseStateForUnknown;

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "value does not change after creation".to_string()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let plan_value = if request.plan.is_unknown() && request.state.is_known() {
            request.state.clone()
        } else {
            request.plan.clone()
        };

        PlanModifyResponse {
            plan_value,
            ..PlanModifyResponse::keep(request)
        }
    }
}

pub struct RequiresReplaceIf<F>
where
    F: Fn(&PlanModifyRequest) -> bool + Send + Sync,
{
    predicate: F,
    description: String,
}

impl<F> RequiresReplaceIf<F>
where
    F: Fn(&PlanModifyRequest) -> bool + Send + Sync,
{
    pub fn new(predicate: F, description: impl Into<String>) -> Self {
        Self {
            predicate,
            description: description.into(),
        }
    }
}

impl<F> PlanModifier for RequiresReplaceIf<F>
where
    F: Fn(&PlanModifyRequest) -> bool + Send + Sync,
{
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let requires_replace = request.resource_exists && (self.predicate)(&request);

        PlanModifyResponse {
            requires_replace,
            ..PlanModifyResponse::keep(request)
        }
    }
}

/// Framework planning that runs before any resource-specific plan logic:
/// 1. Computed attributes not set in configuration become unknown on create
///    and keep their prior value on update
/// 2. Schema plan modifiers run for every attribute
pub fn plan_resource_change(schema: &Schema, request: &ModifyPlanRequest) -> ModifyPlanResponse {
    let mut response = ModifyPlanResponse {
        planned_state: request.proposed_new_state.clone(),
        requires_replace: Vec::new(),
        planned_private: request.prior_private.clone(),
        diagnostics: Diagnostics::new(),
    };

    // Destroy plans pass through untouched
    if request.proposed_new_state.is_null() {
        return response;
    }

    let resource_exists = !request.prior_state.is_null();

    for attribute in &schema.block.attributes {
        let name = attribute.name.as_str();
        let config_value = request.config.attr(name).clone();
        let state_value = request.prior_state.attr(name).clone();
        let mut plan_value = response.planned_state.attr(name).clone();

        if attribute.computed && config_value.is_null() {
            plan_value = if resource_exists && !state_value.is_null() {
                state_value.clone()
            } else {
                Dynamic::Unknown
            };
        }

        for modifier in &attribute.plan_modifiers {
            let result = modifier.modify_plan(PlanModifyRequest {
                state: state_value.clone(),
                plan: plan_value,
                config: config_value.clone(),
                attribute_path: AttributePath::new(name),
                resource_exists,
            });
            plan_value = result.plan_value;
            response.diagnostics.extend(result.diagnostics);
            if result.requires_replace {
                let path = AttributePath::new(name);
                if !response.requires_replace.contains(&path) {
                    response.requires_replace.push(path);
                }
            }
        }

        response.planned_state.set_attr(name, plan_value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
    use crate::types::DynamicValue;
    use std::sync::Arc;

    fn request(state: Dynamic, plan: Dynamic, exists: bool) -> PlanModifyRequest {
        PlanModifyRequest {
            state,
            plan: plan.clone(),
            config: plan,
            attribute_path: AttributePath::new("attr"),
            resource_exists: exists,
        }
    }

    #[test]
    fn requires_replace_if_changed_detects_change() {
        let response = RequiresReplaceIfChanged.modify_plan(request(
            Dynamic::string("a"),
            Dynamic::string("b"),
            true,
        ));
        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_if_changed_ignores_create() {
        let response =
            RequiresReplaceIfChanged.modify_plan(request(Dynamic::Null, Dynamic::string("b"), false));
        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_if_changed_ignores_unknown_plan() {
        let response = RequiresReplaceIfChanged.modify_plan(request(
            Dynamic::string("a"),
            Dynamic::Unknown,
            true,
        ));
        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_if_removed_only_on_removal() {
        let removed = RequiresReplaceIfRemoved.modify_plan(request(
            Dynamic::string("XSMALL"),
            Dynamic::Null,
            true,
        ));
        assert!(removed.requires_replace);

        let changed = RequiresReplaceIfRemoved.modify_plan(request(
            Dynamic::string("XSMALL"),
            Dynamic::string("LARGE"),
            true,
        ));
        assert!(!changed.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_keeps_prior_value() {
        let response =
            UseStateForUnknown.modify_plan(request(Dynamic::string("id-1"), Dynamic::Unknown, true));
        assert_eq!(response.plan_value, Dynamic::string("id-1"));
    }

    #[test]
    fn requires_replace_if_uses_predicate() {
        let modifier = RequiresReplaceIf::new(
            |req: &PlanModifyRequest| req.plan == Dynamic::Bool(true),
            "turning this on recreates the object",
        );
        let response = modifier.modify_plan(request(Dynamic::Bool(false), Dynamic::Bool(true), true));
        assert!(response.requires_replace);
        assert_eq!(modifier.description(), "turning this on recreates the object");
    }

    #[test]
    fn plan_resource_change_marks_computed_unknown_on_create() {
        let schema = SchemaBuilder::new()
            .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .build();

        let mut config = DynamicValue::object();
        config.set_attr("name", Dynamic::string("WH"));

        let response = plan_resource_change(
            &schema,
            &ModifyPlanRequest {
                type_name: "test".to_string(),
                config: config.clone(),
                prior_state: DynamicValue::null(),
                proposed_new_state: config,
                prior_private: Vec::new(),
            },
        );

        assert!(response.planned_state.attr("id").is_unknown());
        assert!(response.requires_replace.is_empty());
    }

    #[test]
    fn plan_resource_change_collects_replacements() {
        let schema = SchemaBuilder::new()
            .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::new("is_transient", AttributeType::Bool)
                    .optional()
                    .plan_modifier(Arc::new(RequiresReplaceIfChanged))
                    .build(),
            )
            .build();

        let mut prior = DynamicValue::object();
        prior.set_attr("id", Dynamic::string("DB"));
        prior.set_attr("is_transient", Dynamic::Bool(false));

        let mut config = DynamicValue::object();
        config.set_attr("is_transient", Dynamic::Bool(true));

        let response = plan_resource_change(
            &schema,
            &ModifyPlanRequest {
                type_name: "test".to_string(),
                config: config.clone(),
                prior_state: prior,
                proposed_new_state: config,
                prior_private: Vec::new(),
            },
        );

        assert_eq!(response.planned_state.attr("id"), &Dynamic::string("DB"));
        assert_eq!(response.requires_replace, vec![AttributePath::new("is_transient")]);
    }
}
