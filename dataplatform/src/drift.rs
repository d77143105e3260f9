//! Drift detection against the object snapshot
//!
//! A read compares what the platform reports now with the snapshot taken at
//! the last apply or refresh. Only attributes whose observed value moved
//! since then are written into public state; the rest keep the form the
//! user configured. Parameters inherited from an enclosing scope always
//! surface as null.

use crate::api::ObjectDetails;
use crate::marshal::{from_platform, normalize_public, snapshot_form, AttributeSpec, Origin};
use crate::parameters::{ParameterLevel, Resolution};
use crate::private_state::ObjectSnapshot;
use serde_json::Value;
use std::collections::BTreeMap;
use tfplug::{Dynamic, DynamicValue};

/// One attribute as currently reported by the platform
#[derive(Debug, Clone, PartialEq)]
pub struct Observed {
    /// Public-state form
    pub value: Dynamic,
    /// Scalar recorded in the snapshot; `None` for null and inherited values
    pub snapshot: Option<Value>,
    /// Parameter value set at another scope
    pub inherited: bool,
}

impl Observed {
    pub fn new(spec: &AttributeSpec, value: Dynamic) -> Self {
        Self {
            snapshot: snapshot_form(spec, &value),
            value,
            inherited: false,
        }
    }

    pub fn inherited() -> Self {
        Self {
            value: Dynamic::Null,
            snapshot: None,
            inherited: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    values: BTreeMap<String, Observed>,
}

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe every attribute the table marks as observed
    ///
    /// `current` supplies surface forms for set attributes so a reordered or
    /// requoted set is not reported as drift.
    pub fn collect(
        specs: &[AttributeSpec],
        details: &ObjectDetails,
        resolution: &Resolution,
        own_level: ParameterLevel,
        current: &DynamicValue,
    ) -> Self {
        let mut observation = Self::new();

        for spec in specs.iter().filter(|s| s.observed) {
            let observed = match spec.origin {
                Origin::Property => Observed::new(
                    spec,
                    from_platform(spec, details, current.attr(spec.attribute)),
                ),
                Origin::Parameter => match resolution.values.get(spec.attribute) {
                    Some(resolved) if resolved.level == own_level => {
                        Observed::new(spec, normalize_public(spec, resolved.observed.clone()))
                    }
                    Some(_) => Observed::inherited(),
                    None => Observed::new(spec, Dynamic::Null),
                },
            };
            observation.insert(spec.attribute, observed);
        }

        observation
    }

    pub fn insert(&mut self, attribute: &str, observed: Observed) {
        self.values.insert(attribute.to_string(), observed);
    }

    pub fn get(&self, attribute: &str) -> Option<&Observed> {
        self.values.get(attribute)
    }

    /// Observed public value, null when the attribute was not observed
    pub fn value(&self, attribute: &str) -> Dynamic {
        self.values
            .get(attribute)
            .map(|o| o.value.clone())
            .unwrap_or(Dynamic::Null)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Observed)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `base` with every observed attribute replaced by its observation
    pub fn snapshot(&self, base: &ObjectSnapshot) -> ObjectSnapshot {
        let mut next = base.clone();
        for (attribute, observed) in &self.values {
            next.set(attribute, observed.snapshot.clone());
        }
        next
    }
}

/// Outcome of comparing one observation with the previous snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub snapshot: ObjectSnapshot,
    /// Attributes whose public value was replaced
    pub drifted: Vec<String>,
}

/// Write drifted values into `state` and compute the next snapshot
pub fn reconcile(
    observation: &Observation,
    previous: &ObjectSnapshot,
    state: &mut DynamicValue,
) -> Reconciled {
    let mut drifted = Vec::new();

    for (attribute, observed) in observation.iter() {
        if observed.inherited {
            if !state.attr(attribute).is_null() {
                state.set_attr(attribute, Dynamic::Null);
                drifted.push(attribute.to_string());
            }
            continue;
        }
        if previous.get(attribute) != observed.snapshot.as_ref() {
            if !state.attr(attribute).semantically_equal(&observed.value) {
                drifted.push(attribute.to_string());
            }
            state.set_attr(attribute, observed.value.clone());
        }
    }

    if !drifted.is_empty() {
        tracing::info!(attributes = ?drifted, "detected drift");
    }

    Reconciled {
        snapshot: observation.snapshot(previous),
        drifted,
    }
}

/// Keep the prior value for attributes whose planned value is the same
/// platform value as the one recorded in the snapshot
pub fn suppress_snapshot_equal(
    specs: &[AttributeSpec],
    prior: &DynamicValue,
    snapshot: &ObjectSnapshot,
    planned: &mut DynamicValue,
) -> Vec<&'static str> {
    let mut suppressed = Vec::new();

    for spec in specs.iter().filter(|s| s.observed && !s.computed) {
        let planned_value = planned.attr(spec.attribute);
        let prior_value = prior.attr(spec.attribute);
        if planned_value.is_unknown() || planned_value.semantically_equal(prior_value) {
            continue;
        }
        let Some(recorded) = snapshot.get(spec.attribute) else {
            continue;
        };
        if snapshot_form(spec, planned_value).as_ref() == Some(recorded) {
            let kept = prior_value.clone();
            planned.set_attr(spec.attribute, kept);
            suppressed.push(spec.attribute);
        }
    }

    suppressed
}
