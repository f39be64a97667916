//! Schema-driven planning shared by every resource type.

use serde_json::{Map, Value};

use crate::schema::{Attribute, Schema};
use crate::types::{AttributeChange, PlanResult};
use crate::validation::json_equivalent;

/// Compute the plan for one resource.
///
/// - A null proposal plans destruction.
/// - Without prior state every configured attribute is an addition and
///   computed attributes are left unknown.
/// - With prior state, computed attributes are carried over, set-typed
///   attributes compare as sets and attributes listed in `json_attributes`
///   compare semantically. Changing a `force_new` attribute requires
///   replacement.
pub fn diff(
    schema: &Schema,
    json_attributes: &[&str],
    prior: Option<&Value>,
    proposed: Value,
) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());

    let mut planned = match proposed {
        Value::Null => return destroy(prior),
        Value::Object(map) => map,
        other => return PlanResult::no_change(other),
    };

    let mut names: Vec<&String> = schema
        .block
        .attributes
        .keys()
        .chain(schema.block.blocks.keys())
        .collect();
    names.sort();

    let mut changes = Vec::new();
    let mut requires_replace = false;

    for name in names {
        let attribute = schema.block.attributes.get(name.as_str());
        let after = planned.get(name.as_str()).cloned().unwrap_or(Value::Null);

        let Some(prior) = prior else {
            match attribute {
                Some(attr) if attr.flags.is_computed_only() => {
                    planned.insert(name.clone(), Value::Null);
                }
                _ => {
                    let after = with_default(attribute, after);
                    if !after.is_null() {
                        planned.insert(name.clone(), after.clone());
                        changes.push(AttributeChange::added(name.as_str(), after));
                    }
                }
            }
            continue;
        };

        let before = prior.get(name.as_str()).cloned().unwrap_or(Value::Null);
        if let Some(attr) = attribute {
            if attr.flags.is_computed_only() || (attr.flags.computed && after.is_null()) {
                planned.insert(name.clone(), before);
                continue;
            }
        }

        let after = with_default(attribute, after);
        let is_json = json_attributes.contains(&name.as_str());
        if equivalent(attribute, is_json, &before, &after) {
            planned.insert(name.clone(), before);
            continue;
        }

        if attribute.is_some_and(|attr| attr.force_new) {
            requires_replace = true;
        }
        planned.insert(name.clone(), after.clone());
        changes.push(match (before.is_null(), after.is_null()) {
            (true, _) => AttributeChange::added(name.as_str(), after),
            (false, true) => AttributeChange::removed(name.as_str(), before),
            (false, false) => AttributeChange::modified(name.as_str(), before, after),
        });
    }

    if requires_replace {
        clear_computed(schema, &mut planned);
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

fn destroy(prior: Option<&Value>) -> PlanResult {
    let changes = prior
        .and_then(Value::as_object)
        .map(|map| {
            let mut removed: Vec<_> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| AttributeChange::removed(k.as_str(), v.clone()))
                .collect();
            removed.sort_by(|a, b| a.path.cmp(&b.path));
            removed
        })
        .unwrap_or_default();
    PlanResult::with_changes(Value::Null, changes, false)
}

fn with_default(attribute: Option<&Attribute>, value: Value) -> Value {
    match (value, attribute.and_then(|a| a.default.as_ref())) {
        (Value::Null, Some(default)) => default.clone(),
        (value, _) => value,
    }
}

fn equivalent(attribute: Option<&Attribute>, is_json: bool, before: &Value, after: &Value) -> bool {
    if before == after {
        return true;
    }
    if is_json {
        if let (Some(a), Some(b)) = (before.as_str(), after.as_str()) {
            return json_equivalent(a, b);
        }
    }
    if attribute.is_some_and(|a| a.attr_type.is_set()) {
        return sorted(before) == sorted(after);
    }
    false
}

fn sorted(value: &Value) -> Option<Vec<String>> {
    let mut items: Vec<String> = value.as_array()?.iter().map(Value::to_string).collect();
    items.sort();
    items.dedup();
    Some(items)
}

fn clear_computed(schema: &Schema, planned: &mut Map<String, Value>) {
    for (name, attr) in &schema.block.attributes {
        if attr.flags.is_computed_only() {
            planned.insert(name.clone(), Value::Null);
        }
    }
}
