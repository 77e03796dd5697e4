//! Auto-value engine.
//!
//! Runs every auto-value function of a schema over a document or modifier,
//! parents before children, and applies what each function asks for.

use std::cell::Cell;
use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::hooks::{AutoValue, AutoValueContext, AutoValueFn};
use crate::keys::{depth, last_part_of_key, parent_of_key};
use crate::mongo_object::{is_each_wrapper, MongoObject, Position, PositionInfo};
use crate::schema::AutoValueEntry;

/// The auto-value function a bare `defaultValue` turns into.
pub(crate) fn default_auto_value(default: Value) -> AutoValueFn {
    Arc::new(move |ctx: &AutoValueContext<'_>| {
        if ctx.is_set() {
            return AutoValue::NoChange;
        }
        match ctx.operator {
            None => AutoValue::Replace(default.clone()),
            // Pulling an object out of an array must not put the default back.
            Some("$pull") => AutoValue::NoChange,
            Some("$push" | "$addToSet") => AutoValue::Replace(default.clone()),
            Some(_) if ctx.parent_field().is_set => AutoValue::Replace(default.clone()),
            Some(_) if ctx.is_upsert => AutoValue::set_on_insert(default.clone()),
            Some(_) => AutoValue::NoChange,
        }
    })
}

/// Run the entries over `object` in place.
pub(crate) fn set_auto_values(
    entries: &[AutoValueEntry],
    object: &mut MongoObject,
    is_upsert: bool,
    extended: &Map<String, Value>,
) {
    let mut sorted: Vec<&AutoValueEntry> = entries.iter().collect();
    sorted.sort_by_key(|entry| depth(&entry.field_name));

    for entry in sorted {
        let mut done: HashSet<String> = HashSet::new();
        for info in positions_for_auto_value(&entry.field_name, object) {
            if !done.insert(info.key.clone()) {
                continue;
            }
            let (result, unset) = {
                let ctx = AutoValueContext {
                    key: &info.key,
                    value: info.value.as_ref(),
                    operator: info.operator.as_deref(),
                    is_modifier: object.is_modifier(),
                    is_upsert,
                    closest_subschema_field_name: entry.closest_subschema_field_name.as_deref(),
                    document: object,
                    parent: object.get_info_for_key(parent_of_key(&info.key)),
                    extended,
                    unset_requested: Cell::new(false),
                };
                let result = (entry.func)(&ctx);
                (result, ctx.unset_requested.get())
            };
            apply(object, &info, result, unset);
        }
    }
    object.remove_array_items();
}

fn apply(object: &mut MongoObject, info: &PositionInfo, result: AutoValue, unset: bool) {
    if unset {
        trace!(key = %info.key, position = %info.position, "auto-value unset");
        object.remove_value_for_position(&info.position);
        return;
    }
    match result {
        AutoValue::NoChange => {}
        AutoValue::Unset => {
            trace!(key = %info.key, position = %info.position, "auto-value unset");
            object.remove_value_for_position(&info.position);
        }
        AutoValue::Replace(value) => {
            trace!(key = %info.key, position = %info.position, "auto-value set");
            object.set_value_for_position(&info.position, value);
        }
        // A plain document is an insert, so the operator does not apply.
        AutoValue::Modifier { value, .. } if !object.is_modifier() => {
            trace!(key = %info.key, position = %info.position, "auto-value set");
            object.set_value_for_position(&info.position, value);
        }
        AutoValue::Modifier { operator, value } => {
            let target = Position::new([operator.as_str(), info.key.as_str()]);
            trace!(key = %info.key, position = %target, "auto-value moved to operator");
            if info.value.is_some() && info.position != target {
                object.remove_value_for_position(&info.position);
            }
            let mut value = value;
            if let (Some(existing), Some(added)) = (
                object
                    .get_value_for_position(&target)
                    .filter(|v| is_each_wrapper(v)),
                value.get("$each").and_then(Value::as_array),
            ) {
                let mut wrapper = existing.clone();
                if let Some(Value::Array(items)) = wrapper.get_mut("$each") {
                    items.extend(added.iter().cloned());
                }
                value = wrapper;
            }
            object.set_value_for_position(&target, value);
        }
    }
}

/// Where a field is, or would be, in the current document.
///
/// Besides the positions the field occupies, a top-level field gets a would-be
/// position at its own key and a nested field gets one under each position of
/// its parent. A parent that a modifier only creates implicitly
/// (`$set: {"a.b": 1}` creates `a`) counts as present. A field the modifier
/// already creates implicitly gets only its real positions.
fn positions_for_auto_value(field_name: &str, object: &MongoObject) -> Vec<PositionInfo> {
    let mut positions = object.positions_info_for_generic_key(field_name);
    let is_modifier = object.is_modifier();
    if is_modifier && !object.positions_that_create_generic_key(field_name).is_empty() {
        return positions;
    }

    let would_be = |key: &str| PositionInfo {
        position: if is_modifier {
            Position::new(["$set", key])
        } else {
            Position::new(key.split('.'))
        },
        key: key.to_string(),
        value: None,
        operator: is_modifier.then(|| "$set".to_string()),
    };

    if !field_name.contains('.') {
        if positions.is_empty() {
            positions.push(would_be(field_name));
        }
        return positions;
    }

    let parent = parent_of_key(field_name);
    let last = last_part_of_key(field_name);
    let parent_positions = object.positions_info_for_generic_key(parent);
    if !parent_positions.is_empty() {
        for info in parent_positions {
            if info.value.as_ref().is_some_and(|v| !v.is_object()) {
                continue;
            }
            let position = info.position.child(last);
            if positions.iter().any(|p| p.position == position) {
                continue;
            }
            positions.push(PositionInfo {
                key: format!("{}.{last}", info.key),
                position,
                value: None,
                operator: info.operator,
            });
        }
    } else {
        // A missing parent only counts when a modifier creates it implicitly.
        for created in object.positions_that_create_generic_key(parent) {
            let key = format!("{}.{last}", created.key);
            if !positions.iter().any(|p| p.key == key) {
                positions.push(would_be(&key));
            }
        }
    }
    positions
}
