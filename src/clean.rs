//! Document cleaning.
//!
//! Cleaning prepares input for validation: it drops keys the schema does not
//! allow, converts values to the declared type where that is lossless enough,
//! trims strings, removes empty strings and finally runs auto-values.
//! Nothing below a blackbox key is touched.

use chrono::SecondsFormat;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::autovalue::set_auto_values;
use crate::checks::is_of_type;
use crate::definition::TypeTag;
use crate::ejson;
use crate::keys::make_key_generic;
use crate::mongo_object::{looks_like_modifier, MongoObject, Position};
use crate::schema::Schema;
use crate::types::{CleanOptions, IGNORED_VALUE_OPERATORS};

/// Operators whose values are matched against, renamed to or counted rather
/// than stored, so converting them would change their meaning.
const NO_CONVERT_OPERATORS: &[&str] = &["$pull", "$pullAll", "$pop", "$rename"];

/// Clean a copy of `doc`.
pub fn clean(schema: &Schema, doc: &Value, options: &CleanOptions) -> Value {
    clean_owned(schema, doc.clone(), options)
}

/// Clean `doc` where it is.
pub fn clean_in_place(schema: &Schema, doc: &mut Value, options: &CleanOptions) {
    let owned = std::mem::take(doc);
    *doc = clean_owned(schema, owned, options);
}

fn clean_owned(schema: &Schema, doc: Value, options: &CleanOptions) -> Value {
    let is_modifier = options.is_modifier.unwrap_or_else(|| looks_like_modifier(&doc));
    let mut object = MongoObject::with_mode(doc, schema.blackbox_keys(), is_modifier);

    if options.filter || options.auto_convert || options.remove_empty_strings || options.trim_strings {
        clean_values(schema, &mut object, options);
    }

    if options.get_auto_values {
        set_auto_values(
            &schema.auto_value_functions(),
            &mut object,
            options.is_upsert,
            &options.extend_auto_value_context,
        );
    }

    let mut doc = object.into_inner();
    if is_modifier {
        if let Some(operators) = doc.as_object_mut() {
            operators.retain(|_, payload| !payload.as_object().is_some_and(Map::is_empty));
        }
    }
    doc
}

fn clean_values(schema: &Schema, object: &mut MongoObject, options: &CleanOptions) {
    let mut removed: Vec<Position> = Vec::new();
    let nodes = object.nodes().to_vec();

    for node in nodes {
        let operator = node.operator.as_deref();
        if operator.is_some_and(|op| IGNORED_VALUE_OPERATORS.contains(&op)) {
            continue;
        }
        let (Some(key), Some(generic)) = (node.key.as_deref(), node.generic_key.as_deref()) else {
            continue;
        };
        if object.is_removed(&node.position) {
            continue;
        }
        let Some(mut value) = object.get_value_for_position(&node.position).cloned() else {
            continue;
        };

        let drop_null = options.remove_nulls_from_arrays && node.is_array_item && value.is_null();
        if (options.filter && !schema.allows_key(generic)) || drop_null {
            let target = each_wrapper_target(schema, &node.position).unwrap_or_else(|| node.position.clone());
            debug!(key, position = %target, "removing key");
            object.remove_value_for_position(&target);
            removed.push(target);
            continue;
        }

        let definition = schema.get_definition(key, None);
        let alternatives = definition.as_ref().map(|def| def.alternatives.as_slice()).unwrap_or_default();

        if options.auto_convert && !operator.is_some_and(|op| NO_CONVERT_OPERATORS.contains(&op)) {
            if let Some(first) = alternatives.first() {
                let typed = alternatives
                    .iter()
                    .any(|alternative| is_of_type(&alternative.type_tag, &value));
                if !typed {
                    let converted = convert_to_proper_type(&value, &first.type_tag);
                    if converted != value {
                        debug!(key, from = %value, to = %converted, "converted value");
                        object.set_value_for_position(&node.position, converted.clone());
                        value = converted;
                    }
                }
            }
        }

        let trim = alternatives.first().map_or(true, |alternative| alternative.trim);
        if options.trim_strings && trim {
            if let Value::String(s) = &value {
                let trimmed = s.trim();
                if trimmed.len() != s.len() {
                    debug!(key, "trimmed string");
                    let trimmed = Value::String(trimmed.to_string());
                    object.set_value_for_position(&node.position, trimmed.clone());
                    value = trimmed;
                }
            }
        }

        let in_set = matches!(operator, None | Some("$set"));
        if options.remove_empty_strings && in_set && value.as_str() == Some("") {
            debug!(key, position = %node.position, "removing empty string");
            object.remove_value_for_position(&node.position);
            // Directly set keys are unset instead; keys inside a set object
            // disappear with the object's new value.
            if operator.is_some() && node.position.len() == 2 {
                let field = &node.position.segments()[1];
                object.set_value_for_position(
                    &Position::new(["$unset", field.as_str()]),
                    Value::String(String::new()),
                );
            }
        }
    }

    for position in removed {
        remove_empty_parents(object, position);
    }
    object.remove_array_items();
}

/// For an item of a `$push: {field: {$each: [...]}}` whose field is not
/// allowed, the whole push of that field.
fn each_wrapper_target(schema: &Schema, position: &Position) -> Option<Position> {
    match position.segments() {
        [op, field, each, _] if each == "$each" && !schema.allows_key(&make_key_generic(field)) => {
            Some(Position::new([op.as_str(), field.as_str()]))
        }
        _ => None,
    }
}

fn remove_empty_parents(object: &mut MongoObject, position: Position) {
    let mut current = position;
    while let Some(parent) = current.parent() {
        if parent.is_root() {
            break;
        }
        let is_empty = object
            .get_value_for_position(&parent)
            .is_some_and(|value| value.as_object().is_some_and(Map::is_empty));
        if !is_empty {
            break;
        }
        object.remove_value_for_position(&parent);
        current = parent;
    }
}

/// Convert a value to a type where an obvious conversion exists; otherwise
/// return it unchanged so validation reports it.
///
/// Objects, arrays and `null` are never converted.
///
/// ```
/// use doc_schema::{convert_to_proper_type, TypeTag};
/// use serde_json::json;
///
/// assert_eq!(convert_to_proper_type(&json!("12"), &TypeTag::Number), json!(12));
/// assert_eq!(convert_to_proper_type(&json!("FALSE"), &TypeTag::Boolean), json!(false));
/// assert_eq!(convert_to_proper_type(&json!("x"), &TypeTag::Array), json!(["x"]));
/// assert_eq!(convert_to_proper_type(&json!("abc"), &TypeTag::Number), json!("abc"));
/// ```
pub fn convert_to_proper_type(value: &Value, type_tag: &TypeTag) -> Value {
    if value.is_null() || value.is_array() || ejson::is_plain_object(value) || ejson::is_binary(value) {
        return value.clone();
    }
    let converted = match (type_tag, value) {
        (TypeTag::String, Value::String(_)) => None,
        (TypeTag::String, Value::Number(n)) => Some(Value::String(number_to_string(n))),
        (TypeTag::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (TypeTag::String, date) => ejson::as_date(date)
            .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))),
        (TypeTag::Number | TypeTag::Integer, Value::String(s)) => parse_number(s),
        (TypeTag::Date, Value::String(s)) => ejson::parse_date_str(s).map(ejson::date),
        (TypeTag::Date, Value::Number(n)) => n
            .as_f64()
            .and_then(ejson::date_from_millis)
            .map(ejson::date),
        (TypeTag::Boolean, Value::String(s)) => match s.to_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (TypeTag::Boolean, Value::Number(n)) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
        (TypeTag::Array, other) => Some(Value::Array(vec![other.clone()])),
        _ => None,
    };
    converted.unwrap_or_else(|| value.clone())
}

fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let f: f64 = s.parse().ok()?;
    if !f.is_finite() {
        return None;
    }
    if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
        return Some(Value::Number(Number::from(f as i64)));
    }
    Number::from_f64(f).map(Value::Number)
}

fn number_to_string(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 => {
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Field, FieldSpec, TypeAlternative};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new([
            ("name", FieldSpec::from(Field::new(TypeTag::String).optional(true))),
            ("age", Field::new(TypeTag::Integer).optional(true).into()),
            ("active", Field::new(TypeTag::Boolean).optional(true).into()),
            ("code", Field::new(TypeTag::String).trim(false).optional(true).into()),
            ("tags", Field::new(TypeTag::Array).optional(true).into()),
            ("tags.$", FieldSpec::from(TypeTag::String)),
            ("address", Field::new(TypeTag::Object).optional(true).into()),
            ("address.city", Field::new(TypeTag::String).optional(true).into()),
            ("meta", Field::new(TypeTag::Object).blackbox(true).optional(true).into()),
        ])
        .unwrap()
    }

    fn clean_doc(doc: Value) -> Value {
        let schema = schema();
        clean(&schema, &doc, schema.clean_options())
    }

    #[test]
    fn filters_unknown_keys_and_empty_parents() {
        assert_eq!(
            clean_doc(json!({ "name": "x", "bad": 1, "address": { "zip": "1" } })),
            json!({ "name": "x" })
        );
        assert_eq!(
            clean_doc(json!({ "tags": ["a", { "no": 1 }] })),
            json!({ "tags": ["a"] }),
            "an item left empty by filtering goes too"
        );
    }

    #[test]
    fn converts_mismatched_values() {
        assert_eq!(
            clean_doc(json!({ "age": "42", "active": "TRUE", "name": 5, "tags": ["a", 2] })),
            json!({ "age": 42, "active": true, "name": "5", "tags": ["a", "2"] })
        );
        assert_eq!(clean_doc(json!({ "age": "old" })), json!({ "age": "old" }));
    }

    #[test]
    fn one_of_converts_only_when_nothing_matches() {
        let schema = Schema::new([(
            "id",
            Field::one_of([TypeTag::String, TypeTag::Number]),
        )])
        .unwrap();
        let options = schema.clean_options().clone();
        assert_eq!(clean(&schema, &json!({ "id": 5 }), &options), json!({ "id": 5 }));
        assert_eq!(clean(&schema, &json!({ "id": true }), &options), json!({ "id": "true" }));
    }

    #[test]
    fn constraint_failures_do_not_trigger_conversion() {
        let schema = Schema::new([(
            "flag",
            Field::one_of([
                TypeAlternative::new(TypeTag::Boolean),
                TypeAlternative::new(TypeTag::String).max(3),
            ]),
        )])
        .unwrap();
        let options = schema.clean_options().clone();
        assert_eq!(clean(&schema, &json!({ "flag": "true" }), &options), json!({ "flag": "true" }));
        assert_eq!(clean_doc(json!({ "age": 1.5 })), json!({ "age": 1.5 }));
    }

    #[test]
    fn trims_unless_disabled() {
        assert_eq!(
            clean_doc(json!({ "name": "  x ", "code": " y " })),
            json!({ "name": "x", "code": " y " })
        );
    }

    #[test]
    fn empty_strings_are_removed_or_unset() {
        assert_eq!(clean_doc(json!({ "name": "   ", "age": 1 })), json!({ "age": 1 }));
        assert_eq!(
            clean_doc(json!({ "$set": { "name": "", "age": 1 } })),
            json!({ "$set": { "age": 1 }, "$unset": { "name": "" } })
        );
    }

    #[test]
    fn modifiers_are_filtered_per_operator() {
        assert_eq!(
            clean_doc(json!({
                "$set": { "bad": 1 },
                "$push": { "nope": { "$each": [1, 2] } },
                "$unset": { "whatever": "" }
            })),
            json!({ "$unset": { "whatever": "" } })
        );
        assert_eq!(
            clean_doc(json!({ "$pull": { "tags": 5 }, "$inc": { "age": "2" } })),
            json!({ "$pull": { "tags": 5 }, "$inc": { "age": 2 } })
        );
    }

    #[test]
    fn nulls_in_arrays_are_optional_to_remove() {
        let schema = schema();
        let options = schema.clean_options().clone().remove_nulls_from_arrays(true);
        assert_eq!(
            clean(&schema, &json!({ "tags": ["a", null, "b"] }), &options),
            json!({ "tags": ["a", "b"] })
        );
        assert_eq!(
            clean_doc(json!({ "tags": ["a", null] })),
            json!({ "tags": ["a", null] })
        );
    }

    #[test]
    fn blackbox_contents_are_untouched() {
        let doc = json!({ "meta": { "x": "  padded ", "y": [null, ""], "z": { "": 1 } } });
        assert_eq!(clean_doc(doc.clone()), doc);
    }

    #[test]
    fn options_can_switch_steps_off() {
        let schema = schema();
        let options = CleanOptions::new()
            .filter(false)
            .auto_convert(false)
            .trim_strings(false)
            .remove_empty_strings(false);
        let doc = json!({ "bad": 1, "age": "3", "name": " " });
        assert_eq!(clean(&schema, &doc, &options), doc);
    }

    #[test]
    fn cleans_in_place() {
        let schema = Schema::new([(
            "status",
            Field::new(TypeTag::String).default_value("new"),
        )])
        .unwrap();
        let mut doc = json!({ "other": 1 });
        schema.clean_in_place(&mut doc, schema.clean_options());
        assert_eq!(doc, json!({ "status": "new" }));
    }

    #[test]
    fn conversions() {
        assert_eq!(convert_to_proper_type(&json!(1.0), &TypeTag::String), json!("1"));
        assert_eq!(convert_to_proper_type(&json!(1.5), &TypeTag::String), json!("1.5"));
        assert_eq!(convert_to_proper_type(&json!(0), &TypeTag::Boolean), json!(false));
        assert_eq!(
            convert_to_proper_type(&json!("2024-05-01"), &TypeTag::Date),
            json!({ "$date": "2024-05-01T00:00:00.000Z" })
        );
        assert_eq!(
            convert_to_proper_type(&json!(0), &TypeTag::Date),
            json!({ "$date": "1970-01-01T00:00:00.000Z" })
        );
        assert_eq!(convert_to_proper_type(&json!({ "a": 1 }), &TypeTag::String), json!({ "a": 1 }));
        assert_eq!(convert_to_proper_type(&Value::Null, &TypeTag::Array), Value::Null);
        assert_eq!(convert_to_proper_type(&json!(" 7 "), &TypeTag::Integer), json!(7));
    }
}
