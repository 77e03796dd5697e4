//! JSON schema declarations.
//!
//! Lets a schema live in a file. A declaration is an object from key to spec:
//!
//! ```json
//! {
//!   "name": "String",
//!   "tags": ["String"],
//!   "code": "/^[A-Z]{3}$/",
//!   "age": { "type": "Integer", "min": 0, "optional": true },
//!   "id": { "type": { "oneOf": ["String", "Integer"] } },
//!   "address": { "type": { "schema": { "city": "String" } } },
//!   "email": { "type": "String", "regEx": "Email" }
//! }
//! ```
//!
//! Options the parser does not know are passed through as extra options, which
//! the schema accepts only when its options allow them.

use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};

use crate::config::SchemaConfig;
use crate::definition::{Bound, Dynamic, Field, FieldSpec, TypeAlternative, TypeGroup, TypeTag};
use crate::ejson;
use crate::error::SchemaError;
use crate::patterns;
use crate::schema::Schema;

/// Parse a JSON declaration into `(key, spec)` pairs in declaration order.
///
/// # Errors
///
/// Returns `SchemaError` for an unknown type name, a bad regular expression,
/// an option of the wrong JSON type, or a nested schema that fails to build.
pub fn parse_declaration(
    declaration: &Value,
    config: &Arc<SchemaConfig>,
) -> Result<Vec<(String, FieldSpec)>, SchemaError> {
    let Value::Object(map) = declaration else {
        return Err(invalid("", "a schema declaration must be a JSON object"));
    };
    map.iter()
        .map(|(key, spec)| parse_spec(key, spec, config).map(|spec| (key.clone(), spec)))
        .collect()
}

fn parse_spec(key: &str, spec: &Value, config: &Arc<SchemaConfig>) -> Result<FieldSpec, SchemaError> {
    match spec {
        Value::String(s) => match pattern_literal(s) {
            Some(pattern) => Ok(FieldSpec::Pattern(compile(key, pattern)?)),
            None => Ok(FieldSpec::Type(type_by_name(key, s)?)),
        },
        Value::Array(items) => match items.as_slice() {
            [item] => Ok(FieldSpec::array_of(parse_spec(key, item, config)?)),
            _ => Err(invalid(key, "array shorthand takes exactly one item type")),
        },
        Value::Object(map) => parse_field(key, map, config).map(FieldSpec::Field),
        other => Err(invalid(key, &format!("unexpected {other} as a field spec"))),
    }
}

fn parse_field(key: &str, map: &Map<String, Value>, config: &Arc<SchemaConfig>) -> Result<Field, SchemaError> {
    let mut field = match map.get("type") {
        Some(spec) => Field::new(parse_type(key, spec, config)?),
        None => Field::patch(),
    };
    apply_constraints(key, map, &mut field.type_props)?;

    for (name, value) in map {
        match name.as_str() {
            "type" | "min" | "max" | "exclusiveMin" | "exclusiveMax" | "minCount" | "maxCount"
            | "allowedValues" | "regEx" | "skipRegExCheckForEmptyStrings" | "trim" | "blackbox" => {}
            "optional" => field = field.optional(boolean(key, name, value)?),
            "required" => field = field.required(boolean(key, name, value)?),
            "label" => match value {
                Value::String(label) => field = field.label(label.clone()),
                _ => return Err(invalid(key, "label must be a string")),
            },
            "defaultValue" => field = field.default_value(value.clone()),
            _ => field = field.option(name.clone(), value.clone()),
        }
    }
    Ok(field)
}

fn parse_type(key: &str, spec: &Value, config: &Arc<SchemaConfig>) -> Result<TypeGroup, SchemaError> {
    match spec {
        Value::String(name) => Ok(TypeGroup::from(type_by_name(key, name)?)),
        Value::Array(_) => Err(SchemaError::ArrayType { key: key.to_string() }),
        Value::Object(map) if map.is_empty() => Err(SchemaError::EmptyObjectType { key: key.to_string() }),
        Value::Object(map) => {
            if let Some(alternatives) = map.get("oneOf") {
                let Value::Array(alternatives) = alternatives else {
                    return Err(invalid(key, "oneOf must be an array"));
                };
                let parsed = alternatives
                    .iter()
                    .map(|alternative| parse_alternative(key, alternative, config))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(TypeGroup::one_of(parsed));
            }
            parse_alternative(key, spec, config).map(TypeGroup::from)
        }
        other => Err(invalid(key, &format!("unexpected {other} as a type"))),
    }
}

fn parse_alternative(
    key: &str,
    spec: &Value,
    config: &Arc<SchemaConfig>,
) -> Result<TypeAlternative, SchemaError> {
    match spec {
        Value::String(name) => Ok(TypeAlternative::new(type_by_name(key, name)?)),
        Value::Object(map) if map.contains_key("schema") => {
            let nested = Schema::from_json_with_config(&map["schema"], Arc::clone(config))?;
            Ok(TypeAlternative::new(TypeTag::schema(nested)))
        }
        Value::Object(map) => {
            let Some(Value::String(name)) = map.get("type") else {
                return Err(SchemaError::MissingType { key: key.to_string() });
            };
            let mut alternative = TypeAlternative::new(type_by_name(key, name)?);
            apply_constraints(key, map, &mut alternative)?;
            Ok(alternative)
        }
        Value::Array(_) => Err(SchemaError::ArrayType { key: key.to_string() }),
        other => Err(invalid(key, &format!("unexpected {other} as a type"))),
    }
}

/// Read the type-level constraints of `map` into `target`.
fn apply_constraints(key: &str, map: &Map<String, Value>, target: &mut TypeAlternative) -> Result<(), SchemaError> {
    for (name, value) in map {
        match name.as_str() {
            "min" => target.min = Some(Dynamic::Static(bound(key, name, value)?)),
            "max" => target.max = Some(Dynamic::Static(bound(key, name, value)?)),
            "exclusiveMin" => target.exclusive_min = Some(Dynamic::Static(boolean(key, name, value)?)),
            "exclusiveMax" => target.exclusive_max = Some(Dynamic::Static(boolean(key, name, value)?)),
            "minCount" => target.min_count = Some(Dynamic::Static(count(key, name, value)?)),
            "maxCount" => target.max_count = Some(Dynamic::Static(count(key, name, value)?)),
            "allowedValues" => match value {
                Value::Array(values) => target.allowed_values = Some(Dynamic::Static(values.clone())),
                _ => return Err(invalid(key, "allowedValues must be an array")),
            },
            "regEx" => target.reg_ex = Some(Dynamic::Static(reg_exes(key, value)?)),
            "skipRegExCheckForEmptyStrings" => {
                target.skip_reg_ex_check_for_empty_strings = Some(Dynamic::Static(boolean(key, name, value)?));
            }
            "trim" => target.trim = Some(Dynamic::Static(boolean(key, name, value)?)),
            "blackbox" => target.blackbox = Some(boolean(key, name, value)?),
            _ => {}
        }
    }
    Ok(())
}

/// Type names as written in declarations; lowercase forms are accepted too.
fn type_by_name(key: &str, name: &str) -> Result<TypeTag, SchemaError> {
    let tag = match name {
        "String" | "string" => TypeTag::String,
        "Number" | "number" => TypeTag::Number,
        "Integer" | "integer" => TypeTag::Integer,
        "Boolean" | "boolean" => TypeTag::Boolean,
        "Date" | "date" => TypeTag::Date,
        "Object" | "object" => TypeTag::Object,
        "Array" | "array" => TypeTag::Array,
        "Binary" | "binary" | "Uint8Array" => TypeTag::Binary,
        "Any" | "any" => TypeTag::Any,
        _ => {
            return Err(SchemaError::UnknownType {
                key: key.to_string(),
                name: name.to_string(),
            })
        }
    };
    Ok(tag)
}

/// The body of a `/.../` literal.
fn pattern_literal(s: &str) -> Option<&str> {
    s.strip_prefix('/')?.strip_suffix('/')
}

fn compile(key: &str, pattern: &str) -> Result<Regex, SchemaError> {
    Regex::new(pattern).map_err(|source| SchemaError::InvalidRegex {
        key: key.to_string(),
        source,
    })
}

/// A built-in pattern name, a `/.../` literal, a bare pattern, or a list of those.
fn reg_exes(key: &str, value: &Value) -> Result<Vec<Regex>, SchemaError> {
    let one = |value: &Value| match value {
        Value::String(s) => match patterns::by_name(s) {
            Some(builtin) => Ok(builtin),
            None => compile(key, pattern_literal(s).unwrap_or(s)),
        },
        _ => Err(invalid(key, "regEx must be a string or an array of strings")),
    };
    match value {
        Value::Array(items) => items.iter().map(one).collect(),
        single => Ok(vec![one(single)?]),
    }
}

fn bound(key: &str, name: &str, value: &Value) -> Result<Bound, SchemaError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(Bound::Number)
            .ok_or_else(|| invalid(key, &format!("{name} is out of range"))),
        Value::String(s) => ejson::parse_date_str(s)
            .map(Bound::Date)
            .ok_or_else(|| invalid(key, &format!("{name} must be a number or a date"))),
        date if ejson::is_date(date) => ejson::as_date(date)
            .map(Bound::Date)
            .ok_or_else(|| invalid(key, &format!("{name} is not a valid date"))),
        _ => Err(invalid(key, &format!("{name} must be a number or a date"))),
    }
}

fn boolean(key: &str, name: &str, value: &Value) -> Result<bool, SchemaError> {
    value
        .as_bool()
        .ok_or_else(|| invalid(key, &format!("{name} must be true or false")))
}

fn count(key: &str, name: &str, value: &Value) -> Result<usize, SchemaError> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| invalid(key, &format!("{name} must be a non-negative integer")))
}

fn invalid(key: &str, message: &str) -> SchemaError {
    SchemaError::InvalidShorthand {
        key: key.to_string(),
        message: message.to_string(),
    }
}
