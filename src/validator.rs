//! Document and modifier validation.
//!
//! Walks a plain document (or each operator of a modifier), resolves the
//! definition of every affected key and runs the validator chain for it:
//! required, type and bounds, allowed values, the alternative's own `custom`
//! validator, then schema-wide and global validators. Document validators run
//! once afterwards. The result keeps at most one error per key.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::trace;

use crate::checks::{self, value_should_be_checked};
use crate::definition::{ResolvedAlternative, ResolvedDefinition, TypeTag};
use crate::ejson;
use crate::error::{ValidateError, ValidationError};
use crate::hooks::{DocContext, FieldContext, Verdict};
use crate::keys::{append_key, make_key_generic};
use crate::mongo_object::{looks_like_modifier, MongoObject};
use crate::schema::Schema;
use crate::types::{json_type_name, ErrorType, ValidateOptions, UNCHECKED_OPERATORS};

type Check<'f> = &'f dyn Fn(&FieldContext<'_>) -> Verdict;

/// Validate a document or modifier and return its per-key errors.
///
/// # Errors
///
/// Returns `ValidateError` for input that cannot be validated at all: a
/// non-object, modifier-shaped input without `options.modifier`, a non-operator
/// key at the top of a modifier, or `$pushAll`.
pub(crate) fn do_validation(
    schema: &Schema,
    doc: &Value,
    options: &ValidateOptions,
) -> Result<Vec<ValidationError>, ValidateError> {
    if !ejson::is_plain_object(doc) {
        return Err(ValidateError::NotAnObject {
            actual: json_type_name(doc).to_string(),
        });
    }
    if !options.modifier && looks_like_modifier(doc) {
        return Err(ValidateError::ModifierWithoutOption);
    }

    let doc = if options.modifier && options.upsert {
        merge_set_on_insert(doc)
    } else {
        doc.clone()
    };
    let mongo_object = MongoObject::with_mode(doc, schema.blackbox_keys(), options.modifier);

    let mut walker = Walker {
        schema,
        document: &mongo_object,
        options,
        errors: Vec::new(),
    };
    match mongo_object.get_object() {
        Value::Object(operators) if options.modifier => walker.check_modifier(operators)?,
        root => walker.check_obj(Some(root), None, None, false, false),
    }
    let mut errors = walker.errors;

    let doc_context = DocContext {
        document: mongo_object.get_object(),
        is_modifier: options.modifier,
        is_upsert: options.upsert,
        keys: options.keys.as_deref(),
        ignore: &options.ignore,
        schema,
        mongo_object: &mongo_object,
        extended: &options.extended_custom_context,
    };
    for validator in schema.doc_validators() {
        errors.extend(validator(&doc_context));
    }

    let mut seen = HashSet::new();
    errors.retain(|error| !options.ignore.contains(&error.error_type) && seen.insert(error.name.clone()));
    trace!(
        errors = errors.len(),
        modifier = options.modifier,
        upsert = options.upsert,
        "validated document"
    );
    Ok(errors)
}

/// An upsert is checked as an insert: `$setOnInsert` joins `$set`. Modifiers
/// without `$setOnInsert` are left as they are.
fn merge_set_on_insert(doc: &Value) -> Value {
    let mut doc = doc.clone();
    if let Some(operators) = doc.as_object_mut() {
        if let Some(on_insert) = operators.shift_remove("$setOnInsert") {
            let set = operators
                .entry("$set")
                .or_insert_with(|| Value::Object(Map::new()));
            if let (Value::Object(fields), Some(target)) = (on_insert, set.as_object_mut()) {
                target.extend(fields);
            }
        }
    }
    doc
}

struct Walker<'a> {
    schema: &'a Schema,
    document: &'a MongoObject,
    options: &'a ValidateOptions,
    errors: Vec<ValidationError>,
}

impl<'a> Walker<'a> {
    fn check_modifier(&mut self, operators: &Map<String, Value>) -> Result<(), ValidateError> {
        let schema = self.schema;
        for (operator, payload) in operators {
            if !operator.starts_with('$') {
                return Err(ValidateError::InvalidOperator {
                    key: operator.clone(),
                });
            }
            if operator == "$pushAll" {
                return Err(ValidateError::PushAllUnsupported);
            }
            if UNCHECKED_OPERATORS.contains(&operator.as_str()) {
                continue;
            }
            let Some(fields) = payload.as_object() else {
                continue;
            };
            let op = Some(operator.as_str());

            if self.options.upsert && (operator == "$set" || operator == "$setOnInsert") {
                for key in schema.first_level_keys() {
                    if !fields.contains_key(key) {
                        self.check_obj(None, Some(key), op, false, false);
                    }
                }
            }

            for (key, value) in fields {
                if operator == "$push" || operator == "$addToSet" {
                    match value.as_object().and_then(|wrapper| wrapper.get("$each")) {
                        Some(each) => self.check_obj(Some(each), Some(key), op, false, false),
                        None => self.check_obj(Some(value), Some(&format!("{key}.0")), op, false, false),
                    }
                } else {
                    self.check_obj(Some(value), Some(key), op, false, false);
                }
            }
        }
        Ok(())
    }

    fn check_obj(
        &mut self,
        value: Option<&Value>,
        key: Option<&str>,
        operator: Option<&str>,
        in_array_item_object: bool,
        in_sub_object: bool,
    ) {
        let schema = self.schema;
        let generic = key.map(make_key_generic);
        let mut definition = None;

        if let (Some(key), Some(generic)) = (key, generic.as_deref()) {
            if schema.key_is_in_black_box(key) {
                return;
            }
            let lookup = field_context(
                self.document,
                self.options,
                key,
                generic,
                value,
                operator,
                in_array_item_object,
                in_sub_object,
            );
            definition = schema.get_definition(key, Some(&lookup));
            if self.should_validate_key(key, generic) {
                self.validate_key(
                    definition.as_ref(),
                    FieldContext {
                        value_should_be_checked: value_should_be_checked(generic, value, operator),
                        ..lookup
                    },
                );
            }
            if definition.is_none() {
                return;
            }
        }

        let key = key.unwrap_or_default();
        let generic = generic.as_deref().unwrap_or_default();
        let child_keys = schema.object_keys(generic);

        // Missing required objects are walked as `{}` so their required
        // children are reported.
        let empty = Value::Object(Map::new());
        let value = match value {
            None | Some(Value::Null)
                if definition
                    .as_ref()
                    .map_or(true, |def| !def.optional && !child_keys.is_empty()) =>
            {
                Some(&empty)
            }
            other => other,
        };

        match value {
            Some(Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    self.check_obj(Some(item), Some(&append_key(key, &i.to_string())), operator, false, false);
                }
            }
            Some(object @ Value::Object(fields))
                if ejson::is_plain_object(object)
                    && !definition.as_ref().is_some_and(ResolvedDefinition::is_blackbox) =>
            {
                let in_array_item = generic.ends_with(".$");
                let missing = child_keys.iter().filter(|k| !fields.contains_key(k.as_str()));
                let keys: Vec<&str> = fields
                    .keys()
                    .chain(missing)
                    .map(String::as_str)
                    .collect();
                for child in keys {
                    self.check_obj(fields.get(child), Some(&append_key(key, child)), operator, in_array_item, true);
                }
            }
            _ => {}
        }
    }

    fn should_validate_key(&self, key: &str, generic: &str) -> bool {
        match &self.options.keys {
            Some(keys) => key_is_selected(keys, key, generic),
            None => true,
        }
    }

    fn validate_key(&mut self, definition: Option<&ResolvedDefinition>, ctx: FieldContext<'_>) {
        let Some(definition) = definition else {
            let ignorable = ctx.operator == Some("$unset")
                || (ctx.operator == Some("$currentDate") && ctx.key.ends_with(".$type"));
            if !ignorable {
                self.errors.push(
                    ValidationError::new(ctx.key, ErrorType::KeyNotInSchema)
                        .with_value(ctx.value.cloned()),
                );
            }
            return;
        };

        if ctx.operator == Some("$rename") {
            let target = ctx.value.and_then(Value::as_str);
            if !target.is_some_and(|t| self.schema.allows_key(t)) {
                self.errors.push(
                    ValidationError::new(target.unwrap_or(ctx.key), ErrorType::KeyNotInSchema)
                        .with_value(Some(Value::Null)),
                );
                return;
            }
        }

        let ctx = FieldContext {
            definition: Some(definition),
            ..ctx
        };
        let mut field_errors = Vec::new();
        let schema = self.schema;
        let is_valid = definition.alternatives.iter().any(|alternative| {
            matches!(alternative.type_tag, TypeTag::Any)
                || run_chain(
                    schema,
                    &FieldContext {
                        alternative: Some(alternative),
                        ..ctx
                    },
                    alternative,
                    &mut field_errors,
                )
        });
        if !is_valid {
            self.errors.extend(field_errors);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn field_context<'c>(
    document: &'c MongoObject,
    options: &'c ValidateOptions,
    key: &'c str,
    generic: &'c str,
    value: Option<&'c Value>,
    operator: Option<&'c str>,
    in_array_item_object: bool,
    in_sub_object: bool,
) -> FieldContext<'c> {
    FieldContext {
        key,
        generic_key: generic,
        value,
        operator,
        is_modifier: options.modifier,
        is_upsert: options.upsert,
        is_in_array_item_object: in_array_item_object,
        is_in_sub_object: in_sub_object,
        value_should_be_checked: false,
        definition: None,
        alternative: None,
        document: Some(document),
        extended: Some(&options.extended_custom_context),
    }
}

/// Run every validator for one alternative. Returns whether all passed.
fn run_chain(
    schema: &Schema,
    ctx: &FieldContext<'_>,
    alternative: &ResolvedAlternative,
    errors: &mut Vec<ValidationError>,
) -> bool {
    let builtin: [Check<'_>; 3] = [
        &checks::required_validator,
        &checks::type_validator,
        &checks::allowed_values_validator,
    ];
    let custom = alternative.custom.iter().map(|f| f.as_ref() as Check<'_>);
    let registered = schema.field_validators().map(|f| f.as_ref() as Check<'_>);

    for validator in builtin.into_iter().chain(custom).chain(registered) {
        match validator(ctx) {
            Verdict::Valid => {}
            verdict => {
                record(verdict, ctx, errors);
                return false;
            }
        }
    }
    true
}

fn record(verdict: Verdict, ctx: &FieldContext<'_>, errors: &mut Vec<ValidationError>) {
    match verdict {
        Verdict::Valid | Verdict::Veto => {}
        Verdict::Invalid(kind) => {
            errors.push(ValidationError::new(ctx.key, kind).with_value(ctx.value.cloned()));
        }
        Verdict::Error(mut error) => {
            if error.name.is_empty() {
                error.name = ctx.key.to_string();
            }
            if error.value.is_none() {
                error.value = ctx.value.cloned();
            }
            errors.push(error);
        }
        Verdict::Errors(list) => errors.extend(list),
    }
}

/// Whether a key, by its specific or generic form, is one of `keys` or a
/// descendant of one.
pub(crate) fn key_is_selected(keys: &[String], key: &str, generic: &str) -> bool {
    let under = |candidate: &str, wanted: &str| {
        candidate == wanted
            || candidate
                .strip_prefix(wanted)
                .is_some_and(|rest| rest.starts_with('.'))
    };
    keys.iter()
        .any(|wanted| under(key, wanted) || under(generic, wanted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Field, FieldSpec};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new([
            ("name", FieldSpec::from(TypeTag::String)),
            ("age", Field::new(TypeTag::Integer).min(0).optional(true).into()),
            ("address", Field::new(TypeTag::Object).optional(true).into()),
            ("address.city", FieldSpec::from(TypeTag::String)),
            ("tags", Field::new(TypeTag::Array).optional(true).into()),
            ("tags.$", FieldSpec::from(TypeTag::String)),
        ])
        .unwrap()
    }

    fn kinds(errors: &[ValidationError]) -> Vec<(String, String)> {
        errors
            .iter()
            .map(|e| (e.name.clone(), e.error_type.to_string()))
            .collect()
    }

    fn pair(name: &str, kind: &str) -> (String, String) {
        (name.to_string(), kind.to_string())
    }

    #[test]
    fn rejects_bad_input() {
        let schema = schema();
        assert!(matches!(
            do_validation(&schema, &json!([1]), &ValidateOptions::new()),
            Err(ValidateError::NotAnObject { .. })
        ));
        assert!(matches!(
            do_validation(&schema, &json!({ "$set": {} }), &ValidateOptions::new()),
            Err(ValidateError::ModifierWithoutOption)
        ));
        let modifier = ValidateOptions::new().modifier(true);
        assert!(matches!(
            do_validation(&schema, &json!({ "name": "x" }), &modifier),
            Err(ValidateError::InvalidOperator { .. })
        ));
        assert!(matches!(
            do_validation(&schema, &json!({ "$pushAll": { "tags": ["a"] } }), &modifier),
            Err(ValidateError::PushAllUnsupported)
        ));
    }

    #[test]
    fn walks_plain_documents() {
        let errors = do_validation(
            &schema(),
            &json!({ "age": 1.5, "address": {}, "tags": ["a", 3], "extra": { "x": 1 } }),
            &ValidateOptions::new(),
        )
        .unwrap();
        assert_eq!(
            kinds(&errors),
            vec![
                pair("age", "noDecimal"),
                pair("address.city", "required"),
                pair("tags.1", "expectedType"),
                pair("extra", "keyNotInSchema"),
                pair("name", "required"),
            ]
        );
    }

    #[test]
    fn modifiers_check_only_affected_keys() {
        let modifier = ValidateOptions::new().modifier(true);
        let errors = do_validation(
            &schema(),
            &json!({ "$set": { "age": -1 }, "$push": { "tags": 5 }, "$pull": { "tags": 5 } }),
            &modifier,
        )
        .unwrap();
        assert_eq!(kinds(&errors), vec![pair("age", "minNumber"), pair("tags.0", "expectedType")]);

        let errors = do_validation(&schema(), &json!({ "$unset": { "name": "" } }), &modifier).unwrap();
        assert_eq!(kinds(&errors), vec![pair("name", "required")]);
    }

    #[test]
    fn each_items_are_checked_individually() {
        let modifier = ValidateOptions::new().modifier(true);
        let errors = do_validation(
            &schema(),
            &json!({ "$addToSet": { "tags": { "$each": ["a", 2, "c"] } } }),
            &modifier,
        )
        .unwrap();
        assert_eq!(kinds(&errors), vec![pair("tags.1", "expectedType")]);
    }

    #[test]
    fn set_creates_ancestors() {
        let modifier = ValidateOptions::new().modifier(true);
        let errors = do_validation(&schema(), &json!({ "$set": { "address.city": "Oslo" } }), &modifier).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn rename_targets_must_be_allowed() {
        let modifier = ValidateOptions::new().modifier(true);
        let errors = do_validation(&schema(), &json!({ "$rename": { "age": "years" } }), &modifier).unwrap();
        assert_eq!(kinds(&errors), vec![pair("years", "keyNotInSchema")]);
    }

    #[test]
    fn upsert_reports_missing_required_keys() {
        let upsert = ValidateOptions::new().modifier(true).upsert(true);
        let errors = do_validation(&schema(), &json!({ "$setOnInsert": { "age": 3 } }), &upsert).unwrap();
        assert_eq!(kinds(&errors), vec![pair("name", "required")]);

        let errors = do_validation(&schema(), &json!({ "$set": { "name": "x" } }), &upsert).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn upsert_without_set_checks_only_its_operators() {
        let upsert = ValidateOptions::new().modifier(true).upsert(true);
        let errors = do_validation(&schema(), &json!({ "$inc": { "age": 1 } }), &upsert).unwrap();
        assert!(errors.is_empty());

        let errors = do_validation(&schema(), &json!({ "$unset": { "name": "" } }), &upsert).unwrap();
        assert_eq!(kinds(&errors), vec![pair("name", "required")]);
    }

    #[test]
    fn pushed_batches_skip_array_counts() {
        let schema = Schema::new([
            ("tags", Field::new(TypeTag::Array).min_count(2).max_count(3).into()),
            ("tags.$", FieldSpec::from(TypeTag::String)),
        ])
        .unwrap();
        let modifier = ValidateOptions::new().modifier(true);
        for update in [
            json!({ "$push": { "tags": { "$each": ["a"] } } }),
            json!({ "$addToSet": { "tags": { "$each": ["a", "b", "c", "d"] } } }),
        ] {
            let errors = do_validation(&schema, &update, &modifier).unwrap();
            assert!(errors.is_empty(), "{update}");
        }

        let errors = do_validation(&schema, &json!({ "$set": { "tags": ["a"] } }), &modifier).unwrap();
        assert_eq!(kinds(&errors), vec![pair("tags", "minCount")]);
    }

    #[test]
    fn keys_filter_limits_the_walk() {
        let options = ValidateOptions::new().keys(["age"]);
        let errors = do_validation(&schema(), &json!({ "age": -3 }), &options).unwrap();
        assert_eq!(kinds(&errors), vec![pair("age", "minNumber")]);
    }

    #[test]
    fn ignored_kinds_are_dropped() {
        let options = ValidateOptions::new().ignore([ErrorType::Required]);
        let errors = do_validation(&schema(), &json!({}), &options).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn any_alternative_passing_clears_the_others() {
        let schema = Schema::new([(
            "id",
            Field::one_of([TypeTag::String, TypeTag::Integer]),
        )])
        .unwrap();
        let options = ValidateOptions::new();
        assert!(do_validation(&schema, &json!({ "id": 5 }), &options).unwrap().is_empty());
        let errors = do_validation(&schema, &json!({ "id": true }), &options).unwrap();
        assert_eq!(kinds(&errors), vec![pair("id", "expectedType")]);
        assert_eq!(errors[0].detail("dataType"), Some(&json!("String")));
    }

    #[test]
    fn veto_stops_the_chain_silently() {
        let mut schema = schema();
        schema.add_validator(|ctx| if ctx.key == "age" { Verdict::Veto } else { Verdict::Valid });
        let errors = do_validation(&schema, &json!({ "name": "x", "age": 4 }), &ValidateOptions::new()).unwrap();
        assert!(errors.is_empty());
    }
}
