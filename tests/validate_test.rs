//! Validation behavior through the public API.

use doc_schema::{
    ErrorType, Field, FieldSpec, Schema, TypeTag, ValidateError, ValidateOptions, ValidationError,
    Verdict,
};
use serde_json::{json, Value};

fn errors(schema: &Schema, doc: &Value, options: &ValidateOptions) -> Vec<ValidationError> {
    let ctx = schema.new_context();
    ctx.validate(doc, options).unwrap();
    ctx.validation_errors()
}

fn plain(schema: &Schema, doc: Value) -> Vec<ValidationError> {
    errors(schema, &doc, &ValidateOptions::new())
}

fn kinds(errors: &[ValidationError]) -> Vec<(String, String)> {
    let mut out: Vec<_> = errors
        .iter()
        .map(|e| (e.name.clone(), e.error_type.as_str().to_string()))
        .collect();
    out.sort();
    out
}

fn person() -> Schema {
    Schema::new([
        ("name", FieldSpec::from(TypeTag::String)),
        ("email", FieldSpec::from(TypeTag::String)),
        ("age", Field::new(TypeTag::Integer).min(0).max(150).into()),
        ("tags", Field::new(TypeTag::Array).optional(true).into()),
        ("tags.$", FieldSpec::from(TypeTag::String)),
    ])
    .unwrap()
}

mod requiredness {
    use super::*;

    #[test]
    fn each_missing_field_is_one_error() {
        let schema = person();
        let errs = plain(&schema, json!({}));
        assert_eq!(
            kinds(&errs),
            [
                ("age".to_string(), "required".to_string()),
                ("email".to_string(), "required".to_string()),
                ("name".to_string(), "required".to_string()),
            ]
        );

        let errs = plain(&schema, json!({ "name": "Ann" }));
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn null_counts_as_missing() {
        let schema = person();
        let errs = plain(&schema, json!({ "name": null, "email": "a@b.co", "age": 3 }));
        assert_eq!(kinds(&errs), [("name".to_string(), "required".to_string())]);
    }

    #[test]
    fn upsert_set_on_insert_matches_plain_insert() {
        let schema = person();
        let doc = json!({ "name": "Ann", "age": -4, "tags": ["x", 3] });
        let insert = plain(&schema, doc.clone());
        let upsert = errors(
            &schema,
            &json!({ "$setOnInsert": doc }),
            &ValidateOptions::new().modifier(true).upsert(true),
        );
        assert!(!insert.is_empty());
        assert_eq!(kinds(&insert), kinds(&upsert));
    }

    #[test]
    fn upsert_without_set_is_a_plain_update() {
        let schema = person();
        let upsert = ValidateOptions::new().modifier(true).upsert(true);
        assert!(errors(&schema, &json!({ "$inc": { "age": 1 } }), &upsert).is_empty());
        assert_eq!(
            kinds(&errors(&schema, &json!({ "$set": { "age": 1 } }), &upsert)),
            [
                ("email".to_string(), "required".to_string()),
                ("name".to_string(), "required".to_string()),
            ]
        );
    }

    #[test]
    fn unset_of_required_field() {
        let schema = person();
        let errs = errors(
            &schema,
            &json!({ "$unset": { "email": "" } }),
            &ValidateOptions::new().modifier(true),
        );
        assert_eq!(kinds(&errs), [("email".to_string(), "required".to_string())]);
    }
}

mod arrays {
    use super::*;

    fn names() -> Schema {
        Schema::new([
            ("names", FieldSpec::from(TypeTag::Array)),
            ("names.$", FieldSpec::from(TypeTag::String)),
        ])
        .unwrap()
    }

    #[test]
    fn null_item_is_a_type_error() {
        let errs = plain(&names(), json!({ "names": [null] }));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].name, "names.0");
        assert_eq!(errs[0].error_type, ErrorType::ExpectedType);
    }

    #[test]
    fn empty_required_array_is_valid() {
        assert!(plain(&names(), json!({ "names": [] })).is_empty());
    }

    #[test]
    fn positional_set_checks_the_item() {
        let errs = errors(
            &names(),
            &json!({ "$set": { "names.1": 5 } }),
            &ValidateOptions::new().modifier(true),
        );
        assert_eq!(kinds(&errs), [("names.1".to_string(), "expectedType".to_string())]);
    }

    #[test]
    fn push_each_ignores_array_counts() {
        let schema = Schema::new([
            ("names", FieldSpec::from(Field::new(TypeTag::Array).min_count(2).max_count(3))),
            ("names.$", FieldSpec::from(TypeTag::String)),
        ])
        .unwrap();
        let modifier = ValidateOptions::new().modifier(true);
        assert!(errors(&schema, &json!({ "$push": { "names": { "$each": ["a"] } } }), &modifier).is_empty());
        assert!(errors(
            &schema,
            &json!({ "$addToSet": { "names": { "$each": ["a", "b", "c", "d"] } } }),
            &modifier
        )
        .is_empty());
        assert_eq!(
            kinds(&errors(&schema, &json!({ "$set": { "names": ["a"] } }), &modifier)),
            [("names".to_string(), "minCount".to_string())]
        );
    }

    #[test]
    fn push_each_checks_every_item() {
        let errs = errors(
            &names(),
            &json!({ "$push": { "names": { "$each": ["a", 2, "c", false] } } }),
            &ValidateOptions::new().modifier(true),
        );
        assert_eq!(
            kinds(&errs),
            [
                ("names.1".to_string(), "expectedType".to_string()),
                ("names.3".to_string(), "expectedType".to_string()),
            ]
        );
    }
}

mod results {
    use super::*;

    #[test]
    fn validation_is_deterministic() {
        let schema = person();
        let doc = json!({ "name": 1, "age": 200, "tags": ["a", {}], "other": true });
        let first = plain(&schema, doc.clone());
        for _ in 0..5 {
            assert_eq!(plain(&schema, doc.clone()), first);
        }
    }

    #[test]
    fn one_error_per_key() {
        let schema = Schema::new([(
            "code",
            FieldSpec::from(
                Field::new(TypeTag::String)
                    .min(5)
                    .custom(|_| Verdict::invalid("badCode")),
            ),
        )])
        .unwrap();
        let errs = plain(&schema, json!({ "code": "ab" }));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].name, "code");
    }

    #[test]
    fn unknown_keys_are_reported() {
        let schema = person();
        let errs = plain(
            &schema,
            json!({ "name": "a", "email": "b", "age": 1, "nick": "x" }),
        );
        assert_eq!(kinds(&errs), [("nick".to_string(), "keyNotInSchema".to_string())]);
    }

    #[test]
    fn throwing_entry_point_aggregates() {
        let schema = person();
        let err = schema
            .validate(&json!({ "age": "x" }), &ValidateOptions::new())
            .unwrap_err();
        let ValidateError::Invalid { message, details } = &err else {
            panic!("expected an aggregate error, got {err:?}");
        };
        assert_eq!(details.len(), 3);
        assert_eq!(message, &details[0].message);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn ignored_kinds_and_selected_keys() {
        let schema = person();
        let doc = json!({ "age": 500 });
        let options = ValidateOptions::new().ignore(["required"]);
        assert_eq!(
            kinds(&errors(&schema, &doc, &options)),
            [("age".to_string(), "maxNumber".to_string())]
        );
        let options = ValidateOptions::new().keys(["name"]);
        assert_eq!(
            kinds(&errors(&schema, &doc, &options)),
            [("name".to_string(), "required".to_string())]
        );
    }
}

mod types {
    use super::*;

    fn mixed() -> Schema {
        Schema::new([(
            "value",
            FieldSpec::from(Field::one_of([TypeTag::String, TypeTag::Number, TypeTag::Date])),
        )])
        .unwrap()
    }

    #[test]
    fn one_of_accepts_any_alternative() {
        let schema = mixed();
        for value in [json!("x"), json!(1.5), json!({ "$date": "2024-01-01T00:00:00Z" })] {
            assert!(plain(&schema, json!({ "value": value })).is_empty());
        }
        let errs = plain(&schema, json!({ "value": true }));
        assert_eq!(kinds(&errs), [("value".to_string(), "expectedType".to_string())]);
    }

    #[test]
    fn blackbox_contents_are_opaque() {
        let schema = Schema::new([
            ("meta", FieldSpec::from(Field::new(TypeTag::Object).blackbox(true))),
        ])
        .unwrap();
        let doc = json!({ "meta": { "a": [1, { "b": null }], "c": "  x  ", "d": { "$date": 0 } } });
        assert!(plain(&schema, doc).is_empty());
    }

    #[test]
    fn nested_schemas() {
        let address = Schema::new([
            ("city", FieldSpec::from(TypeTag::String)),
            ("zip", Field::new(TypeTag::String).optional(true).into()),
        ])
        .unwrap();
        let schema = Schema::new([
            ("home", FieldSpec::from(address)),
        ])
        .unwrap();
        let errs = plain(&schema, json!({ "home": { "zip": 7 } }));
        assert_eq!(
            kinds(&errs),
            [
                ("home.city".to_string(), "required".to_string()),
                ("home.zip".to_string(), "expectedType".to_string()),
            ]
        );
    }
}

mod custom_validators {
    use super::*;

    fn signup() -> Schema {
        Schema::new([
            ("password", FieldSpec::from(TypeTag::String)),
            (
                "confirmPassword",
                Field::new(TypeTag::String)
                    .custom(|ctx| {
                        if ctx.value.cloned() != ctx.field("password").value {
                            Verdict::invalid("passwordMismatch")
                        } else {
                            Verdict::Valid
                        }
                    })
                    .into(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn password_mismatch() {
        let schema = signup();
        let errs = plain(&schema, json!({ "password": "a", "confirmPassword": "b" }));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].name, "confirmPassword");
        assert_eq!(errs[0].error_type.as_str(), "passwordMismatch");

        assert!(plain(&schema, json!({ "password": "a", "confirmPassword": "a" })).is_empty());
    }

    #[test]
    fn custom_messages_render() {
        let mut schema = signup();
        schema.messages("en", [("passwordMismatch", "Passwords do not match")]);
        let ctx = schema.new_context();
        let valid = ctx
            .validate(
                &json!({ "password": "a", "confirmPassword": "b" }),
                &ValidateOptions::new(),
            )
            .unwrap();
        assert!(!valid);
        assert_eq!(
            ctx.key_error_message("confirmPassword").as_deref(),
            Some("Passwords do not match")
        );
    }

    #[test]
    fn document_validators_run_after_the_walk() {
        let mut schema = signup();
        schema.add_doc_validator(|ctx| {
            if ctx.field("password").value == Some(json!("secret")) {
                vec![ValidationError::new("password", "tooObvious")]
            } else {
                Vec::new()
            }
        });
        let errs = plain(&schema, json!({ "password": "secret", "confirmPassword": "secret" }));
        assert_eq!(kinds(&errs), [("password".to_string(), "tooObvious".to_string())]);
    }
}

mod contexts {
    use super::*;

    #[test]
    fn revalidating_keys_keeps_other_errors() {
        let schema = person();
        let ctx = schema.new_context();
        ctx.validate(&json!({ "age": -1 }), &ValidateOptions::new()).unwrap();
        assert_eq!(ctx.validation_errors().len(), 3);

        ctx.validate(
            &json!({ "age": 10 }),
            &ValidateOptions::new().keys(["age"]),
        )
        .unwrap();
        assert!(!ctx.key_is_invalid("age"));
        assert!(ctx.key_is_invalid("name"));
        assert!(ctx.key_is_invalid("email"));
    }

    #[test]
    fn revalidating_array_items_drops_fixed_ones() {
        let schema = person();
        let ctx = schema.new_context();
        let base = json!({ "name": "a", "email": "b", "age": 1 });
        let mut doc = base.clone();
        doc["tags"] = json!([1, 2, 3]);
        ctx.validate(&doc, &ValidateOptions::new()).unwrap();
        assert_eq!(ctx.validation_errors().len(), 3);

        doc["tags"] = json!(["x", 2, "z"]);
        ctx.validate(&doc, &ValidateOptions::new().keys(["tags.$"])).unwrap();
        assert_eq!(
            kinds(&ctx.validation_errors()),
            [("tags.1".to_string(), "expectedType".to_string())]
        );
    }

    #[test]
    fn named_contexts_share_errors() {
        let schema = person();
        schema
            .named_context("form")
            .validate(&json!({}), &ValidateOptions::new())
            .unwrap();
        assert!(schema.named_context("form").key_is_invalid("name"));
        assert!(schema.new_context().is_valid());
    }

    #[test]
    fn clean_before_validate() {
        let schema = person();
        let doc = json!({ "name": " Ann ", "email": "a@b.co", "age": "30", "junk": 1 });
        assert!(!plain(&schema, doc.clone()).is_empty());
        assert!(errors(&schema, &doc, &ValidateOptions::new().clean(true)).is_empty());
    }
}
