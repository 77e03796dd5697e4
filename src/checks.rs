//! Built-in field validators: requiredness, type and bounds, allowed values.
//!
//! Each validator sees the definition being tried through
//! [`FieldContext::alternative`] and answers with a [`Verdict`]. The cleaner
//! asks [`is_of_type`] whether a value already has one of a key's types.

use serde_json::{json, Value};

use crate::definition::{Bound, ResolvedAlternative, TypeTag};
use crate::ejson;
use crate::error::ValidationError;
use crate::hooks::{FieldContext, Verdict};
use crate::types::ErrorType;

/// Whether the value of a key gets type and allowed-value checks.
///
/// Null and missing values are skipped, except a `null` array item, which is
/// type checked. Removal operators carry no value worth checking.
pub(crate) fn value_should_be_checked(generic_key: &str, value: Option<&Value>, operator: Option<&str>) -> bool {
    if matches!(operator, Some("$unset" | "$rename")) {
        return false;
    }
    match value {
        None => false,
        Some(Value::Null) => generic_key.ends_with(".$"),
        Some(_) => true,
    }
}

/// Raises `required` for a missing or null value of a non-optional key.
pub fn required_validator(ctx: &FieldContext<'_>) -> Verdict {
    let Some(definition) = ctx.definition() else {
        return Verdict::Valid;
    };
    if definition.optional {
        return Verdict::Valid;
    }
    if matches!(ctx.value, Some(Value::Null)) {
        return Verdict::Invalid(ErrorType::Required);
    }
    if matches!(ctx.operator, Some("$unset" | "$rename")) {
        return Verdict::Invalid(ErrorType::Required);
    }
    if ctx.value.is_some() {
        return Verdict::Valid;
    }
    let Some(operator) = ctx.operator else {
        return Verdict::Invalid(ErrorType::Required);
    };

    // Ancestors of keys being set are created by the update itself.
    let prefix = format!("{}.", ctx.key);
    let will_be_created = ctx.document().is_some_and(|doc| {
        ["$set", "$setOnInsert"].iter().any(|op| {
            doc.get(op)
                .and_then(Value::as_object)
                .is_some_and(|fields| fields.keys().any(|k| k.starts_with(&prefix)))
        })
    });
    if will_be_created {
        return Verdict::Valid;
    }

    let info = ctx.field(ctx.key);
    if info.is_set && !matches!(info.value, Some(Value::Null)) {
        return Verdict::Valid;
    }
    if ctx.is_in_array_item_object || ctx.is_in_sub_object {
        return Verdict::Invalid(ErrorType::Required);
    }
    if operator == "$set" || operator == "$setOnInsert" {
        return Verdict::Invalid(ErrorType::Required);
    }
    Verdict::Valid
}

/// Type and bounds checks for the alternative being tried.
pub fn type_validator(ctx: &FieldContext<'_>) -> Verdict {
    if !ctx.value_should_be_checked {
        return Verdict::Valid;
    }
    match (ctx.alternative(), ctx.value) {
        (Some(alternative), Some(value)) => check_type(alternative, value, ctx.operator).into(),
        _ => Verdict::Valid,
    }
}

/// Raises `notAllowed` when the value is not one of the allowed values.
pub fn allowed_values_validator(ctx: &FieldContext<'_>) -> Verdict {
    if !ctx.value_should_be_checked {
        return Verdict::Valid;
    }
    let (Some(alternative), Some(value)) = (ctx.alternative(), ctx.value) else {
        return Verdict::Valid;
    };
    match &alternative.allowed_values {
        Some(allowed) if !allowed.contains(value) => Verdict::Invalid(ErrorType::ValueNotAllowed),
        _ => Verdict::Valid,
    }
}

fn error(kind: ErrorType) -> Option<ValidationError> {
    Some(ValidationError::new("", kind))
}

fn expected(data_type: &str) -> Option<ValidationError> {
    Some(ValidationError::new("", ErrorType::ExpectedType).with_detail("dataType", data_type))
}

/// Check one value against one alternative.
///
/// Returns an error with an empty name; the caller fills in the key.
pub fn check_type(
    alternative: &ResolvedAlternative,
    value: &Value,
    operator: Option<&str>,
) -> Option<ValidationError> {
    match &alternative.type_tag {
        TypeTag::String => string_checks(alternative, value),
        TypeTag::Number => number_checks(alternative, value, operator, false),
        TypeTag::Integer => number_checks(alternative, value, operator, true),
        TypeTag::Boolean => {
            if value.is_boolean() {
                None
            } else {
                expected("Boolean")
            }
        }
        TypeTag::Object | TypeTag::Schema(_) => {
            if ejson::is_plain_object(value) {
                None
            } else {
                expected("Object")
            }
        }
        TypeTag::Array => array_checks(alternative, value, operator),
        TypeTag::Date => date_checks(alternative, value, operator),
        TypeTag::Binary => {
            if ejson::is_binary(value) {
                None
            } else {
                expected("Binary")
            }
        }
        TypeTag::Custom { name, test } => {
            if test(value) {
                None
            } else {
                expected(name)
            }
        }
        TypeTag::Any => None,
    }
}

/// Whether a value has the type of a tag, ignoring every other constraint.
pub fn is_of_type(tag: &TypeTag, value: &Value) -> bool {
    match tag {
        TypeTag::String => value.is_string(),
        TypeTag::Number | TypeTag::Integer => value.is_number(),
        TypeTag::Boolean => value.is_boolean(),
        TypeTag::Object | TypeTag::Schema(_) => ejson::is_plain_object(value),
        TypeTag::Array => value.is_array(),
        TypeTag::Date => ejson::is_date(value),
        TypeTag::Binary => ejson::is_binary(value),
        TypeTag::Custom { test, .. } => test(value),
        TypeTag::Any => true,
    }
}

fn string_checks(alternative: &ResolvedAlternative, value: &Value) -> Option<ValidationError> {
    let Some(s) = value.as_str() else {
        return expected("String");
    };
    let length = s.chars().count() as f64;

    if let Some(max) = alternative.max.as_ref().and_then(Bound::as_f64) {
        if max < length {
            return Some(ValidationError::new("", ErrorType::MaxString).with_detail("max", Bound::Number(max).to_detail()));
        }
    }
    if let Some(min) = alternative.min.as_ref().and_then(Bound::as_f64) {
        if min > length {
            return Some(ValidationError::new("", ErrorType::MinString).with_detail("min", Bound::Number(min).to_detail()));
        }
    }

    if alternative.skip_reg_ex_check_for_empty_strings && s.is_empty() {
        return None;
    }
    alternative
        .reg_ex
        .iter()
        .find(|pattern| !pattern.is_match(s))
        .map(|pattern| {
            ValidationError::new("", ErrorType::FailedRegularExpression)
                .with_detail("regExp", pattern.as_str())
        })
}

fn number_checks(
    alternative: &ResolvedAlternative,
    value: &Value,
    operator: Option<&str>,
    expects_integer: bool,
) -> Option<ValidationError> {
    let Some(n) = value.as_f64() else {
        return expected(if expects_integer { "Integer" } else { "Number" });
    };

    // An increment says nothing about the resulting value.
    if operator != Some("$inc") {
        if let Some(max) = alternative.max.as_ref().and_then(Bound::as_f64) {
            let too_big = if alternative.exclusive_max { max <= n } else { max < n };
            if too_big {
                let kind = if alternative.exclusive_max {
                    ErrorType::MaxNumberExclusive
                } else {
                    ErrorType::MaxNumber
                };
                return Some(ValidationError::new("", kind).with_detail("max", Bound::Number(max).to_detail()));
            }
        }
        if let Some(min) = alternative.min.as_ref().and_then(Bound::as_f64) {
            let too_small = if alternative.exclusive_min { min >= n } else { min > n };
            if too_small {
                let kind = if alternative.exclusive_min {
                    ErrorType::MinNumberExclusive
                } else {
                    ErrorType::MinNumber
                };
                return Some(ValidationError::new("", kind).with_detail("min", Bound::Number(min).to_detail()));
            }
        }
    }

    if expects_integer && !(value.is_i64() || value.is_u64() || n.fract() == 0.0) {
        return error(ErrorType::MustBeInteger);
    }
    None
}

fn array_checks(alternative: &ResolvedAlternative, value: &Value, operator: Option<&str>) -> Option<ValidationError> {
    let Some(items) = value.as_array() else {
        return expected("Array");
    };
    // A pushed batch is not the resulting array.
    if matches!(operator, Some("$push" | "$addToSet")) {
        return None;
    }
    if let Some(min_count) = alternative.min_count {
        if items.len() < min_count {
            return Some(ValidationError::new("", ErrorType::MinCount).with_detail("minCount", min_count));
        }
    }
    if let Some(max_count) = alternative.max_count {
        if items.len() > max_count {
            return Some(ValidationError::new("", ErrorType::MaxCount).with_detail("maxCount", max_count));
        }
    }
    None
}

/// `$currentDate` accepts `true` or `{"$type": "date"}` for date fields.
fn is_current_date_request(value: &Value) -> bool {
    *value == Value::Bool(true) || *value == json!({ "$type": "date" })
}

fn date_checks(alternative: &ResolvedAlternative, value: &Value, operator: Option<&str>) -> Option<ValidationError> {
    if operator == Some("$currentDate") && is_current_date_request(value) {
        return None;
    }
    if !ejson::is_date(value) {
        return expected("Date");
    }
    let Some(instant) = ejson::as_date(value) else {
        return error(ErrorType::BadDate);
    };
    if let Some(min) = alternative.min.as_ref().and_then(Bound::as_date) {
        if *min > instant {
            return Some(ValidationError::new("", ErrorType::MinDate).with_detail("min", ejson::format_day(min)));
        }
    }
    if let Some(max) = alternative.max.as_ref().and_then(Bound::as_date) {
        if *max < instant {
            return Some(ValidationError::new("", ErrorType::MaxDate).with_detail("max", ejson::format_day(max)));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::TypeAlternative;
    use regex::Regex;

    fn resolve(alternative: TypeAlternative) -> ResolvedAlternative {
        alternative
            .resolve(&FieldContext::for_key("field", "field"))
            .unwrap()
    }

    fn kind(result: Option<ValidationError>) -> Option<String> {
        result.map(|e| e.error_type.to_string())
    }

    #[test]
    fn strings() {
        let alt = resolve(TypeAlternative::new(TypeTag::String).min(2).max(4));
        assert_eq!(kind(check_type(&alt, &json!("abc"), None)), None);
        assert_eq!(kind(check_type(&alt, &json!("a"), None)).as_deref(), Some("minString"));
        assert_eq!(kind(check_type(&alt, &json!("abcde"), None)).as_deref(), Some("maxString"));

        let err = check_type(&alt, &json!(5), None).unwrap();
        assert_eq!(err.error_type, ErrorType::ExpectedType);
        assert_eq!(err.detail("dataType"), Some(&json!("String")));
    }

    #[test]
    fn regex_lists_must_all_match() {
        let mut alt = resolve(
            TypeAlternative::new(TypeTag::String).reg_ex(Regex::new("^a").unwrap()),
        );
        alt.reg_ex.push(Regex::new("z$").unwrap());
        assert_eq!(kind(check_type(&alt, &json!("abz"), None)), None);
        let err = check_type(&alt, &json!("abc"), None).unwrap();
        assert_eq!(err.detail("regExp"), Some(&json!("z$")));

        assert!(check_type(&alt, &json!(""), None).is_some());
        alt.skip_reg_ex_check_for_empty_strings = true;
        assert!(check_type(&alt, &json!(""), None).is_none());
    }

    #[test]
    fn numbers_and_integers() {
        let alt = resolve(TypeAlternative::new(TypeTag::Number).min(0).max(10));
        assert_eq!(kind(check_type(&alt, &json!(10), None)), None);
        assert_eq!(kind(check_type(&alt, &json!(11), None)).as_deref(), Some("maxNumber"));
        assert_eq!(kind(check_type(&alt, &json!(-1), None)).as_deref(), Some("minNumber"));
        // Increments are not bounded.
        assert_eq!(kind(check_type(&alt, &json!(100), Some("$inc"))), None);

        let exclusive = resolve(
            TypeAlternative::new(TypeTag::Number)
                .min(0)
                .exclusive_min(true)
                .max(1)
                .exclusive_max(true),
        );
        assert_eq!(kind(check_type(&exclusive, &json!(0), None)).as_deref(), Some("minNumberExclusive"));
        assert_eq!(kind(check_type(&exclusive, &json!(1), None)).as_deref(), Some("maxNumberExclusive"));
        assert_eq!(kind(check_type(&exclusive, &json!(0.5), None)), None);

        let integer = resolve(TypeAlternative::new(TypeTag::Integer));
        assert_eq!(kind(check_type(&integer, &json!(2.5), None)).as_deref(), Some("noDecimal"));
        assert_eq!(kind(check_type(&integer, &json!(2.0), None)), None);
        let err = check_type(&integer, &json!("2"), None).unwrap();
        assert_eq!(err.detail("dataType"), Some(&json!("Integer")));
    }

    #[test]
    fn type_membership_ignores_constraints() {
        assert!(is_of_type(&TypeTag::String, &json!("much too long")));
        assert!(is_of_type(&TypeTag::Integer, &json!(1.5)));
        assert!(is_of_type(&TypeTag::Date, &json!({ "$date": "not a date" })));
        assert!(!is_of_type(&TypeTag::Object, &json!({ "$date": 0 })));
        assert!(!is_of_type(&TypeTag::Boolean, &json!("true")));
        assert!(is_of_type(&TypeTag::Any, &Value::Null));
    }

    #[test]
    fn pushed_batches_skip_counts() {
        let alt = resolve(TypeAlternative::new(TypeTag::Array).min_count(2));
        assert_eq!(kind(check_type(&alt, &json!(["a"]), Some("$push"))), None);
        assert_eq!(kind(check_type(&alt, &json!(["a"]), Some("$set"))).as_deref(), Some("minCount"));
    }

    #[test]
    fn arrays_count_items() {
        let alt = resolve(TypeAlternative::new(TypeTag::Array).min_count(1).max_count(2));
        assert_eq!(kind(check_type(&alt, &json!([]), None)).as_deref(), Some("minCount"));
        assert_eq!(kind(check_type(&alt, &json!([1, 2, 3]), None)).as_deref(), Some("maxCount"));
        assert_eq!(kind(check_type(&alt, &json!({}), None)).as_deref(), Some("expectedType"));
    }

    #[test]
    fn dates() {
        let min = ejson::parse_date_str("2020-01-01").unwrap();
        let alt = resolve(TypeAlternative::new(TypeTag::Date).min(min));
        assert_eq!(kind(check_type(&alt, &json!({ "$date": "2021-06-01T00:00:00Z" }), None)), None);
        let err = check_type(&alt, &json!({ "$date": "2019-06-01T00:00:00Z" }), None).unwrap();
        assert_eq!(err.error_type, ErrorType::MinDate);
        assert_eq!(err.detail("min"), Some(&json!("2020-01-01")));
        assert_eq!(kind(check_type(&alt, &json!({ "$date": "nope" }), None)).as_deref(), Some("badDate"));
        assert_eq!(kind(check_type(&alt, &json!("2021-01-01"), None)).as_deref(), Some("expectedType"));
    }

    #[test]
    fn current_date_requests() {
        let alt = resolve(TypeAlternative::new(TypeTag::Date));
        assert!(check_type(&alt, &json!(true), Some("$currentDate")).is_none());
        assert!(check_type(&alt, &json!({ "$type": "date" }), Some("$currentDate")).is_none());
        assert!(check_type(&alt, &json!({ "$type": "timestamp" }), Some("$currentDate")).is_some());
        assert!(check_type(&alt, &json!(true), None).is_some());
    }

    #[test]
    fn objects_exclude_wrappers_and_arrays() {
        let alt = resolve(TypeAlternative::new(TypeTag::Object));
        assert!(check_type(&alt, &json!({ "a": 1 }), None).is_none());
        assert!(check_type(&alt, &json!([]), None).is_some());
        assert!(check_type(&alt, &json!({ "$date": 0 }), None).is_some());
    }

    #[test]
    fn custom_types_use_their_test() {
        let money = TypeTag::custom("Money", |v| v.get("cents").is_some_and(Value::is_i64));
        let alt = resolve(TypeAlternative::new(money));
        assert!(check_type(&alt, &json!({ "cents": 5 }), None).is_none());
        let err = check_type(&alt, &json!(5), None).unwrap();
        assert_eq!(err.detail("dataType"), Some(&json!("Money")));
    }

    #[test]
    fn value_check_gate() {
        assert!(!value_should_be_checked("a", None, None));
        assert!(!value_should_be_checked("a", Some(&Value::Null), None));
        assert!(value_should_be_checked("a.$", Some(&Value::Null), None));
        assert!(!value_should_be_checked("a", Some(&json!(1)), Some("$unset")));
        assert!(value_should_be_checked("a", Some(&json!(1)), Some("$set")));
    }
}
