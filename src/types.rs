//! Core types shared by validation and cleaning.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::ejson;

/// Update operators understood by validation and cleaning.
pub const MODIFIER_OPERATORS: &[&str] = &[
    "$set",
    "$setOnInsert",
    "$unset",
    "$inc",
    "$push",
    "$addToSet",
    "$pull",
    "$pullAll",
    "$pop",
    "$rename",
    "$currentDate",
];

/// Operators whose values do not constrain document shape and are never validated.
pub const UNCHECKED_OPERATORS: &[&str] = &["$pull", "$pullAll", "$pop", "$slice"];

/// Operators whose values are irrelevant to cleaning.
pub const IGNORED_VALUE_OPERATORS: &[&str] = &["$unset", "$currentDate"];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) if ejson::is_date(value) => "date",
        Value::Object(_) if ejson::is_binary(value) => "binary",
        Value::Object(_) => "object",
    }
}

/// Kind of a per-key validation error.
///
/// The named variants are the built-in kinds. Any other string, such as one
/// returned by a custom validator, is carried as [`ErrorType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorType {
    Required,
    MinString,
    MaxString,
    MinNumber,
    MaxNumber,
    MinNumberExclusive,
    MaxNumberExclusive,
    MinDate,
    MaxDate,
    BadDate,
    MinCount,
    MaxCount,
    MustBeInteger,
    ValueNotAllowed,
    ExpectedType,
    FailedRegularExpression,
    KeyNotInSchema,
    Custom(String),
}

impl ErrorType {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorType::Required => "required",
            ErrorType::MinString => "minString",
            ErrorType::MaxString => "maxString",
            ErrorType::MinNumber => "minNumber",
            ErrorType::MaxNumber => "maxNumber",
            ErrorType::MinNumberExclusive => "minNumberExclusive",
            ErrorType::MaxNumberExclusive => "maxNumberExclusive",
            ErrorType::MinDate => "minDate",
            ErrorType::MaxDate => "maxDate",
            ErrorType::BadDate => "badDate",
            ErrorType::MinCount => "minCount",
            ErrorType::MaxCount => "maxCount",
            ErrorType::MustBeInteger => "noDecimal",
            ErrorType::ValueNotAllowed => "notAllowed",
            ErrorType::ExpectedType => "expectedType",
            ErrorType::FailedRegularExpression => "regEx",
            ErrorType::KeyNotInSchema => "keyNotInSchema",
            ErrorType::Custom(name) => name,
        }
    }
}

impl From<&str> for ErrorType {
    fn from(s: &str) -> Self {
        match s {
            "required" => ErrorType::Required,
            "minString" => ErrorType::MinString,
            "maxString" => ErrorType::MaxString,
            "minNumber" => ErrorType::MinNumber,
            "maxNumber" => ErrorType::MaxNumber,
            "minNumberExclusive" => ErrorType::MinNumberExclusive,
            "maxNumberExclusive" => ErrorType::MaxNumberExclusive,
            "minDate" => ErrorType::MinDate,
            "maxDate" => ErrorType::MaxDate,
            "badDate" => ErrorType::BadDate,
            "minCount" => ErrorType::MinCount,
            "maxCount" => ErrorType::MaxCount,
            "noDecimal" => ErrorType::MustBeInteger,
            "notAllowed" => ErrorType::ValueNotAllowed,
            "expectedType" => ErrorType::ExpectedType,
            "regEx" => ErrorType::FailedRegularExpression,
            "keyNotInSchema" => ErrorType::KeyNotInSchema,
            other => ErrorType::Custom(other.to_string()),
        }
    }
}

impl From<String> for ErrorType {
    fn from(s: String) -> Self {
        ErrorType::from(s.as_str())
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Options for a validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// The input is a MongoDB update modifier (`{$set: …}`).
    pub modifier: bool,
    /// The modifier is used for an upsert, so `$setOnInsert` counts as set.
    pub upsert: bool,
    /// Revalidate only these keys and their descendants.
    pub keys: Option<Vec<String>>,
    /// Error kinds to drop from the result.
    pub ignore: Vec<ErrorType>,
    /// Extra entries made visible to custom validators.
    pub extended_custom_context: Map<String, Value>,
    /// Clean a copy of the input before validating it.
    pub clean: bool,
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modifier(mut self, modifier: bool) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn ignore<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ErrorType>,
    {
        self.ignore = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn extend_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extended_custom_context.insert(key.into(), value);
        self
    }

    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }
}

/// Options for cleaning a document or modifier.
///
/// Every schema carries its own defaults (see `Schema::clean_options`); start
/// from those and override what a particular call needs.
#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Remove keys the schema does not allow.
    pub filter: bool,
    /// Convert values to the declared type where possible.
    pub auto_convert: bool,
    /// Remove (or `$unset`) keys set to an empty string.
    pub remove_empty_strings: bool,
    /// Trim string values unless the field sets `trim: false`.
    pub trim_strings: bool,
    /// Run auto-value and default-value functions.
    pub get_auto_values: bool,
    /// Remove `null` items from arrays.
    pub remove_nulls_from_arrays: bool,
    /// Treat the input as a modifier. `None` detects it from the shape.
    pub is_modifier: Option<bool>,
    pub is_upsert: bool,
    /// Extra entries made visible to auto-value functions.
    pub extend_auto_value_context: Map<String, Value>,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            filter: true,
            auto_convert: true,
            remove_empty_strings: true,
            trim_strings: true,
            get_auto_values: true,
            remove_nulls_from_arrays: false,
            is_modifier: None,
            is_upsert: false,
            extend_auto_value_context: Map::new(),
        }
    }
}

impl CleanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: bool) -> Self {
        self.filter = filter;
        self
    }

    pub fn auto_convert(mut self, auto_convert: bool) -> Self {
        self.auto_convert = auto_convert;
        self
    }

    pub fn remove_empty_strings(mut self, remove: bool) -> Self {
        self.remove_empty_strings = remove;
        self
    }

    pub fn trim_strings(mut self, trim: bool) -> Self {
        self.trim_strings = trim;
        self
    }

    pub fn get_auto_values(mut self, get: bool) -> Self {
        self.get_auto_values = get;
        self
    }

    pub fn remove_nulls_from_arrays(mut self, remove: bool) -> Self {
        self.remove_nulls_from_arrays = remove;
        self
    }

    pub fn modifier(mut self, is_modifier: bool) -> Self {
        self.is_modifier = Some(is_modifier);
        self
    }

    pub fn upsert(mut self, is_upsert: bool) -> Self {
        self.is_upsert = is_upsert;
        self
    }

    pub fn extend_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extend_auto_value_context.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_type_round_trips_known_names() {
        for name in ["required", "noDecimal", "regEx", "keyNotInSchema"] {
            assert_eq!(ErrorType::from(name).as_str(), name);
        }
        assert_eq!(ErrorType::from("noDecimal"), ErrorType::MustBeInteger);
    }

    #[test]
    fn error_type_keeps_custom_names() {
        let kind = ErrorType::from("passwordMismatch");
        assert_eq!(kind, ErrorType::Custom("passwordMismatch".into()));
        assert_eq!(kind.to_string(), "passwordMismatch");
    }

    #[test]
    fn json_type_names_recognize_wrappers() {
        assert_eq!(json_type_name(&json!({ "$date": 0 })), "date");
        assert_eq!(json_type_name(&json!({ "$binary": "AA==" })), "binary");
        assert_eq!(json_type_name(&json!({ "a": 1 })), "object");
    }

    #[test]
    fn clean_options_defaults() {
        let opts = CleanOptions::default();
        assert!(opts.filter && opts.auto_convert && opts.trim_strings);
        assert!(!opts.remove_nulls_from_arrays);
        assert_eq!(opts.is_modifier, None);

        let opts = opts.filter(false).modifier(true);
        assert!(!opts.filter);
        assert_eq!(opts.is_modifier, Some(true));
    }

    #[test]
    fn validate_options_builder() {
        let opts = ValidateOptions::new()
            .modifier(true)
            .keys(["name"])
            .ignore(["required"]);
        assert!(opts.modifier);
        assert_eq!(opts.keys, Some(vec!["name".to_string()]));
        assert_eq!(opts.ignore, vec![ErrorType::Required]);
    }
}
