//! Error types for schema definition, loading and validation.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::ErrorType;

/// Errors raised while defining or extending a schema.
///
/// A malformed schema is a programmer error, so these surface immediately from
/// `Schema::new`, `extend`, `pick` and `omit` rather than at validation time.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{key} key is missing \"type\"")]
    MissingType { key: String },

    #[error("invalid definition for {key} field: \"type\" may not be an array, change it to Array")]
    ArrayType { key: String },

    #[error("invalid definition for {key} field: \"type\" may not be an empty object, change it to Object")]
    EmptyObjectType { key: String },

    #[error("\"{key}\" is Array type but the schema does not include a \"{key}.$\" definition for the array items")]
    MissingArrayItem { key: String },

    #[error("\"{key}\" is in the schema but \"{parent}\" is not")]
    MissingParent { key: String, parent: String },

    #[error("an array item field (\"{key}\") cannot have defaultValue")]
    DefaultOnArrayItem { key: String },

    #[error("the type for \"{key}\" is set to a schema that defines \"{nested}\", but the parent schema also defines \"{nested}\"")]
    OverlappingSubschema { key: String, nested: String },

    #[error("invalid definition for {key} field: {option} is not a supported property")]
    UnsupportedOption { key: String, option: String },

    #[error("invalid regular expression for {key}: {source}")]
    InvalidRegex {
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown type \"{name}\" for {key}")]
    UnknownType { key: String, name: String },

    #[error("invalid definition for {key} field: {message}")]
    InvalidShorthand { key: String, message: String },

    #[error("\"{key}\" is not defined in the schema")]
    UnknownKey { key: String },

    #[error("\"{key}\" is not a usable field name: {reason}")]
    ReservedKey { key: String, reason: String },
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors while loading documents or schema declarations.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            LoadError::InvalidJson { .. } => 2,
        }
    }
}

/// Errors during validation.
///
/// Bad input (a non-object, or modifier-shaped input without the modifier
/// option) is raised immediately. Per-key problems are never raised one by one;
/// they are collected and surface only through [`ValidateError::Invalid`].
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("the first argument of validate() must be an object, got {actual}")]
    NotAnObject { actual: String },

    #[error("when the validation object contains mongo operators, you must set the modifier option to true")]
    ModifierWithoutOption,

    #[error("expected '{key}' to be a modifier operator like '$set'")]
    InvalidOperator { key: String },

    #[error("$pushAll is not supported; use $push + $each")]
    PushAllUnsupported,

    #[error("{message}")]
    Invalid {
        message: String,
        details: Vec<ErrorDetail>,
    },

    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Invalid { .. } => 1,
            _ => 2,
        }
    }

    /// Per-key details of an aggregate validation failure.
    pub fn details(&self) -> &[ErrorDetail] {
        match self {
            ValidateError::Invalid { details, .. } => details,
            _ => &[],
        }
    }
}

/// A single per-key validation error.
///
/// `name` is the specific key (array indices included) the error belongs to.
/// Kind-specific context such as `min`, `max` or `dataType` lives in `details`
/// and is flattened into the same JSON object when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub name: String,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, Value>,
}

impl ValidationError {
    pub fn new(name: impl Into<String>, error_type: impl Into<ErrorType>) -> Self {
        Self {
            name: name.into(),
            error_type: error_type.into(),
            value: None,
            details: serde_json::Map::new(),
        }
    }

    /// Attach the offending value.
    pub fn with_value(mut self, value: Option<Value>) -> Self {
        self.value = value;
        self
    }

    /// Attach a kind-specific detail such as `min` or `dataType`.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.error_type)
    }
}

/// A validation error together with its rendered message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    #[serde(flatten)]
    pub error: ValidationError,
    pub message: String,
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error.name, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("doc.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let source = serde_json::from_str::<Value>("nope").unwrap_err();
        let err = LoadError::InvalidJson { source };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn validate_error_exit_codes() {
        let err = ValidateError::Invalid {
            message: "Name is required".into(),
            details: vec![],
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(ValidateError::ModifierWithoutOption.exit_code(), 2);
    }

    #[test]
    fn schema_error_messages_name_the_key() {
        let err = SchemaError::MissingParent {
            key: "address.city".into(),
            parent: "address".into(),
        };
        assert_eq!(
            err.to_string(),
            "\"address.city\" is in the schema but \"address\" is not"
        );
    }

    #[test]
    fn validation_error_serializes_flat() {
        let err = ValidationError::new("age", ErrorType::MinNumber)
            .with_value(Some(json!(3)))
            .with_detail("min", 5);
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(
            value,
            json!({ "name": "age", "type": "minNumber", "value": 3, "min": 5 })
        );
    }

    #[test]
    fn error_detail_display() {
        let detail = ErrorDetail {
            error: ValidationError::new("buyer.email", ErrorType::Required),
            message: "Email is required".into(),
        };
        assert_eq!(detail.to_string(), "buyer.email: Email is required");
    }
}
