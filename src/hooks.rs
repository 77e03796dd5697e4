//! Callback contexts and return types.
//!
//! Custom validators, computed options, document validators and auto-value
//! functions are plain closures. Each receives a context describing the key
//! being processed and can look up other fields of the same document.

use std::cell::Cell;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::definition::{ResolvedAlternative, ResolvedDefinition};
use crate::error::ValidationError;
use crate::keys::{parent_of_key, parent_of_key_with_dot};
use crate::mongo_object::{FieldInfo, MongoObject};
use crate::schema::Schema;
use crate::types::ErrorType;

/// Field-level validator: built-in, per-field `custom`, schema-wide or global.
pub type ValidatorFn = Arc<dyn Fn(&FieldContext<'_>) -> Verdict + Send + Sync>;

/// Whole-document validator, run once after the key walk.
pub type DocValidatorFn = Arc<dyn Fn(&DocContext<'_>) -> Vec<ValidationError> + Send + Sync>;

/// Auto-value function; see [`AutoValue`] for how results are applied.
pub type AutoValueFn = Arc<dyn Fn(&AutoValueContext<'_>) -> AutoValue + Send + Sync>;

/// Instance test for a custom type tag.
pub type InstanceTest = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Outcome of one validator in the chain for a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Continue with the next validator.
    Valid,
    /// Record an error of this kind for the key and stop the chain.
    Invalid(ErrorType),
    /// Record this error and stop. An empty `name` means the current key and a
    /// missing `value` means the current value.
    Error(ValidationError),
    /// Record these errors as they are and stop.
    Errors(Vec<ValidationError>),
    /// Stop the chain without recording anything.
    Veto,
}

impl Verdict {
    pub fn invalid(kind: impl Into<ErrorType>) -> Self {
        Verdict::Invalid(kind.into())
    }
}

impl From<Option<ValidationError>> for Verdict {
    fn from(error: Option<ValidationError>) -> Self {
        match error {
            Some(error) => Verdict::Error(error),
            None => Verdict::Valid,
        }
    }
}

impl From<Option<&str>> for Verdict {
    fn from(kind: Option<&str>) -> Self {
        match kind {
            Some(kind) => Verdict::invalid(kind),
            None => Verdict::Valid,
        }
    }
}

/// What an auto-value function wants done at its position.
#[derive(Debug, Clone, PartialEq)]
pub enum AutoValue {
    NoChange,
    /// Write this value at the position.
    Replace(Value),
    /// Write the value under another operator instead, e.g. `$setOnInsert`.
    Modifier { operator: String, value: Value },
    /// Remove the position.
    Unset,
}

impl AutoValue {
    pub fn set_on_insert(value: Value) -> Self {
        AutoValue::Modifier {
            operator: "$setOnInsert".to_string(),
            value,
        }
    }
}

impl From<Option<Value>> for AutoValue {
    fn from(value: Option<Value>) -> Self {
        match value {
            Some(value) => AutoValue::Replace(value),
            None => AutoValue::NoChange,
        }
    }
}

/// Context for field validators and computed definition options.
///
/// When a definition is resolved without a document (for example to render a
/// label), only `key` and `generic_key` carry information.
#[derive(Clone, Copy)]
pub struct FieldContext<'a> {
    pub key: &'a str,
    pub generic_key: &'a str,
    pub value: Option<&'a Value>,
    pub operator: Option<&'a str>,
    pub is_modifier: bool,
    pub is_upsert: bool,
    pub is_in_array_item_object: bool,
    pub is_in_sub_object: bool,
    /// Null and undefined values are not type checked, except `null` array items.
    pub value_should_be_checked: bool,
    pub(crate) definition: Option<&'a ResolvedDefinition>,
    pub(crate) alternative: Option<&'a ResolvedAlternative>,
    pub(crate) document: Option<&'a MongoObject>,
    pub(crate) extended: Option<&'a Map<String, Value>>,
}

impl<'a> FieldContext<'a> {
    /// A context that knows only the key.
    pub fn for_key(key: &'a str, generic_key: &'a str) -> Self {
        Self {
            key,
            generic_key,
            value: None,
            operator: None,
            is_modifier: false,
            is_upsert: false,
            is_in_array_item_object: false,
            is_in_sub_object: false,
            value_should_be_checked: false,
            definition: None,
            alternative: None,
            document: None,
            extended: None,
        }
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Evaluated definition of the key, with the alternative being tried.
    pub fn definition(&self) -> Option<&'a ResolvedDefinition> {
        self.definition
    }

    pub fn alternative(&self) -> Option<&'a ResolvedAlternative> {
        self.alternative
    }

    /// The whole document or modifier being validated.
    pub fn document(&self) -> Option<&'a Value> {
        self.document.map(MongoObject::get_object)
    }

    /// Look up any field of the document by its full key.
    pub fn field(&self, name: &str) -> FieldInfo {
        self.document
            .map(|doc| doc.get_info_for_key(name))
            .unwrap_or_default()
    }

    /// Look up a field next to this one.
    pub fn sibling_field(&self, name: &str) -> FieldInfo {
        self.field(&format!("{}{}", parent_of_key_with_dot(self.key), name))
    }

    pub fn parent_field(&self) -> FieldInfo {
        self.field(parent_of_key(self.key))
    }

    /// An entry of the caller's extended context.
    pub fn extended(&self, name: &str) -> Option<&'a Value> {
        self.extended.and_then(|map| map.get(name))
    }
}

/// Context for whole-document validators.
pub struct DocContext<'a> {
    pub document: &'a Value,
    pub is_modifier: bool,
    pub is_upsert: bool,
    pub keys: Option<&'a [String]>,
    pub ignore: &'a [ErrorType],
    pub schema: &'a Schema,
    pub(crate) mongo_object: &'a MongoObject,
    pub(crate) extended: &'a Map<String, Value>,
}

impl<'a> DocContext<'a> {
    pub fn field(&self, name: &str) -> FieldInfo {
        self.mongo_object.get_info_for_key(name)
    }

    pub fn extended(&self, name: &str) -> Option<&'a Value> {
        self.extended.get(name)
    }
}

/// Context for auto-value functions.
pub struct AutoValueContext<'a> {
    pub key: &'a str,
    pub value: Option<&'a Value>,
    pub operator: Option<&'a str>,
    pub is_modifier: bool,
    pub is_upsert: bool,
    /// Key of the closest embedding field when the field lives in a sub-schema.
    pub closest_subschema_field_name: Option<&'a str>,
    pub(crate) document: &'a MongoObject,
    pub(crate) parent: FieldInfo,
    pub(crate) extended: &'a Map<String, Value>,
    pub(crate) unset_requested: Cell<bool>,
}

impl<'a> AutoValueContext<'a> {
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Look up a field by key, relative to the closest sub-schema field.
    pub fn field(&self, name: &str) -> FieldInfo {
        match self.closest_subschema_field_name {
            Some(prefix) => self.document.get_info_for_key(&format!("{prefix}.{name}")),
            None => self.document.get_info_for_key(name),
        }
    }

    pub fn sibling_field(&self, name: &str) -> FieldInfo {
        self.document
            .get_info_for_key(&format!("{}{}", parent_of_key_with_dot(self.key), name))
    }

    pub fn parent_field(&self) -> FieldInfo {
        self.parent.clone()
    }

    /// Ask for the position to be removed. Takes priority over the return value.
    pub fn unset(&self) {
        self.unset_requested.set(true);
    }

    pub fn document(&self) -> &'a Value {
        self.document.get_object()
    }

    pub fn extended(&self, name: &str) -> Option<&'a Value> {
        self.extended.get(name)
    }
}
