//! Validation contexts.
//!
//! A [`ValidationContext`] keeps the errors of the last validation so callers
//! (forms, APIs) can ask about individual keys afterwards. Clones share the
//! same error list, which is how named contexts stay shared.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::error::{ValidateError, ValidationError};
use crate::keys::make_key_generic;
use crate::schema::Schema;
use crate::types::{CleanOptions, ValidateOptions};
use crate::validator;

#[derive(Clone)]
pub struct ValidationContext {
    name: Option<String>,
    schema: Arc<Schema>,
    errors: Arc<Mutex<Vec<ValidationError>>>,
}

impl ValidationContext {
    /// A context over a schema snapshot. Later changes to the schema the
    /// snapshot was taken from do not affect it.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            name: None,
            schema,
            errors: Arc::default(),
        }
    }

    pub(crate) fn named(name: &str, schema: Arc<Schema>) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::new(schema)
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ValidationError>> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and store the errors. Returns whether the document is valid.
    ///
    /// With `options.keys`, only those keys are revalidated and the stored
    /// errors of every other key are kept.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError` only for input that cannot be validated at all;
    /// per-key problems are stored, not returned.
    pub fn validate(&self, doc: &Value, options: &ValidateOptions) -> Result<bool, ValidateError> {
        let cleaned;
        let doc = if options.clean {
            let clean_options = self
                .schema
                .clean_options()
                .clone()
                .modifier(options.modifier)
                .upsert(options.upsert);
            cleaned = self.schema.clean_with(doc, &clean_options);
            &cleaned
        } else {
            doc
        };

        let mut errors = validator::do_validation(&self.schema, doc, options)?;
        if let Some(keys) = &options.keys {
            // Errors of keys outside the revalidated set carry over.
            for error in self.validation_errors() {
                let generic = make_key_generic(&error.name);
                if validator::key_is_selected(keys, &error.name, &generic)
                    || errors.iter().any(|e| e.name == error.name)
                {
                    continue;
                }
                errors.push(error);
            }
        }
        let is_valid = errors.is_empty();
        self.set_validation_errors(errors);
        Ok(is_valid)
    }

    pub fn is_valid(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn validation_errors(&self) -> Vec<ValidationError> {
        self.lock().clone()
    }

    pub fn reset(&self) {
        self.set_validation_errors(Vec::new());
    }

    /// Replace the stored errors.
    pub fn set_validation_errors(&self, errors: Vec<ValidationError>) {
        let previous = std::mem::replace(&mut *self.lock(), errors);
        self.notify(&previous);
    }

    /// Append errors, keeping one per key.
    pub fn add_validation_errors(&self, errors: Vec<ValidationError>) {
        let previous = {
            let mut current = self.lock();
            let previous = current.clone();
            for error in errors {
                if !current.iter().any(|e| e.name == error.name) {
                    current.push(error);
                }
            }
            previous
        };
        self.notify(&previous);
    }

    /// Tell the observer which keys gained or lost an error.
    fn notify(&self, previous: &[ValidationError]) {
        let current = self.validation_errors();
        let changed: BTreeSet<String> = previous
            .iter()
            .filter(|e| !current.contains(e))
            .chain(current.iter().filter(|e| !previous.contains(e)))
            .map(|e| e.name.clone())
            .collect();
        if !changed.is_empty() {
            let keys: Vec<String> = changed.into_iter().collect();
            self.schema.observer().on_errors_changed(&keys);
        }
    }

    /// The error for a key, looked up by specific key and then generic key.
    pub fn get_error_for_key(&self, key: &str) -> Option<ValidationError> {
        let errors = self.lock();
        if let Some(error) = errors.iter().find(|e| e.name == key) {
            return Some(error.clone());
        }
        let generic = make_key_generic(key);
        errors.iter().find(|e| e.name == generic).cloned()
    }

    pub fn key_is_invalid(&self, key: &str) -> bool {
        self.get_error_for_key(key).is_some()
    }

    /// The rendered message for a key's error, or `None` if it has none.
    pub fn key_error_message(&self, key: &str) -> Option<String> {
        self.get_error_for_key(key)
            .map(|error| self.schema.message_for_error(&error))
    }

    pub fn clean(&self, doc: &Value, options: &CleanOptions) -> Value {
        self.schema.clean_with(doc, options)
    }
}

impl fmt::Debug for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationContext")
            .field("name", &self.name)
            .field("errors", &*self.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaObserver;
    use crate::definition::{Field, FieldSpec, TypeTag};
    use crate::types::ErrorType;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new([
            ("name", FieldSpec::from(TypeTag::String)),
            ("age", Field::new(TypeTag::Integer).min(18).into()),
            ("emails", FieldSpec::array_of(TypeTag::String)),
        ])
        .unwrap()
    }

    #[test]
    fn stores_errors_of_the_last_validation() {
        let ctx = schema().new_context();
        assert!(!ctx.validate(&json!({ "age": 3, "emails": [] }), &ValidateOptions::new()).unwrap());
        assert!(ctx.key_is_invalid("name"));
        assert_eq!(ctx.key_error_message("age").as_deref(), Some("Age must be at least 18"));

        assert!(ctx
            .validate(&json!({ "name": "x", "age": 30, "emails": [] }), &ValidateOptions::new())
            .unwrap());
        assert!(ctx.is_valid());
    }

    #[test]
    fn partial_revalidation_keeps_other_errors() {
        let ctx = schema().new_context();
        ctx.validate(&json!({ "age": 3, "emails": [] }), &ValidateOptions::new())
            .unwrap();
        assert_eq!(ctx.validation_errors().len(), 2);

        ctx.validate(&json!({ "age": 30, "emails": [] }), &ValidateOptions::new().keys(["age"]))
            .unwrap();
        let errors = ctx.validation_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].name, "name");
    }

    #[test]
    fn revalidating_a_generic_key_replaces_item_errors() {
        let ctx = schema().new_context();
        let only_items = ValidateOptions::new().keys(["emails.$"]);
        ctx.validate(&json!({ "name": "x", "age": 20, "emails": [1, 2] }), &ValidateOptions::new())
            .unwrap();
        assert_eq!(ctx.validation_errors().len(), 2);

        ctx.validate(&json!({ "name": "x", "age": 20, "emails": ["a", 2] }), &only_items)
            .unwrap();
        let names: Vec<String> = ctx.validation_errors().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["emails.1"]);

        ctx.validate(&json!({ "name": "x", "age": 20, "emails": ["a", "b"] }), &only_items)
            .unwrap();
        assert!(ctx.is_valid());
    }

    #[test]
    fn generic_key_lookup() {
        let ctx = schema().new_context();
        ctx.set_validation_errors(vec![ValidationError::new("emails.$", ErrorType::Required)]);
        assert!(ctx.key_is_invalid("emails.4"));
        ctx.reset();
        assert!(ctx.is_valid());
    }

    #[test]
    fn snapshot_is_isolated_from_schema_changes() {
        let mut schema = schema();
        let ctx = schema.new_context();
        schema.extend([("nickname", TypeTag::String)]).unwrap();
        ctx.validate(&json!({ "name": "x", "age": 20, "emails": [] }), &ValidateOptions::new())
            .unwrap();
        assert!(ctx.is_valid());
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Vec<String>>>);

    impl SchemaObserver for Recorder {
        fn on_errors_changed(&self, keys: &[String]) {
            self.0.lock().unwrap().push(keys.to_vec());
        }
    }

    #[test]
    fn observer_hears_changed_keys() {
        let recorder = Arc::new(Recorder::default());
        let schema = schema().with_observer(recorder.clone());
        let ctx = schema.new_context();
        ctx.validate(&json!({ "age": 20, "emails": [] }), &ValidateOptions::new())
            .unwrap();
        ctx.validate(&json!({ "age": 20, "emails": [] }), &ValidateOptions::new())
            .unwrap();
        ctx.reset();
        let calls = recorder.0.lock().unwrap();
        assert_eq!(*calls, vec![vec!["name".to_string()], vec!["name".to_string()]]);
    }
}
