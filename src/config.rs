//! Schema-wide and process-wide configuration.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{ValidateError, ValidationError};
use crate::hooks::{DocContext, DocValidatorFn, FieldContext, ValidatorFn, Verdict};
use crate::messages::MessageBox;
use crate::types::CleanOptions;

/// Notified when labels or validation errors change, for callers that keep
/// derived state (forms, caches) in sync with a schema.
pub trait SchemaObserver: Send + Sync {
    fn on_label_changed(&self, _key: &str) {}
    fn on_errors_changed(&self, _keys: &[String]) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl SchemaObserver for NoopObserver {}

/// Per-schema options.
#[derive(Debug, Clone)]
pub struct SchemaOptions {
    /// Defaults for `Schema::clean`.
    pub clean: CleanOptions,
    /// Derive labels as `First name` rather than `firstName`.
    pub humanize_auto_labels: bool,
    /// Fields without `optional`/`required` are required.
    pub required_by_default: bool,
    /// Label for every field that has none.
    pub default_label: Option<String>,
    /// Non-standard definition options accepted by this schema.
    pub allowed_extra_options: Vec<String>,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            clean: CleanOptions::default(),
            humanize_auto_labels: true,
            required_by_default: true,
            default_label: None,
            allowed_extra_options: Vec::new(),
        }
    }
}

impl SchemaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clean(mut self, clean: CleanOptions) -> Self {
        self.clean = clean;
        self
    }

    pub fn humanize_auto_labels(mut self, humanize: bool) -> Self {
        self.humanize_auto_labels = humanize;
        self
    }

    pub fn required_by_default(mut self, required: bool) -> Self {
        self.required_by_default = required;
        self
    }

    pub fn default_label(mut self, label: impl Into<String>) -> Self {
        self.default_label = Some(label.into());
        self
    }

    pub fn allow_option(mut self, name: impl Into<String>) -> Self {
        self.allowed_extra_options.push(name.into());
        self
    }
}

pub type ErrorTransform = Arc<dyn Fn(ValidateError) -> ValidateError + Send + Sync>;

/// Validators, messages and defaults shared by every schema built with it.
///
/// Schemas hold an `Arc<SchemaConfig>`; [`SchemaConfig::global`] is used when
/// none is given.
#[derive(Clone, Default)]
pub struct SchemaConfig {
    pub(crate) validators: Vec<ValidatorFn>,
    pub(crate) doc_validators: Vec<DocValidatorFn>,
    pub(crate) messages: MessageBox,
    pub(crate) options: SchemaOptions,
    pub(crate) error_transform: Option<ErrorTransform>,
}

impl SchemaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default configuration.
    pub fn global() -> Arc<SchemaConfig> {
        static GLOBAL: OnceLock<Arc<SchemaConfig>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(SchemaConfig::default())))
    }

    /// Run after each schema's own validators, for every field of every schema.
    pub fn add_validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> Verdict + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(f));
        self
    }

    pub fn add_doc_validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&DocContext<'_>) -> Vec<ValidationError> + Send + Sync + 'static,
    {
        self.doc_validators.push(Arc::new(f));
        self
    }

    pub fn messages(mut self, messages: MessageBox) -> Self {
        self.messages = messages;
        self
    }

    pub fn options(mut self, options: SchemaOptions) -> Self {
        self.options = options;
        self
    }

    /// Rewrite the aggregate error raised by `Schema::validate`.
    pub fn error_transform<F>(mut self, f: F) -> Self
    where
        F: Fn(ValidateError) -> ValidateError + Send + Sync + 'static,
    {
        self.error_transform = Some(Arc::new(f));
        self
    }

    pub fn default_options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn default_messages(&self) -> &MessageBox {
        &self.messages
    }

    pub(crate) fn transform(&self, error: ValidateError) -> ValidateError {
        match &self.error_transform {
            Some(f) => f(error),
            None => error,
        }
    }
}

impl fmt::Debug for SchemaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaConfig")
            .field("validators", &self.validators.len())
            .field("doc_validators", &self.doc_validators.len())
            .field("options", &self.options)
            .field("error_transform", &self.error_transform.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_config_is_shared() {
        let a = SchemaConfig::global();
        let b = SchemaConfig::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.validators.is_empty());
    }

    #[test]
    fn builder_collects_hooks() {
        let config = SchemaConfig::new()
            .add_validator(|_| Verdict::Valid)
            .add_doc_validator(|_| Vec::new())
            .options(SchemaOptions::new().required_by_default(false))
            .error_transform(|err| ValidateError::Custom(err.to_string().into()));
        assert_eq!(config.validators.len(), 1);
        assert_eq!(config.doc_validators.len(), 1);
        assert!(!config.default_options().required_by_default);

        let transformed = config.transform(ValidateError::PushAllUnsupported);
        assert!(matches!(transformed, ValidateError::Custom(_)));
    }
}
