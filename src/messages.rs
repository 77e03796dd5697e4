//! Human-readable error messages.
//!
//! Text templates are handlebars templates. `{{name}}` placeholders are HTML
//! escaped and `{{{name}}}` ones are not. They are filled from the field
//! label, the error name and value, and the error's details (`min`, `max`,
//! `dataType`, ...). Templates can be overridden per language, per
//! error kind and per schema key.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use handlebars::Handlebars;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ValidationError;
use crate::patterns;
use crate::types::ErrorType;

pub const DEFAULT_LANGUAGE: &str = "en";

/// What a template renderer sees.
pub struct MessageContext<'a> {
    pub error: &'a ValidationError,
    /// Generic key of the field.
    pub key: &'a str,
    pub label: &'a str,
}

pub type MessageRenderer = Arc<dyn Fn(&MessageContext<'_>) -> String + Send + Sync>;

#[derive(Clone)]
pub enum MessageTemplate {
    Text(String),
    Render(MessageRenderer),
}

impl MessageTemplate {
    pub fn render_with<F>(f: F) -> Self
    where
        F: Fn(&MessageContext<'_>) -> String + Send + Sync + 'static,
    {
        MessageTemplate::Render(Arc::new(f))
    }

    fn render(&self, ctx: &MessageContext<'_>) -> String {
        match self {
            MessageTemplate::Text(text) => interpolate(text, ctx),
            MessageTemplate::Render(f) => f(ctx),
        }
    }
}

impl fmt::Debug for MessageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageTemplate::Text(text) => write!(f, "{text:?}"),
            MessageTemplate::Render(_) => f.write_str("<renderer>"),
        }
    }
}

impl From<&str> for MessageTemplate {
    fn from(text: &str) -> Self {
        MessageTemplate::Text(text.to_string())
    }
}

impl From<String> for MessageTemplate {
    fn from(text: String) -> Self {
        MessageTemplate::Text(text)
    }
}

/// Message templates by language, error kind and optionally key.
#[derive(Debug, Clone)]
pub struct MessageBox {
    language: String,
    by_kind: HashMap<(String, String), MessageTemplate>,
    by_key: HashMap<(String, String, String), MessageTemplate>,
}

impl Default for MessageBox {
    /// The built-in English messages.
    fn default() -> Self {
        let mut messages = Self::empty();
        for (kind, text) in [
            ("required", "{{{label}}} is required"),
            ("minString", "{{{label}}} must be at least {{min}} characters"),
            ("maxString", "{{{label}}} cannot exceed {{max}} characters"),
            ("minNumber", "{{{label}}} must be at least {{min}}"),
            ("maxNumber", "{{{label}}} cannot exceed {{max}}"),
            ("minNumberExclusive", "{{{label}}} must be greater than {{min}}"),
            ("maxNumberExclusive", "{{{label}}} must be less than {{max}}"),
            ("minDate", "{{{label}}} must be on or after {{min}}"),
            ("maxDate", "{{{label}}} cannot be after {{max}}"),
            ("badDate", "{{{label}}} is not a valid date"),
            ("minCount", "You must specify at least {{minCount}} values"),
            ("maxCount", "You cannot specify more than {{maxCount}} values"),
            ("noDecimal", "{{{label}}} must be an integer"),
            ("notAllowed", "{{{value}}} is not an allowed value"),
            ("expectedType", "{{{label}}} must be of type {{dataType}}"),
            ("keyNotInSchema", "{{name}} is not allowed by the schema"),
        ] {
            messages.set(DEFAULT_LANGUAGE, kind, text);
        }
        messages.set(
            DEFAULT_LANGUAGE,
            ErrorType::FailedRegularExpression,
            MessageTemplate::render_with(regex_message),
        );
        messages
    }
}

fn regex_message(ctx: &MessageContext<'_>) -> String {
    let specific = ctx
        .error
        .detail("regExp")
        .and_then(Value::as_str)
        .and_then(patterns::message_for);
    match specific {
        Some(message) => format!("{} {message}", ctx.label),
        None => format!("{} failed regular expression validation", ctx.label),
    }
}

impl MessageBox {
    /// A box with no templates at all.
    pub fn empty() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            by_kind: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = language.into();
    }

    pub fn set(
        &mut self,
        language: &str,
        kind: impl Into<ErrorType>,
        template: impl Into<MessageTemplate>,
    ) -> &mut Self {
        let kind = kind.into();
        self.by_kind
            .insert((language.to_string(), kind.as_str().to_string()), template.into());
        self
    }

    /// Override the template of one kind for one generic key.
    pub fn set_for_key(
        &mut self,
        language: &str,
        kind: impl Into<ErrorType>,
        key: &str,
        template: impl Into<MessageTemplate>,
    ) -> &mut Self {
        let kind = kind.into();
        self.by_key.insert(
            (language.to_string(), kind.as_str().to_string(), key.to_string()),
            template.into(),
        );
        self
    }

    /// Copy every template of `other` over this box. The language is kept.
    pub fn extend(&mut self, other: &MessageBox) {
        self.by_kind
            .extend(other.by_kind.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.by_key
            .extend(other.by_key.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    fn lookup(&self, language: &str, kind: &str, key: &str) -> Option<&MessageTemplate> {
        self.by_key
            .get(&(language.to_string(), kind.to_string(), key.to_string()))
            .or_else(|| self.by_kind.get(&(language.to_string(), kind.to_string())))
    }

    /// Render the message for an error in the current language, falling back
    /// to English and then to a generic text.
    pub fn render(&self, error: &ValidationError, key: &str, label: &str) -> String {
        let ctx = MessageContext { error, key, label };
        let kind = error.error_type.as_str();
        self.lookup(&self.language, kind, key)
            .or_else(|| self.lookup(DEFAULT_LANGUAGE, kind, key))
            .map(|template| template.render(&ctx))
            .unwrap_or_else(|| format!("{label} is invalid"))
    }
}

static TEMPLATES: LazyLock<Handlebars<'static>> = LazyLock::new(Handlebars::new);

/// Template data: the fixed names plus every error detail, as display text.
fn template_data(ctx: &MessageContext<'_>) -> Value {
    let mut data: Map<String, Value> = ctx
        .error
        .details
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(display(Some(value)))))
        .collect();
    data.insert("label".into(), ctx.label.into());
    data.insert("name".into(), ctx.error.name.clone().into());
    data.insert("key".into(), ctx.key.into());
    data.insert("type".into(), ctx.error.error_type.to_string().into());
    data.insert("value".into(), display(ctx.error.value.as_ref()).into());
    Value::Object(data)
}

fn display(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Render a handlebars template. Unknown names render empty; a template that
/// does not parse is returned as written.
fn interpolate(template: &str, ctx: &MessageContext<'_>) -> String {
    TEMPLATES
        .render_template(template, &template_data(ctx))
        .unwrap_or_else(|err| {
            warn!(template, error = %err, "message template failed to render");
            template.to_string()
        })
}
