//! The schema store.
//!
//! A [`Schema`] owns an ordered set of normalized field definitions and the
//! state derived from them (first-level keys, child keys per object, blackbox
//! keys, auto-value functions). Every mutation goes through
//! [`Schema::extend`], which works on a copy and recomputes the derived state,
//! so a failed extension leaves the schema untouched.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::autovalue::default_auto_value;
use crate::clean;
use crate::config::{NoopObserver, SchemaConfig, SchemaObserver, SchemaOptions};
use crate::context::ValidationContext;
use crate::declaration;
use crate::definition::{
    Bound, Dynamic, Field, FieldDefinition, FieldSpec, ResolvedDefinition, TypeAlternative,
    TypeGroup, TypeTag,
};
use crate::error::{ErrorDetail, SchemaError, ValidateError, ValidationError};
use crate::hooks::{AutoValueFn, DocContext, DocValidatorFn, FieldContext, ValidatorFn, Verdict};
use crate::keys::{ancestors, inflected_label, is_descendant, make_key_generic, parent_of_key};
use crate::messages::{MessageBox, MessageTemplate};
use crate::types::{CleanOptions, ErrorType, ValidateOptions};
use crate::validator;

/// Nesting limit for sub-schema lookups.
const MAX_SUBSCHEMA_DEPTH: usize = 32;

/// An auto-value function together with where it applies.
#[derive(Clone)]
pub struct AutoValueEntry {
    /// Full generic key, prefixed with the embedding key for sub-schema fields.
    pub field_name: String,
    pub func: AutoValueFn,
    pub closest_subschema_field_name: Option<String>,
}

impl fmt::Debug for AutoValueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoValueEntry")
            .field("field_name", &self.field_name)
            .field("closest_subschema_field_name", &self.closest_subschema_field_name)
            .finish_non_exhaustive()
    }
}

/// Named validation contexts. Copies of a schema start with an empty cache.
#[derive(Default)]
struct ContextCache(Mutex<HashMap<String, ValidationContext>>);

impl Clone for ContextCache {
    fn clone(&self) -> Self {
        Self::default()
    }
}

#[derive(Clone)]
pub struct Schema {
    keys: Vec<String>,
    definitions: HashMap<String, FieldDefinition>,
    first_level_keys: Vec<String>,
    object_keys: HashMap<String, Vec<String>>,
    blackbox_keys: HashSet<String>,
    auto_values: Vec<AutoValueEntry>,
    validators: Vec<ValidatorFn>,
    doc_validators: Vec<DocValidatorFn>,
    options: SchemaOptions,
    messages: MessageBox,
    config: Arc<SchemaConfig>,
    observer: Arc<dyn SchemaObserver>,
    contexts: ContextCache,
}

impl Schema {
    /// Build a schema from `(key, spec)` pairs using the global configuration.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for any malformed definition.
    ///
    /// # Example
    ///
    /// ```
    /// use doc_schema::{Field, FieldSpec, Schema, TypeTag};
    ///
    /// let schema = Schema::new([
    ///     ("name", FieldSpec::from(TypeTag::String)),
    ///     ("tags", FieldSpec::array_of(TypeTag::String)),
    ///     ("age", Field::new(TypeTag::Integer).min(0).optional(true).into()),
    /// ])
    /// .unwrap();
    /// assert_eq!(schema.keys(), ["name", "tags", "tags.$", "age"]);
    /// ```
    pub fn new<I, K, S>(declaration: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<FieldSpec>,
    {
        Self::with_config(declaration, SchemaConfig::global())
    }

    pub fn with_options<I, K, S>(declaration: I, options: SchemaOptions) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<FieldSpec>,
    {
        let mut schema = Self::empty(SchemaConfig::global(), options);
        schema.extend(declaration)?;
        Ok(schema)
    }

    pub fn with_config<I, K, S>(declaration: I, config: Arc<SchemaConfig>) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<FieldSpec>,
    {
        let options = config.options.clone();
        let mut schema = Self::empty(config, options);
        schema.extend(declaration)?;
        Ok(schema)
    }

    /// Build a schema from a JSON declaration (see the `declaration` module).
    pub fn from_json(declaration: &Value) -> Result<Self, SchemaError> {
        Self::from_json_with_config(declaration, SchemaConfig::global())
    }

    pub fn from_json_with_config(
        declaration: &Value,
        config: Arc<SchemaConfig>,
    ) -> Result<Self, SchemaError> {
        let fields = declaration::parse_declaration(declaration, &config)?;
        Self::with_config(fields, config)
    }

    fn empty(config: Arc<SchemaConfig>, options: SchemaOptions) -> Self {
        Self {
            keys: Vec::new(),
            definitions: HashMap::new(),
            first_level_keys: Vec::new(),
            object_keys: HashMap::new(),
            blackbox_keys: HashSet::new(),
            auto_values: Vec::new(),
            validators: Vec::new(),
            doc_validators: Vec::new(),
            options,
            messages: config.messages.clone(),
            config,
            observer: Arc::new(NoopObserver),
            contexts: ContextCache::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SchemaObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub(crate) fn observer(&self) -> &Arc<dyn SchemaObserver> {
        &self.observer
    }

    // --- Extension ---

    /// Add keys, or merge options into existing keys.
    ///
    /// For an existing key, non-type options given here replace the old ones
    /// and type alternatives are merged position by position.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if the merged schema is invalid; `self` is then
    /// left unchanged.
    pub fn extend<I, K, S>(&mut self, declaration: I) -> Result<&mut Self, SchemaError>
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<FieldSpec>,
    {
        let declaration = declaration
            .into_iter()
            .map(|(k, s)| (k.into(), s.into()))
            .collect();
        let fields = expand_shorthand(declaration)?;
        let mut next = self.clone();
        next.merge_fields(fields)?;
        *self = next;
        Ok(self)
    }

    /// Merge every key, validator and message of another schema into this one.
    pub fn extend_schema(&mut self, other: &Schema) -> Result<&mut Self, SchemaError> {
        let fields = other
            .keys
            .iter()
            .filter_map(|k| Some((k.clone(), other.definitions.get(k)?.to_field())))
            .collect();
        let mut next = self.clone();
        next.merge_fields(fields)?;
        next.validators.extend(other.validators.iter().cloned());
        next.doc_validators.extend(other.doc_validators.iter().cloned());
        next.messages.extend(&other.messages);
        next.options.clean = other.options.clean.clone();
        *self = next;
        Ok(self)
    }

    fn merge_fields(&mut self, fields: Vec<(String, Field)>) -> Result<(), SchemaError> {
        for (key, field) in fields {
            check_key_name(&key)?;
            if let Some(option) = field
                .extra
                .keys()
                .find(|name| !self.options.allowed_extra_options.contains(name))
            {
                return Err(SchemaError::UnsupportedOption {
                    key,
                    option: option.clone(),
                });
            }
            let existing = self.definitions.remove(&key);
            if existing.is_none() {
                self.keys.push(key.clone());
            }
            let definition = self.scrub(&key, field, existing)?;
            self.definitions.insert(key, definition);
        }
        self.check_global_invariants()?;
        self.recompute_derived();
        Ok(())
    }

    /// Normalize one declaration, merged over the existing definition if any.
    fn scrub(
        &self,
        key: &str,
        field: Field,
        existing: Option<FieldDefinition>,
    ) -> Result<FieldDefinition, SchemaError> {
        let Field {
            type_group,
            type_props,
            optional,
            required,
            label,
            auto_value,
            default_value,
            extra,
        } = field;

        let (mut types, prev_optional, prev_label, prev_auto_value, prev_default, mut options) =
            match existing {
                Some(def) => {
                    let prev_auto_value = if def.auto_value_is_default {
                        None
                    } else {
                        def.auto_value
                    };
                    (
                        def.type_group,
                        Some(def.optional),
                        Some(def.label),
                        prev_auto_value,
                        def.default_value,
                        def.extra,
                    )
                }
                None => (TypeGroup::default(), None, None, None, None, Map::new()),
            };

        types.extend(&type_group);
        types.apply(&type_props);
        if types.is_empty() || types.alternatives().iter().any(|a| a.type_tag.is_none()) {
            return Err(SchemaError::MissingType {
                key: key.to_string(),
            });
        }

        let optional = if key.ends_with(".$") {
            Dynamic::Static(true)
        } else if let Some(optional) = optional {
            optional
        } else if let Some(required) = required {
            negate(required)
        } else if let Some(optional) = prev_optional {
            optional
        } else {
            Dynamic::Static(!self.options.required_by_default)
        };

        let label = label.or(prev_label).unwrap_or_else(|| {
            Dynamic::Static(
                self.options
                    .default_label
                    .clone()
                    .unwrap_or_else(|| inflected_label(key, self.options.humanize_auto_labels)),
            )
        });

        let default_value = default_value.or(prev_default);
        let mut auto_value = auto_value.or(prev_auto_value);
        let mut auto_value_is_default = false;
        if let Some(default) = &default_value {
            if key.ends_with(".$") {
                return Err(SchemaError::DefaultOnArrayItem {
                    key: key.to_string(),
                });
            }
            if auto_value.is_some() {
                warn!(key, "field has both autoValue and defaultValue; defaultValue is ignored");
            } else {
                auto_value = Some(default_auto_value(default.clone()));
                auto_value_is_default = true;
            }
        }
        options.extend(extra);

        Ok(FieldDefinition {
            type_group: types,
            optional,
            label,
            auto_value,
            auto_value_is_default,
            default_value,
            extra: options,
        })
    }

    fn check_global_invariants(&self) -> Result<(), SchemaError> {
        for key in &self.keys {
            let Some(def) = self.definitions.get(key) else {
                continue;
            };
            let parent = parent_of_key(key);
            if !parent.is_empty() && !self.definitions.contains_key(parent) {
                return Err(SchemaError::MissingParent {
                    key: key.clone(),
                    parent: parent.to_string(),
                });
            }
            if def.could_be_array() && !self.definitions.contains_key(&format!("{key}.$")) {
                return Err(SchemaError::MissingArrayItem { key: key.clone() });
            }
            for sub in def.subschemas() {
                if let Some(nested) = sub
                    .keys()
                    .iter()
                    .map(|sub_key| format!("{key}.{sub_key}"))
                    .find(|nested| self.definitions.contains_key(nested))
                {
                    return Err(SchemaError::OverlappingSubschema {
                        key: key.clone(),
                        nested,
                    });
                }
            }
        }
        Ok(())
    }

    fn recompute_derived(&mut self) {
        self.first_level_keys = self
            .keys
            .iter()
            .filter(|k| !k.contains('.'))
            .cloned()
            .collect();
        self.blackbox_keys = self
            .keys
            .iter()
            .filter(|k| self.definitions.get(*k).is_some_and(FieldDefinition::is_blackbox))
            .cloned()
            .collect();
        self.auto_values = self
            .keys
            .iter()
            .filter_map(|k| {
                Some(AutoValueEntry {
                    field_name: k.clone(),
                    func: self.definitions.get(k)?.auto_value.clone()?,
                    closest_subschema_field_name: None,
                })
            })
            .collect();
        let mut object_keys = HashMap::new();
        self.collect_object_keys("", &mut object_keys);
        self.object_keys = object_keys;
    }

    fn collect_object_keys(&self, prefix: &str, out: &mut HashMap<String, Vec<String>>) {
        for key in &self.keys {
            let full = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            if !full.ends_with(".$") {
                let (parent, last) = match full.rfind('.') {
                    Some(idx) => (&full[..idx], &full[idx + 1..]),
                    None => ("", full.as_str()),
                };
                let children = out.entry(parent.to_string()).or_default();
                if !children.iter().any(|c| c == last) {
                    children.push(last.to_string());
                }
            }
            if let Some(def) = self.definitions.get(key) {
                for sub in def.subschemas() {
                    sub.collect_object_keys(&full, out);
                }
            }
        }
    }

    // --- Queries ---

    /// Declared keys in declaration order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn first_level_keys(&self) -> &[String] {
        &self.first_level_keys
    }

    /// Child keys of a generic object key, sub-schema children included.
    /// The empty key lists the first-level keys.
    pub fn object_keys(&self, key: &str) -> &[String] {
        self.object_keys.get(key).map_or(&[], Vec::as_slice)
    }

    /// The raw definition governing a key, looking into embedded schemas.
    pub fn definition(&self, key: &str) -> Option<&FieldDefinition> {
        self.lookup_definition(&make_key_generic(key), 0)
    }

    fn lookup_definition(&self, generic_key: &str, depth: usize) -> Option<&FieldDefinition> {
        if let Some(def) = self.definitions.get(generic_key) {
            return Some(def);
        }
        if depth >= MAX_SUBSCHEMA_DEPTH {
            warn!(key = generic_key, "sub-schema nesting too deep, giving up lookup");
            return None;
        }
        for (ancestor, rest) in ancestors(generic_key) {
            if let Some(def) = self.definitions.get(ancestor) {
                for sub in def.subschemas() {
                    if let Some(found) = sub.lookup_definition(rest, depth + 1) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    /// The definition of a key with computed options evaluated.
    ///
    /// Without a context, computed options see only the key.
    pub fn get_definition(&self, key: &str, ctx: Option<&FieldContext<'_>>) -> Option<ResolvedDefinition> {
        let generic = make_key_generic(key);
        let def = self.lookup_definition(&generic, 0)?;
        let fallback = FieldContext::for_key(key, &generic);
        Some(def.resolve(key, ctx.unwrap_or(&fallback)))
    }

    /// Whether the schema allows a key, specific or generic.
    pub fn allows_key(&self, key: &str) -> bool {
        self.allows_generic_key(&make_key_generic(key))
    }

    fn allows_generic_key(&self, key: &str) -> bool {
        self.keys.iter().any(|schema_key| {
            if schema_key == key {
                return true;
            }
            let Some(rest) = key
                .strip_prefix(schema_key.as_str())
                .and_then(|r| r.strip_prefix('.'))
            else {
                return false;
            };
            let Some(def) = self.definitions.get(schema_key) else {
                return false;
            };
            if def.is_blackbox() {
                // Blackbox fields are objects, so array items below them are not allowed.
                return !rest.starts_with('$');
            }
            def.subschemas().any(|sub| sub.allows_generic_key(rest))
        })
    }

    /// Whether any proper ancestor of the key is blackbox.
    pub fn key_is_in_black_box(&self, key: &str) -> bool {
        let generic = make_key_generic(key);
        let found = ancestors(&generic).any(|(ancestor, rest)| {
            if self.blackbox_keys.contains(ancestor) {
                return true;
            }
            self.definitions
                .get(ancestor)
                .is_some_and(|def| def.subschemas().any(|sub| sub.key_is_in_black_box(rest)))
        });
        found
    }

    /// Blackbox keys, including those of embedded schemas under their full key.
    pub fn blackbox_keys(&self) -> HashSet<String> {
        let mut keys = self.blackbox_keys.clone();
        for key in &self.keys {
            if let Some(def) = self.definitions.get(key) {
                for sub in def.subschemas() {
                    keys.extend(sub.blackbox_keys().into_iter().map(|k| format!("{key}.{k}")));
                }
            }
        }
        keys
    }

    /// Auto-value functions, including those of embedded schemas.
    pub fn auto_value_functions(&self) -> Vec<AutoValueEntry> {
        let mut entries = self.auto_values.clone();
        for key in &self.keys {
            let Some(def) = self.definitions.get(key) else {
                continue;
            };
            for sub in def.subschemas() {
                entries.extend(sub.auto_value_functions().into_iter().map(|entry| {
                    AutoValueEntry {
                        field_name: format!("{key}.{}", entry.field_name),
                        closest_subschema_field_name: Some(match entry.closest_subschema_field_name {
                            Some(inner) => format!("{key}.{inner}"),
                            None => key.clone(),
                        }),
                        func: entry.func,
                    }
                }));
            }
        }
        entries
    }

    /// The label of a key, evaluated without a document.
    pub fn label(&self, key: &str) -> Option<String> {
        self.get_definition(key, None).map(|def| def.label)
    }

    /// Replace labels.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnknownKey` for a key the schema does not define;
    /// labels set before it stay set.
    pub fn labels<I, K, L>(&mut self, labels: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = (K, L)>,
        K: AsRef<str>,
        L: Into<String>,
    {
        for (key, label) in labels {
            let key = key.as_ref();
            let generic = make_key_generic(key);
            if !self.set_label(&generic, Dynamic::Static(label.into())) {
                return Err(SchemaError::UnknownKey {
                    key: key.to_string(),
                });
            }
            self.observer.on_label_changed(key);
        }
        Ok(())
    }

    fn set_label(&mut self, generic_key: &str, label: Dynamic<String>) -> bool {
        if let Some(def) = self.definitions.get_mut(generic_key) {
            def.label = label;
            return true;
        }
        for (ancestor, rest) in ancestors(generic_key) {
            let Some(def) = self.definitions.get_mut(ancestor) else {
                continue;
            };
            for alternative in def.type_group.iter_mut() {
                if let Some(TypeTag::Schema(sub)) = &mut alternative.type_tag {
                    if Arc::make_mut(sub).set_label(rest, label.clone()) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// A coarse type name for UI code: `string`, `number`, `boolean`, `date`,
    /// `object`, or one of those with an `Array` suffix.
    pub fn get_quick_type_for_key(&self, key: &str) -> Option<&'static str> {
        let quick = |tag: &TypeTag| match tag {
            TypeTag::String => Some("string"),
            TypeTag::Number | TypeTag::Integer => Some("number"),
            TypeTag::Boolean => Some("boolean"),
            TypeTag::Date => Some("date"),
            TypeTag::Object | TypeTag::Schema(_) => Some("object"),
            _ => None,
        };
        let tag = self.definition(key)?.primary_type()?;
        if !tag.is_array() {
            return quick(tag);
        }
        let item = self
            .definition(&format!("{}.$", make_key_generic(key)))?
            .primary_type()?;
        match quick(item)? {
            "string" => Some("stringArray"),
            "number" => Some("numberArray"),
            "boolean" => Some("booleanArray"),
            "date" => Some("dateArray"),
            _ => Some("objectArray"),
        }
    }

    /// Allowed values of a key; for an array, those of its items.
    pub fn get_allowed_values_for_key(&self, key: &str) -> Option<Vec<Value>> {
        let def = self.get_definition(key, None)?;
        let first = def.alternatives.first()?;
        if first.type_tag.is_array() {
            let item = self.get_definition(&format!("{}.$", make_key_generic(key)), None)?;
            return item.alternatives.first()?.allowed_values.clone();
        }
        first.allowed_values.clone()
    }

    pub fn default_value(&self, key: &str) -> Option<Value> {
        self.definition(key)?.default_value.clone()
    }

    /// The schema of an object key's children, keys relative to it.
    pub fn get_object_schema(&self, key: &str) -> Result<Schema, SchemaError> {
        let generic = make_key_generic(key);
        if let Some(def) = self.definitions.get(&generic) {
            if let Some(sub) = def.subschemas().next() {
                return Ok(Schema::clone(sub));
            }
            let prefix = format!("{generic}.");
            let children = self
                .keys
                .iter()
                .filter_map(|k| {
                    Some((
                        k.strip_prefix(&prefix)?.to_string(),
                        self.definitions.get(k)?.clone(),
                    ))
                })
                .collect();
            return self.copy_with_definitions(children);
        }
        for (ancestor, rest) in ancestors(&generic) {
            if let Some(def) = self.definitions.get(ancestor) {
                for sub in def.subschemas() {
                    if sub.definition(rest).is_some() {
                        return sub.get_object_schema(rest);
                    }
                }
            }
        }
        Err(SchemaError::UnknownKey {
            key: key.to_string(),
        })
    }

    /// A schema with only these keys and their descendants.
    pub fn pick<I, S>(&self, keys: I) -> Result<Schema, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let selected = self.select(keys)?;
        self.copy_filtered(|key| selected.iter().any(|s| key == s || is_descendant(key, s)))
    }

    /// A schema without these keys and their descendants.
    pub fn omit<I, S>(&self, keys: I) -> Result<Schema, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let selected = self.select(keys)?;
        self.copy_filtered(|key| !selected.iter().any(|s| key == s || is_descendant(key, s)))
    }

    fn select<I, S>(&self, keys: I) -> Result<Vec<String>, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        keys.into_iter()
            .map(|key| {
                let key = key.as_ref();
                if self.definitions.contains_key(key) {
                    Ok(key.to_string())
                } else {
                    Err(SchemaError::UnknownKey {
                        key: key.to_string(),
                    })
                }
            })
            .collect()
    }

    fn copy_filtered(&self, keep: impl Fn(&str) -> bool) -> Result<Schema, SchemaError> {
        let definitions = self
            .keys
            .iter()
            .filter(|k| keep(k))
            .filter_map(|k| Some((k.clone(), self.definitions.get(k)?.clone())))
            .collect();
        self.copy_with_definitions(definitions)
    }

    fn copy_with_definitions(
        &self,
        definitions: Vec<(String, FieldDefinition)>,
    ) -> Result<Schema, SchemaError> {
        let mut copy = Schema::empty(Arc::clone(&self.config), self.options.clone());
        copy.validators = self.validators.clone();
        copy.doc_validators = self.doc_validators.clone();
        copy.messages = self.messages.clone();
        copy.observer = Arc::clone(&self.observer);
        for (key, def) in definitions {
            copy.keys.push(key.clone());
            copy.definitions.insert(key, def);
        }
        copy.check_global_invariants()?;
        copy.recompute_derived();
        Ok(copy)
    }

    /// A JSON summary of every key.
    pub fn describe(&self) -> Value {
        let mut out = Map::new();
        for key in &self.keys {
            let Some(def) = self.definitions.get(key) else {
                continue;
            };
            let mut types: Vec<Value> = def.alternatives().iter().map(describe_alternative).collect();
            let mut entry = Map::new();
            entry.insert(
                "type".into(),
                if types.len() == 1 {
                    types.remove(0)
                } else {
                    json!({ "oneOf": types })
                },
            );
            entry.insert(
                "optional".into(),
                def.static_optional().map_or(Value::Null, Value::Bool),
            );
            if let Some(label) = def.label.as_static() {
                entry.insert("label".into(), Value::String(label.clone()));
            }
            if let Some(default) = &def.default_value {
                entry.insert("defaultValue".into(), default.clone());
            }
            if def.auto_value.is_some() && !def.auto_value_is_default {
                entry.insert("autoValue".into(), Value::Bool(true));
            }
            out.insert(key.clone(), Value::Object(entry));
        }
        Value::Object(out)
    }

    // --- Validators and messages ---

    /// Run for every field after its type alternative's own checks.
    pub fn add_validator<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&FieldContext<'_>) -> Verdict + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(f));
        self
    }

    /// Run once per validation, after all field checks.
    pub fn add_doc_validator<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&DocContext<'_>) -> Vec<ValidationError> + Send + Sync + 'static,
    {
        self.doc_validators.push(Arc::new(f));
        self
    }

    /// Schema validators first, then the configuration's.
    pub(crate) fn field_validators(&self) -> impl Iterator<Item = &ValidatorFn> {
        self.validators.iter().chain(self.config.validators.iter())
    }

    pub(crate) fn doc_validators(&self) -> impl Iterator<Item = &DocValidatorFn> {
        self.doc_validators.iter().chain(self.config.doc_validators.iter())
    }

    /// Override message templates for one language.
    pub fn messages<I, K, T>(&mut self, language: &str, templates: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<ErrorType>,
        T: Into<MessageTemplate>,
    {
        for (kind, template) in templates {
            self.messages.set(language, kind, template);
        }
        self
    }

    pub fn message_for_key(
        &mut self,
        language: &str,
        kind: impl Into<ErrorType>,
        key: &str,
        template: impl Into<MessageTemplate>,
    ) -> &mut Self {
        self.messages.set_for_key(language, kind, key, template);
        self
    }

    pub fn set_language(&mut self, language: &str) -> &mut Self {
        self.messages.set_language(language);
        self
    }

    pub fn message_box(&self) -> &MessageBox {
        &self.messages
    }

    /// The human-readable message for one error.
    pub fn message_for_error(&self, error: &ValidationError) -> String {
        let generic = make_key_generic(&error.name);
        let label = self
            .label(&error.name)
            .unwrap_or_else(|| inflected_label(&error.name, self.options.humanize_auto_labels));
        self.messages.render(error, &generic, &label)
    }

    // --- Validation and cleaning ---

    /// A fresh validation context over a snapshot of this schema.
    pub fn new_context(&self) -> ValidationContext {
        ValidationContext::new(Arc::new(self.clone()))
    }

    /// The context registered under `name`, created on first use. Every call
    /// with the same name shares one error list.
    pub fn named_context(&self, name: &str) -> ValidationContext {
        let mut cache = self.contexts.0.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .entry(name.to_string())
            .or_insert_with(|| ValidationContext::named(name, Arc::new(self.clone())))
            .clone()
    }

    /// Validate and fail on the first problem.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::Invalid` carrying every per-key error with its
    /// message, after the configured error transform; or the bad-input errors
    /// of validation itself.
    pub fn validate(&self, doc: &Value, options: &ValidateOptions) -> Result<(), ValidateError> {
        let cleaned;
        let doc = if options.clean {
            let clean_options = self
                .options
                .clean
                .clone()
                .modifier(options.modifier)
                .upsert(options.upsert);
            cleaned = self.clean_with(doc, &clean_options);
            &cleaned
        } else {
            doc
        };

        let errors = validator::do_validation(self, doc, options)?;
        if errors.is_empty() {
            return Ok(());
        }
        let details: Vec<ErrorDetail> = errors
            .into_iter()
            .map(|error| ErrorDetail {
                message: self.message_for_error(&error),
                error,
            })
            .collect();
        let message = details
            .first()
            .map(|detail| detail.message.clone())
            .unwrap_or_default();
        Err(self.config.transform(ValidateError::Invalid { message, details }))
    }

    /// Validate several documents, failing on the first invalid one.
    pub fn validate_all(&self, docs: &[Value], options: &ValidateOptions) -> Result<(), ValidateError> {
        docs.iter().try_for_each(|doc| self.validate(doc, options))
    }

    /// Clean a copy with the schema's default clean options.
    pub fn clean(&self, doc: &Value) -> Value {
        self.clean_with(doc, &self.options.clean)
    }

    pub fn clean_with(&self, doc: &Value, options: &CleanOptions) -> Value {
        clean::clean(self, doc, options)
    }

    pub fn clean_in_place(&self, doc: &mut Value, options: &CleanOptions) {
        clean::clean_in_place(self, doc, options);
    }

    pub fn clean_options(&self) -> &CleanOptions {
        &self.options.clean
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn config(&self) -> &Arc<SchemaConfig> {
        &self.config
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("keys", &self.keys)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn describe_alternative(alternative: &TypeAlternative) -> Value {
    let mut out = Map::new();
    if let Some(tag) = &alternative.type_tag {
        out.insert("type".into(), Value::String(tag.name().to_string()));
        if let TypeTag::Schema(sub) = tag {
            out.insert("schema".into(), sub.describe());
        }
    }
    let bound = |b: &Option<Dynamic<Bound>>| b.as_ref().and_then(Dynamic::as_static).map(Bound::to_detail);
    let count = |c: &Option<Dynamic<usize>>| c.as_ref().and_then(Dynamic::as_static).map(|n| json!(n));
    for (name, value) in [
        ("min", bound(&alternative.min)),
        ("max", bound(&alternative.max)),
        ("minCount", count(&alternative.min_count)),
        ("maxCount", count(&alternative.max_count)),
        (
            "allowedValues",
            alternative
                .allowed_values
                .as_ref()
                .and_then(Dynamic::as_static)
                .map(|values| Value::Array(values.clone())),
        ),
        (
            "regEx",
            alternative
                .reg_ex
                .as_ref()
                .and_then(Dynamic::as_static)
                .map(|patterns| json!(patterns.iter().map(|p| p.as_str()).collect::<Vec<_>>())),
        ),
        ("blackbox", alternative.blackbox.filter(|b| *b).map(Value::Bool)),
    ] {
        if let Some(value) = value {
            out.insert(name.into(), value);
        }
    }
    Value::Object(out)
}

fn negate(required: Dynamic<bool>) -> Dynamic<bool> {
    match required {
        Dynamic::Static(required) => Dynamic::Static(!required),
        Dynamic::Computed(f) => Dynamic::computed(move |ctx| !f(ctx)),
    }
}

/// Field names are dotted paths of non-empty segments; `$` may only stand
/// alone, for array items, and never first.
fn check_key_name(key: &str) -> Result<(), SchemaError> {
    let reason = if key.is_empty() {
        Some("empty key")
    } else if key.split('.').any(str::is_empty) {
        Some("empty path segment")
    } else if key.split('.').any(|s| s.starts_with('$') && s != "$") {
        Some("segments may not start with $")
    } else if key.starts_with('$') {
        Some("the first segment cannot be an array item")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(SchemaError::ReservedKey {
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Turn shorthand specs into full fields. `[T]` also declares `key.$`.
fn expand_shorthand(declaration: Vec<(String, FieldSpec)>) -> Result<Vec<(String, Field)>, SchemaError> {
    let declared: HashSet<String> = declaration.iter().map(|(k, _)| k.clone()).collect();
    let mut fields = Vec::with_capacity(declaration.len());
    for (key, spec) in declaration {
        match spec {
            FieldSpec::Type(tag) => fields.push((key, Field::new(tag))),
            FieldSpec::Pattern(pattern) => {
                fields.push((key, Field::new(TypeTag::String).reg_ex(pattern)));
            }
            FieldSpec::Field(field) => fields.push((key, field)),
            FieldSpec::ArrayOf(item) => {
                let item_key = format!("{key}.$");
                if declared.contains(&item_key) {
                    return Err(SchemaError::InvalidShorthand {
                        message: format!(
                            "array shorthand used but {item_key} is already in the schema"
                        ),
                        key,
                    });
                }
                let item = match *item {
                    FieldSpec::Type(tag) => Field::new(tag),
                    FieldSpec::Pattern(pattern) => Field::new(TypeTag::String).reg_ex(pattern),
                    FieldSpec::Field(field) => field,
                    FieldSpec::ArrayOf(_) => {
                        return Err(SchemaError::InvalidShorthand {
                            key,
                            message: "array shorthand may only be used to one level of depth".into(),
                        });
                    }
                };
                fields.push((key, Field::new(TypeTag::Array)));
                fields.push((item_key, item));
            }
        }
    }
    Ok(fields)
}
