//! Field definitions.
//!
//! A schema is declared as a list of `(key, FieldSpec)` pairs. A [`FieldSpec`]
//! is either shorthand (a bare type, an array-of-type, a pattern) or a full
//! [`Field`]. During schema construction every spec is normalized into a
//! [`FieldDefinition`]: one or more [`TypeAlternative`]s plus the non-type
//! options. Options that may depend on the document are [`Dynamic`] and are
//! evaluated into a [`ResolvedDefinition`] for each validation lookup.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};

use crate::ejson;
use crate::hooks::{AutoValueContext, AutoValue, AutoValueFn, FieldContext, InstanceTest, ValidatorFn, Verdict};
use crate::schema::Schema;

/// An option value that is either fixed or computed per lookup.
pub enum Dynamic<T> {
    Static(T),
    Computed(Arc<dyn Fn(&FieldContext<'_>) -> T + Send + Sync>),
}

impl<T: Clone> Dynamic<T> {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> T + Send + Sync + 'static,
    {
        Dynamic::Computed(Arc::new(f))
    }

    pub fn resolve(&self, ctx: &FieldContext<'_>) -> T {
        match self {
            Dynamic::Static(value) => value.clone(),
            Dynamic::Computed(f) => f(ctx),
        }
    }

    pub fn as_static(&self) -> Option<&T> {
        match self {
            Dynamic::Static(value) => Some(value),
            Dynamic::Computed(_) => None,
        }
    }
}

impl<T: Clone> Clone for Dynamic<T> {
    fn clone(&self) -> Self {
        match self {
            Dynamic::Static(value) => Dynamic::Static(value.clone()),
            Dynamic::Computed(f) => Dynamic::Computed(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Dynamic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Static(value) => value.fmt(f),
            Dynamic::Computed(_) => f.write_str("<computed>"),
        }
    }
}

impl<T> From<T> for Dynamic<T> {
    fn from(value: T) -> Self {
        Dynamic::Static(value)
    }
}

/// The type a field value must have.
#[derive(Clone)]
pub enum TypeTag {
    String,
    Number,
    Integer,
    Boolean,
    Date,
    Object,
    Array,
    Binary,
    Any,
    /// A plain object validated against an embedded schema.
    Schema(Arc<Schema>),
    /// A caller-defined class of values.
    Custom { name: String, test: InstanceTest },
}

impl TypeTag {
    pub fn schema(schema: Schema) -> Self {
        TypeTag::Schema(Arc::new(schema))
    }

    pub fn custom<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        TypeTag::Custom {
            name: name.into(),
            test: Arc::new(test),
        }
    }

    /// Name used for the `dataType` of type errors.
    pub fn name(&self) -> &str {
        match self {
            TypeTag::String => "String",
            TypeTag::Number => "Number",
            TypeTag::Integer => "Integer",
            TypeTag::Boolean => "Boolean",
            TypeTag::Date => "Date",
            TypeTag::Object | TypeTag::Schema(_) => "Object",
            TypeTag::Array => "Array",
            TypeTag::Binary => "Binary",
            TypeTag::Any => "Any",
            TypeTag::Custom { name, .. } => name,
        }
    }

    pub fn as_schema(&self) -> Option<&Arc<Schema>> {
        match self {
            TypeTag::Schema(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeTag::Array)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeTag::Number | TypeTag::Integer)
    }

    /// Whether values of this type are plain objects with child keys.
    pub fn is_object_like(&self) -> bool {
        matches!(self, TypeTag::Object | TypeTag::Schema(_))
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Schema(schema) => write!(f, "Schema({:?})", schema.keys()),
            other => f.write_str(other.name()),
        }
    }
}

/// A numeric or date bound for `min`/`max`.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Number(f64),
    Date(DateTime<Utc>),
}

impl Bound {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Bound::Number(n) => Some(*n),
            Bound::Date(_) => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Bound::Date(d) => Some(d),
            Bound::Number(_) => None,
        }
    }

    /// The bound as it appears in error details and messages.
    pub fn to_detail(&self) -> Value {
        match self {
            Bound::Number(n) => number_value(*n),
            Bound::Date(d) => Value::String(ejson::format_day(d)),
        }
    }
}

/// Integral floats become JSON integers so `5.0` renders as `5`.
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<f64> for Bound {
    fn from(n: f64) -> Self {
        Bound::Number(n)
    }
}

impl From<i64> for Bound {
    fn from(n: i64) -> Self {
        Bound::Number(n as f64)
    }
}

impl From<i32> for Bound {
    fn from(n: i32) -> Self {
        Bound::Number(f64::from(n))
    }
}

impl From<u32> for Bound {
    fn from(n: u32) -> Self {
        Bound::Number(f64::from(n))
    }
}

impl From<DateTime<Utc>> for Bound {
    fn from(d: DateTime<Utc>) -> Self {
        Bound::Date(d)
    }
}

/// One allowed type for a field together with its type-specific constraints.
///
/// A field with several alternatives accepts a value when any alternative
/// accepts it.
#[derive(Clone, Default)]
pub struct TypeAlternative {
    /// `None` only in extension fragments that adjust constraints.
    pub type_tag: Option<TypeTag>,
    pub min: Option<Dynamic<Bound>>,
    pub max: Option<Dynamic<Bound>>,
    pub exclusive_min: Option<Dynamic<bool>>,
    pub exclusive_max: Option<Dynamic<bool>>,
    pub min_count: Option<Dynamic<usize>>,
    pub max_count: Option<Dynamic<usize>>,
    pub allowed_values: Option<Dynamic<Vec<Value>>>,
    pub reg_ex: Option<Dynamic<Vec<Regex>>>,
    pub skip_reg_ex_check_for_empty_strings: Option<Dynamic<bool>>,
    pub trim: Option<Dynamic<bool>>,
    pub blackbox: Option<bool>,
    pub custom: Option<ValidatorFn>,
}

macro_rules! overlay {
    ($target:ident, $source:ident, $($field:ident),+) => {
        $(
            if $source.$field.is_some() {
                $target.$field = $source.$field.clone();
            }
        )+
    };
}

impl TypeAlternative {
    pub fn new(type_tag: TypeTag) -> Self {
        Self {
            type_tag: Some(type_tag),
            ..Self::default()
        }
    }

    pub fn min(mut self, bound: impl Into<Bound>) -> Self {
        self.min = Some(Dynamic::Static(bound.into()));
        self
    }

    pub fn max(mut self, bound: impl Into<Bound>) -> Self {
        self.max = Some(Dynamic::Static(bound.into()));
        self
    }

    pub fn exclusive_min(mut self, exclusive: bool) -> Self {
        self.exclusive_min = Some(Dynamic::Static(exclusive));
        self
    }

    pub fn exclusive_max(mut self, exclusive: bool) -> Self {
        self.exclusive_max = Some(Dynamic::Static(exclusive));
        self
    }

    pub fn min_count(mut self, count: usize) -> Self {
        self.min_count = Some(Dynamic::Static(count));
        self
    }

    pub fn max_count(mut self, count: usize) -> Self {
        self.max_count = Some(Dynamic::Static(count));
        self
    }

    pub fn allowed_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed_values = Some(Dynamic::Static(values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn reg_ex(mut self, pattern: Regex) -> Self {
        self.reg_ex = Some(Dynamic::Static(vec![pattern]));
        self
    }

    pub fn custom<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> Verdict + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(f));
        self
    }

    /// Overwrite every option `other` sets.
    pub fn merge(&mut self, other: &TypeAlternative) {
        overlay!(
            self,
            other,
            type_tag,
            min,
            max,
            exclusive_min,
            exclusive_max,
            min_count,
            max_count,
            allowed_values,
            reg_ex,
            skip_reg_ex_check_for_empty_strings,
            trim,
            blackbox,
            custom
        );
    }

    /// Evaluate computed options for one lookup.
    pub fn resolve(&self, ctx: &FieldContext<'_>) -> Option<ResolvedAlternative> {
        Some(ResolvedAlternative {
            type_tag: self.type_tag.clone()?,
            min: self.min.as_ref().map(|d| d.resolve(ctx)),
            max: self.max.as_ref().map(|d| d.resolve(ctx)),
            exclusive_min: self.exclusive_min.as_ref().is_some_and(|d| d.resolve(ctx)),
            exclusive_max: self.exclusive_max.as_ref().is_some_and(|d| d.resolve(ctx)),
            min_count: self.min_count.as_ref().map(|d| d.resolve(ctx)),
            max_count: self.max_count.as_ref().map(|d| d.resolve(ctx)),
            allowed_values: self.allowed_values.as_ref().map(|d| d.resolve(ctx)),
            reg_ex: self
                .reg_ex
                .as_ref()
                .map(|d| d.resolve(ctx))
                .unwrap_or_default(),
            skip_reg_ex_check_for_empty_strings: self
                .skip_reg_ex_check_for_empty_strings
                .as_ref()
                .is_some_and(|d| d.resolve(ctx)),
            trim: self.trim.as_ref().map_or(true, |d| d.resolve(ctx)),
            blackbox: self.blackbox.unwrap_or(false),
            custom: self.custom.clone(),
        })
    }
}

impl fmt::Debug for TypeAlternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeAlternative")
            .field("type_tag", &self.type_tag)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("min_count", &self.min_count)
            .field("max_count", &self.max_count)
            .field("allowed_values", &self.allowed_values)
            .field("blackbox", &self.blackbox)
            .finish_non_exhaustive()
    }
}

/// Ordered alternatives of a field.
#[derive(Debug, Clone, Default)]
pub struct TypeGroup(Vec<TypeAlternative>);

impl TypeGroup {
    pub fn one_of<I, A>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<TypeAlternative>,
    {
        Self(alternatives.into_iter().map(Into::into).collect())
    }

    pub fn alternatives(&self) -> &[TypeAlternative] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` position by position; surplus alternatives are appended.
    pub fn extend(&mut self, other: &TypeGroup) {
        for (i, alternative) in other.0.iter().enumerate() {
            match self.0.get_mut(i) {
                Some(existing) => existing.merge(alternative),
                None => self.0.push(alternative.clone()),
            }
        }
    }

    /// Apply field-level constraints to every alternative.
    pub fn apply(&mut self, props: &TypeAlternative) {
        for alternative in &mut self.0 {
            let type_tag = alternative.type_tag.clone();
            alternative.merge(props);
            if props.type_tag.is_none() {
                alternative.type_tag = type_tag;
            }
        }
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, TypeAlternative> {
        self.0.iter_mut()
    }
}

impl From<TypeTag> for TypeAlternative {
    fn from(tag: TypeTag) -> Self {
        TypeAlternative::new(tag)
    }
}

impl From<TypeTag> for TypeGroup {
    fn from(tag: TypeTag) -> Self {
        Self(vec![TypeAlternative::new(tag)])
    }
}

impl From<TypeAlternative> for TypeGroup {
    fn from(alternative: TypeAlternative) -> Self {
        Self(vec![alternative])
    }
}

/// A full field declaration.
///
/// ```
/// use doc_schema::{Field, TypeTag};
///
/// let age = Field::new(TypeTag::Integer).min(0).max(150).optional(true);
/// let label = Field::new(TypeTag::String).label("Display name").trim(false);
/// # let _ = (age, label);
/// ```
#[derive(Clone, Default)]
pub struct Field {
    pub(crate) type_group: TypeGroup,
    /// Constraints given at field level; they apply to every alternative.
    pub(crate) type_props: TypeAlternative,
    pub(crate) optional: Option<Dynamic<bool>>,
    pub(crate) required: Option<Dynamic<bool>>,
    pub(crate) label: Option<Dynamic<String>>,
    pub(crate) auto_value: Option<AutoValueFn>,
    pub(crate) default_value: Option<Value>,
    pub(crate) extra: Map<String, Value>,
}

impl Field {
    pub fn new(types: impl Into<TypeGroup>) -> Self {
        Self {
            type_group: types.into(),
            ..Self::default()
        }
    }

    /// A field accepting any of several types.
    pub fn one_of<I, A>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<TypeAlternative>,
    {
        Self::new(TypeGroup::one_of(alternatives))
    }

    /// A declaration without a type, used to adjust an existing key via `extend`.
    pub fn patch() -> Self {
        Self::default()
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = Some(Dynamic::Static(optional));
        self
    }

    pub fn optional_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.optional = Some(Dynamic::computed(f));
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(Dynamic::Static(required));
        self
    }

    pub fn required_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.required = Some(Dynamic::computed(f));
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(Dynamic::Static(label.into()));
        self
    }

    pub fn label_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> String + Send + Sync + 'static,
    {
        self.label = Some(Dynamic::computed(f));
        self
    }

    pub fn min(mut self, bound: impl Into<Bound>) -> Self {
        self.type_props.min = Some(Dynamic::Static(bound.into()));
        self
    }

    pub fn min_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> Bound + Send + Sync + 'static,
    {
        self.type_props.min = Some(Dynamic::computed(f));
        self
    }

    pub fn max(mut self, bound: impl Into<Bound>) -> Self {
        self.type_props.max = Some(Dynamic::Static(bound.into()));
        self
    }

    pub fn max_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> Bound + Send + Sync + 'static,
    {
        self.type_props.max = Some(Dynamic::computed(f));
        self
    }

    pub fn exclusive_min(mut self, exclusive: bool) -> Self {
        self.type_props.exclusive_min = Some(Dynamic::Static(exclusive));
        self
    }

    pub fn exclusive_max(mut self, exclusive: bool) -> Self {
        self.type_props.exclusive_max = Some(Dynamic::Static(exclusive));
        self
    }

    pub fn min_count(mut self, count: usize) -> Self {
        self.type_props.min_count = Some(Dynamic::Static(count));
        self
    }

    pub fn min_count_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> usize + Send + Sync + 'static,
    {
        self.type_props.min_count = Some(Dynamic::computed(f));
        self
    }

    pub fn max_count(mut self, count: usize) -> Self {
        self.type_props.max_count = Some(Dynamic::Static(count));
        self
    }

    pub fn max_count_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> usize + Send + Sync + 'static,
    {
        self.type_props.max_count = Some(Dynamic::computed(f));
        self
    }

    pub fn allowed_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.type_props.allowed_values =
            Some(Dynamic::Static(values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn allowed_values_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> Vec<Value> + Send + Sync + 'static,
    {
        self.type_props.allowed_values = Some(Dynamic::computed(f));
        self
    }

    pub fn reg_ex(self, pattern: Regex) -> Self {
        self.reg_exes(vec![pattern])
    }

    /// Every pattern must match.
    pub fn reg_exes(mut self, patterns: Vec<Regex>) -> Self {
        self.type_props.reg_ex = Some(Dynamic::Static(patterns));
        self
    }

    pub fn skip_reg_ex_check_for_empty_strings(mut self, skip: bool) -> Self {
        self.type_props.skip_reg_ex_check_for_empty_strings = Some(Dynamic::Static(skip));
        self
    }

    pub fn trim(mut self, trim: bool) -> Self {
        self.type_props.trim = Some(Dynamic::Static(trim));
        self
    }

    pub fn blackbox(mut self, blackbox: bool) -> Self {
        self.type_props.blackbox = Some(blackbox);
        self
    }

    pub fn custom<F>(mut self, f: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> Verdict + Send + Sync + 'static,
    {
        self.type_props.custom = Some(Arc::new(f));
        self
    }

    pub fn auto_value<F>(mut self, f: F) -> Self
    where
        F: Fn(&AutoValueContext<'_>) -> AutoValue + Send + Sync + 'static,
    {
        self.auto_value = Some(Arc::new(f));
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// A non-standard option; the schema must list it as allowed.
    pub fn option(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }
}

/// What a key is declared as.
#[derive(Clone)]
pub enum FieldSpec {
    Type(TypeTag),
    /// `[T]` shorthand: an Array field plus a `key.$` item field.
    ArrayOf(Box<FieldSpec>),
    /// A string field that must match the pattern.
    Pattern(Regex),
    Field(Field),
}

impl FieldSpec {
    pub fn array_of(item: impl Into<FieldSpec>) -> Self {
        FieldSpec::ArrayOf(Box::new(item.into()))
    }
}

impl From<TypeTag> for FieldSpec {
    fn from(tag: TypeTag) -> Self {
        FieldSpec::Type(tag)
    }
}

impl From<Field> for FieldSpec {
    fn from(field: Field) -> Self {
        FieldSpec::Field(field)
    }
}

impl From<Regex> for FieldSpec {
    fn from(pattern: Regex) -> Self {
        FieldSpec::Pattern(pattern)
    }
}

impl From<Schema> for FieldSpec {
    fn from(schema: Schema) -> Self {
        FieldSpec::Type(TypeTag::schema(schema))
    }
}

/// A normalized definition as stored in a schema.
#[derive(Clone)]
pub struct FieldDefinition {
    pub(crate) type_group: TypeGroup,
    pub(crate) optional: Dynamic<bool>,
    pub(crate) label: Dynamic<String>,
    pub(crate) auto_value: Option<AutoValueFn>,
    /// The auto-value was derived from `default_value`.
    pub(crate) auto_value_is_default: bool,
    pub(crate) default_value: Option<Value>,
    pub(crate) extra: Map<String, Value>,
}

impl FieldDefinition {
    pub fn alternatives(&self) -> &[TypeAlternative] {
        self.type_group.alternatives()
    }

    /// The first alternative's type.
    pub fn primary_type(&self) -> Option<&TypeTag> {
        self.alternatives().first().and_then(|a| a.type_tag.as_ref())
    }

    pub fn type_tags(&self) -> impl Iterator<Item = &TypeTag> {
        self.alternatives().iter().filter_map(|a| a.type_tag.as_ref())
    }

    pub fn is_blackbox(&self) -> bool {
        self.alternatives().iter().any(|a| a.blackbox == Some(true))
    }

    pub fn could_be_array(&self) -> bool {
        self.type_tags().any(TypeTag::is_array)
    }

    /// Embedded schemas of any alternative.
    pub fn subschemas(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.type_tags().filter_map(TypeTag::as_schema)
    }

    /// `Some` when optionality does not depend on the document.
    pub fn static_optional(&self) -> Option<bool> {
        self.optional.as_static().copied()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    pub fn has_auto_value(&self) -> bool {
        self.auto_value.is_some()
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    pub fn resolve(&self, key: &str, ctx: &FieldContext<'_>) -> ResolvedDefinition {
        ResolvedDefinition {
            key: key.to_string(),
            optional: self.optional.resolve(ctx),
            label: self.label.resolve(ctx),
            alternatives: self
                .alternatives()
                .iter()
                .filter_map(|a| a.resolve(ctx))
                .collect(),
            default_value: self.default_value.clone(),
        }
    }

    /// Turn the stored definition back into a declaration for re-processing.
    pub(crate) fn to_field(&self) -> Field {
        Field {
            type_group: self.type_group.clone(),
            type_props: TypeAlternative::default(),
            optional: Some(self.optional.clone()),
            required: None,
            label: Some(self.label.clone()),
            auto_value: if self.auto_value_is_default {
                None
            } else {
                self.auto_value.clone()
            },
            default_value: self.default_value.clone(),
            extra: self.extra.clone(),
        }
    }
}

impl fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("types", &self.type_group)
            .field("optional", &self.optional)
            .field("label", &self.label)
            .field("default_value", &self.default_value)
            .finish_non_exhaustive()
    }
}

/// A definition with every computed option evaluated.
#[derive(Debug, Clone)]
pub struct ResolvedDefinition {
    pub key: String,
    pub optional: bool,
    pub label: String,
    pub alternatives: Vec<ResolvedAlternative>,
    pub default_value: Option<Value>,
}

impl ResolvedDefinition {
    pub fn is_blackbox(&self) -> bool {
        self.alternatives.iter().any(|a| a.blackbox)
    }
}

/// A type alternative with every computed option evaluated.
#[derive(Clone)]
pub struct ResolvedAlternative {
    pub type_tag: TypeTag,
    pub min: Option<Bound>,
    pub max: Option<Bound>,
    pub exclusive_min: bool,
    pub exclusive_max: bool,
    pub min_count: Option<usize>,
    pub max_count: Option<usize>,
    pub allowed_values: Option<Vec<Value>>,
    pub reg_ex: Vec<Regex>,
    pub skip_reg_ex_check_for_empty_strings: bool,
    pub trim: bool,
    pub blackbox: bool,
    pub custom: Option<ValidatorFn>,
}

impl fmt::Debug for ResolvedAlternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedAlternative")
            .field("type_tag", &self.type_tag)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("min_count", &self.min_count)
            .field("max_count", &self.max_count)
            .field("allowed_values", &self.allowed_values)
            .field("blackbox", &self.blackbox)
            .finish_non_exhaustive()
    }
}
