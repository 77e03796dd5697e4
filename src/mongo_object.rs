//! Position addressing over documents and modifiers.
//!
//! [`MongoObject`] flattens a document (or an update modifier) into nodes.
//! Each node has a literal [`Position`] (operator plus exact path, real array
//! indices included) and, when it stands for a schema field, the affected key
//! and its generic form. Values can be read, written and removed by position.
//!
//! Affected keys follow update semantics:
//!
//! | position | affected key |
//! |---|---|
//! | `$set[address.city]` | `address.city` |
//! | `$set[address][city]` | `address.city` |
//! | `$push[tags]` | `tags.0` (the would-be array item) |
//! | `$push[tags][$each][1]` | `tags.1` |
//! | `$push[tags][$slice]` | none |

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};

use crate::ejson;
use crate::keys::{is_descendant, make_key_generic};

/// Operators that remove or move values rather than creating them.
const NON_CREATING_OPERATORS: &[&str] = &["$unset", "$pull", "$pullAll", "$pop", "$rename"];

/// Whether a value is shaped like an update modifier: an object with at least
/// one top-level key starting with `$`.
pub fn looks_like_modifier(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.keys().any(|k| k.starts_with('$')))
        && !ejson::is_date(value)
        && !ejson::is_binary(value)
}

/// Whether a value is a `{$each: [...]}` wrapper.
pub fn is_each_wrapper(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|map| map.get("$each"))
        .is_some_and(Value::is_array)
}

fn is_push_operator(op: &str) -> bool {
    op == "$push" || op == "$addToSet"
}

/// A literal address inside one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Position(Vec<String>);

impl Position {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse the bracket form `op[a][0][b]`.
    pub fn parse(s: &str) -> Self {
        let mut segments = Vec::new();
        let (head, rest) = match s.find('[') {
            Some(idx) => (&s[..idx], &s[idx..]),
            None => (s, ""),
        };
        if !head.is_empty() {
            segments.push(head.to_string());
        }
        for part in rest.split('[').skip(1) {
            segments.push(part.trim_end_matches(']').to_string());
        }
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The leading operator segment, if any.
    pub fn operator(&self) -> Option<&str> {
        self.0.first().map(String::as_str).filter(|s| s.starts_with('$'))
    }

    pub fn starts_with(&self, other: &Position) -> bool {
        self.0.starts_with(&other.0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.iter();
        if let Some(first) = iter.next() {
            f.write_str(first)?;
        }
        for segment in iter {
            write!(f, "[{segment}]")?;
        }
        Ok(())
    }
}

/// One flattened node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub position: Position,
    /// Specific key the node stands for; `None` for operator and wrapper nodes.
    pub key: Option<String>,
    pub generic_key: Option<String>,
    pub operator: Option<String>,
    pub is_array_item: bool,
}

/// A place a field occupies, or would occupy, in a document.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionInfo {
    pub position: Position,
    pub key: String,
    /// `None` for a would-be position that holds nothing yet.
    pub value: Option<Value>,
    pub operator: Option<String>,
}

/// What a document says about one key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldInfo {
    pub is_set: bool,
    pub value: Option<Value>,
    pub operator: Option<String>,
}

/// Addressable view over a document or modifier.
#[derive(Debug, Clone)]
pub struct MongoObject {
    doc: Value,
    is_modifier: bool,
    blackbox_keys: HashSet<String>,
    nodes: Vec<Node>,
    pending_removals: Vec<Position>,
}

impl MongoObject {
    /// Build a view. Nothing below a blackbox key is flattened.
    pub fn new(doc: Value, blackbox_keys: HashSet<String>) -> Self {
        let is_modifier = looks_like_modifier(&doc);
        Self::with_mode(doc, blackbox_keys, is_modifier)
    }

    pub fn with_mode(doc: Value, blackbox_keys: HashSet<String>, is_modifier: bool) -> Self {
        let mut object = Self {
            doc,
            is_modifier,
            blackbox_keys,
            nodes: Vec::new(),
            pending_removals: Vec::new(),
        };
        object.reparse();
        object
    }

    pub fn is_modifier(&self) -> bool {
        self.is_modifier
    }

    pub fn get_object(&self) -> &Value {
        &self.doc
    }

    pub fn into_inner(mut self) -> Value {
        self.remove_array_items();
        self.doc
    }

    /// Flattened nodes in document order, parents before children.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get_value_for_position(&self, position: &Position) -> Option<&Value> {
        let mut current = &self.doc;
        for segment in position.segments() {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write a value, creating intermediate objects as needed.
    pub fn set_value_for_position(&mut self, position: &Position, value: Value) {
        if position.is_root() {
            self.doc = value;
            self.reparse();
            return;
        }
        self.pending_removals.retain(|p| p != position);

        let mut current = &mut self.doc;
        for segment in position.segments() {
            let index = match current {
                Value::Array(_) => segment.parse::<usize>().ok(),
                _ => None,
            };
            if index.is_none() && !ejson::is_plain_object(current) {
                *current = Value::Object(Map::new());
            }
            current = match (current, index) {
                (Value::Array(items), Some(idx)) => {
                    while items.len() <= idx {
                        items.push(Value::Null);
                    }
                    &mut items[idx]
                }
                (Value::Object(map), _) => map.entry(segment.clone()).or_insert(Value::Null),
                _ => return,
            };
        }
        *current = value;
        self.reparse();
    }

    /// Remove a value. Array items are only marked here and compacted by
    /// [`MongoObject::remove_array_items`] so that sibling positions stay valid.
    pub fn remove_value_for_position(&mut self, position: &Position) {
        let Some(parent) = position.parent() else {
            self.doc = Value::Object(Map::new());
            self.reparse();
            return;
        };
        let Some(last) = position.last() else {
            return;
        };
        let parent_is_array = match self.get_value_for_position(&parent) {
            Some(Value::Array(_)) => true,
            Some(Value::Object(_)) => false,
            _ => return,
        };
        if parent_is_array {
            if !self.pending_removals.contains(position) {
                self.pending_removals.push(position.clone());
            }
        } else if let Some(Value::Object(map)) = self.value_mut(&parent) {
            map.shift_remove(last);
        }
        self.reparse();
    }

    /// Compact every array item marked for removal.
    pub fn remove_array_items(&mut self) {
        if self.pending_removals.is_empty() {
            return;
        }
        let mut pending = std::mem::take(&mut self.pending_removals);
        // Deeper positions first, then higher indices first, so no removal
        // shifts a position that is still waiting.
        pending.sort_by(|a, b| {
            b.len().cmp(&a.len()).then_with(|| {
                let ai = a.last().and_then(|s| s.parse::<usize>().ok());
                let bi = b.last().and_then(|s| s.parse::<usize>().ok());
                a.parent().cmp(&b.parent()).then(bi.cmp(&ai))
            })
        });
        for position in pending {
            let (Some(parent), Some(idx)) = (
                position.parent(),
                position.last().and_then(|s| s.parse::<usize>().ok()),
            ) else {
                continue;
            };
            if let Some(Value::Array(items)) = self.value_mut(&parent) {
                if idx < items.len() {
                    items.remove(idx);
                }
            }
        }
        self.reparse();
    }

    /// Whether a position is marked for removal, directly or through an ancestor.
    pub fn is_removed(&self, position: &Position) -> bool {
        self.pending_removals.iter().any(|p| position.starts_with(p))
    }

    /// Every node whose generic key equals `generic_key`.
    pub fn positions_info_for_generic_key(&self, generic_key: &str) -> Vec<PositionInfo> {
        self.nodes
            .iter()
            .filter(|node| node.generic_key.as_deref() == Some(generic_key))
            .filter_map(|node| {
                Some(PositionInfo {
                    position: node.position.clone(),
                    key: node.key.clone()?,
                    value: self.get_value_for_position(&node.position).cloned(),
                    operator: node.operator.clone(),
                })
            })
            .collect()
    }

    /// Keys that an update will create implicitly because a descendant of
    /// `generic_key` is written directly under an operator
    /// (`$set: {"a.b": 1}` creates `a`). Empty for plain documents.
    pub fn positions_that_create_generic_key(&self, generic_key: &str) -> Vec<PositionInfo> {
        if !self.is_modifier {
            return Vec::new();
        }
        let depth = generic_key.split('.').count();
        let mut found: Vec<PositionInfo> = Vec::new();
        for node in &self.nodes {
            let (Some(op), Some(key), Some(generic)) = (
                node.operator.as_deref(),
                node.key.as_deref(),
                node.generic_key.as_deref(),
            ) else {
                continue;
            };
            if node.position.len() != 2 || NON_CREATING_OPERATORS.contains(&op) {
                continue;
            }
            if !is_descendant(generic, generic_key) {
                continue;
            }
            let created: Vec<&str> = key.split('.').take(depth).collect();
            let created = created.join(".");
            if found.iter().any(|info| info.key == created) {
                continue;
            }
            found.push(PositionInfo {
                position: Position::new([op, created.as_str()]),
                key: created,
                value: None,
                operator: Some(op.to_string()),
            });
        }
        found
    }

    /// Find the value a key has in the document, looking inside every
    /// operator of a modifier.
    pub fn get_info_for_key(&self, key: &str) -> FieldInfo {
        if key.is_empty() {
            return FieldInfo::default();
        }
        if !self.is_modifier {
            let value = navigate(&self.doc, key).cloned();
            return FieldInfo {
                is_set: value.is_some(),
                value,
                operator: None,
            };
        }

        let Some(ops) = self.doc.as_object() else {
            return FieldInfo::default();
        };
        for (op, payload) in ops {
            let Some(payload) = payload.as_object() else {
                continue;
            };
            for (field, value) in payload {
                let found = if field == key {
                    Some(value)
                } else if is_descendant(key, field) {
                    navigate(value, &key[field.len() + 1..])
                } else {
                    None
                };
                if let Some(value) = found {
                    return FieldInfo {
                        is_set: true,
                        value: Some(value.clone()),
                        operator: Some(op.clone()),
                    };
                }
            }
        }
        FieldInfo::default()
    }

    fn value_mut(&mut self, position: &Position) -> Option<&mut Value> {
        let mut current = &mut self.doc;
        for segment in position.segments() {
            current = match current {
                Value::Object(map) => map.get_mut(segment)?,
                Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn reparse(&mut self) {
        let mut nodes = Vec::new();
        self.walk(&self.doc, &Position::default(), false, &mut nodes);
        self.nodes = nodes;
    }

    fn walk(&self, value: &Value, position: &Position, is_array_item: bool, out: &mut Vec<Node>) {
        if self.is_removed(position) && !position.is_root() {
            return;
        }
        let mut generic_key = None;
        if !position.is_root() {
            let key = self.affected_key(position);
            generic_key = key.as_deref().map(make_key_generic);
            let operator = if self.is_modifier {
                position.operator().map(str::to_string)
            } else {
                None
            };
            out.push(Node {
                position: position.clone(),
                key,
                generic_key: generic_key.clone(),
                operator,
                is_array_item,
            });
        }

        if ejson::is_date(value) || ejson::is_binary(value) {
            return;
        }
        if generic_key
            .as_ref()
            .is_some_and(|g| self.blackbox_keys.contains(g))
        {
            return;
        }
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    self.walk(v, &position.child(k.as_str()), false, out);
                }
            }
            Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    self.walk(v, &position.child(i.to_string()), true, out);
                }
            }
            _ => {}
        }
    }

    fn affected_key(&self, position: &Position) -> Option<String> {
        let segments = position.segments();
        let (op, path) = if self.is_modifier {
            (segments.first().map(String::as_str), &segments[1..])
        } else {
            (None, segments)
        };
        let first = path.first()?;

        let parts: Vec<&str> = match op {
            Some(op) if is_push_operator(op) => {
                let pushed = self.get_value_for_position(&Position::new([op, first.as_str()]));
                if pushed.is_some_and(is_each_wrapper) {
                    if path.len() < 3 || path[1] != "$each" {
                        return None;
                    }
                    std::iter::once(first.as_str())
                        .chain(path[2..].iter().map(String::as_str))
                        .collect()
                } else {
                    std::iter::once(first.as_str())
                        .chain(std::iter::once("0"))
                        .chain(path[1..].iter().map(String::as_str))
                        .collect()
                }
            }
            _ => path.iter().map(String::as_str).collect(),
        };

        if parts.iter().any(|p| p.starts_with('$')) {
            return None;
        }
        Some(parts.join("."))
    }
}

/// Follow a dotted path through objects and arrays.
pub fn navigate<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys_of(object: &MongoObject) -> Vec<String> {
        object.nodes().iter().filter_map(|n| n.key.clone()).collect()
    }

    #[test]
    fn detects_modifiers() {
        assert!(looks_like_modifier(&json!({ "$set": { "a": 1 } })));
        assert!(!looks_like_modifier(&json!({ "a": 1 })));
        assert!(!looks_like_modifier(&json!({ "$date": 0 })));
        assert!(!looks_like_modifier(&json!([1])));
    }

    #[test]
    fn position_parse_and_display() {
        let position = Position::parse("$set[a.b][0][c]");
        assert_eq!(position.segments(), ["$set", "a.b", "0", "c"]);
        assert_eq!(position.to_string(), "$set[a.b][0][c]");
        assert_eq!(position.operator(), Some("$set"));
        assert_eq!(Position::parse("name").segments(), ["name"]);
    }

    #[test]
    fn flattens_plain_documents() {
        let object = MongoObject::new(
            json!({ "name": "x", "tags": ["a", "b"], "addr": { "city": "y" } }),
            HashSet::new(),
        );
        assert_eq!(
            keys_of(&object),
            vec!["name", "tags", "tags.0", "tags.1", "addr", "addr.city"]
        );
        let tags: Vec<_> = object.positions_info_for_generic_key("tags.$");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].position, Position::parse("tags[1]"));
    }

    #[test]
    fn flattens_modifiers() {
        let object = MongoObject::new(
            json!({
                "$set": { "a.b": 1, "c": { "d": 2 } },
                "$push": { "list": { "x": 1 }, "many": { "$each": [1, 2], "$slice": -5 } }
            }),
            HashSet::new(),
        );
        assert_eq!(
            keys_of(&object),
            vec!["a.b", "c", "c.d", "list.0", "list.0.x", "many.0", "many.1"]
        );
    }

    #[test]
    fn blackbox_and_wrappers_are_not_descended() {
        let blackbox: HashSet<String> = ["meta".to_string()].into();
        let object = MongoObject::new(
            json!({ "meta": { "x": { "y": 1 } }, "at": { "$date": 0 } }),
            blackbox,
        );
        assert_eq!(keys_of(&object), vec!["meta", "at"]);
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut object = MongoObject::new(json!({}), HashSet::new());
        object.set_value_for_position(&Position::parse("a[b][c]"), json!(1));
        assert_eq!(object.get_object(), &json!({ "a": { "b": { "c": 1 } } }));
        assert_eq!(object.get_info_for_key("a.b.c").value, Some(json!(1)));
    }

    #[test]
    fn array_removals_are_deferred() {
        let mut object = MongoObject::new(json!({ "a": [1, 2, 3] }), HashSet::new());
        object.remove_value_for_position(&Position::parse("a[0]"));
        object.remove_value_for_position(&Position::parse("a[2]"));
        assert_eq!(object.get_value_for_position(&Position::parse("a[1]")), Some(&json!(2)));
        assert_eq!(keys_of(&object), vec!["a", "a.1"]);
        assert_eq!(object.into_inner(), json!({ "a": [2] }));
    }

    #[test]
    fn info_for_key_searches_operators() {
        let object = MongoObject::new(
            json!({ "$set": { "profile": { "name": "x" } }, "$inc": { "count": 1 } }),
            HashSet::new(),
        );
        let info = object.get_info_for_key("profile.name");
        assert!(info.is_set);
        assert_eq!(info.operator.as_deref(), Some("$set"));
        assert_eq!(object.get_info_for_key("count").value, Some(json!(1)));
        assert!(!object.get_info_for_key("missing").is_set);
    }

    #[test]
    fn positions_that_create_parents() {
        let object = MongoObject::new(
            json!({ "$set": { "items.2.name": "x" }, "$unset": { "other.a": "" } }),
            HashSet::new(),
        );
        let created = object.positions_that_create_generic_key("items.$");
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].key, "items.2");
        assert!(object.positions_that_create_generic_key("other").is_empty());
    }
}
