//! Helpers for dotted keys.
//!
//! A *specific* key names one place in one document (`emails.1.address`).
//! The matching *generic* key replaces every array index with `$`
//! (`emails.$.address`) and is what schema definitions are declared under.

/// Whether a key segment is an array index.
pub fn is_array_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Replace every numeric segment after the first with `$`.
pub fn make_key_generic(key: &str) -> String {
    key.split('.')
        .enumerate()
        .map(|(i, part)| if i > 0 && is_array_index(part) { "$" } else { part })
        .collect::<Vec<_>>()
        .join(".")
}

/// `a.b.c` -> `a.b`; a first-level key has the empty string as parent.
pub fn parent_of_key(key: &str) -> &str {
    match key.rfind('.') {
        Some(idx) => &key[..idx],
        None => "",
    }
}

/// Like [`parent_of_key`] but keeps the trailing dot (`a.b.c` -> `a.b.`), so
/// that a sibling can be addressed by plain concatenation.
pub fn parent_of_key_with_dot(key: &str) -> &str {
    match key.rfind('.') {
        Some(idx) => &key[..=idx],
        None => "",
    }
}

pub fn last_part_of_key(key: &str) -> &str {
    match key.rfind('.') {
        Some(idx) => &key[idx + 1..],
        None => key,
    }
}

pub fn append_key(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}.{key}")
    }
}

/// True when `key` lies strictly below `ancestor`.
pub fn is_descendant(key: &str, ancestor: &str) -> bool {
    key.len() > ancestor.len() + 1
        && key.starts_with(ancestor)
        && key.as_bytes()[ancestor.len()] == b'.'
}

/// Every proper ancestor of `key` with the remainder below it, longest
/// ancestor first: `a.b.c` yields `("a.b", "c")` then `("a", "b.c")`.
pub fn ancestors(key: &str) -> impl Iterator<Item = (&str, &str)> {
    key.char_indices()
        .filter(|&(_, c)| c == '.')
        .map(|(idx, _)| (&key[..idx], &key[idx + 1..]))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
}

/// Number of segments in a key.
pub fn depth(key: &str) -> usize {
    key.split('.').count()
}

/// Human label for the last segment of a field name (`$` segments skipped).
pub fn inflected_label(field_name: &str, humanize_label: bool) -> String {
    let mut pieces: Vec<&str> = field_name.split('.').collect();
    let mut label = pieces.pop().unwrap_or_default();
    if label == "$" {
        label = pieces.pop().unwrap_or_default();
    }
    if humanize_label {
        humanize(label)
    } else {
        label.to_string()
    }
}

/// `firstName` -> `First name`, `zip_code` -> `Zip code`.
pub fn humanize(s: &str) -> String {
    let mut spaced = String::with_capacity(s.len() + 4);
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            spaced.push(' ');
        } else {
            if c.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
                spaced.push(' ');
            }
            spaced.push(c);
        }
        prev = Some(c);
    }

    let lowered = spaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
