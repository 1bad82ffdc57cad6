//! Dotted key-path helpers over JSON value trees
//!
//! A key path such as `editor.fontSize` addresses a nested value. A dot that
//! belongs to a key is escaped as `\.` (`files.exclude.\.git`).

use serde_json::{Map, Value};

/// Split a key path into its segments, honouring `\.` escapes.
///
/// An empty path yields no segments.
pub fn split(key_path: &str) -> Vec<String> {
    if key_path.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut prev = None;
    for c in key_path.chars() {
        if c == '.' && prev != Some('\\') {
            segments.push(unescape(&current));
            current.clear();
        } else {
            current.push(c);
        }
        prev = Some(c);
    }
    segments.push(unescape(&current));
    segments
}

fn unescape(segment: &str) -> String {
    segment.replace("\\.", ".")
}

/// Append `key` to `key_path`, escaping any literal dot in `key`.
pub fn push(key_path: &str, key: &str) -> String {
    let key = key.replace('.', "\\.");
    if key_path.is_empty() {
        key
    } else {
        format!("{key_path}.{key}")
    }
}

/// Join already-split segments back into an escaped key path.
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .fold(String::new(), |path, key| push(&path, key.as_ref()))
}

/// Read the value at `key_path`. An empty path returns `root` itself.
pub fn get<'a>(root: &'a Value, key_path: &str) -> Option<&'a Value> {
    let mut current = root;
    for key in split(key_path) {
        current = current.as_object()?.get(&key)?;
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// Whether every segment of `key_path` exists in `root`.
pub fn has(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in split(key_path) {
        match current.as_object().and_then(|map| map.get(&key)) {
            Some(child) => current = child,
            None => return false,
        }
    }
    true
}

/// Write `value` at `key_path`, creating intermediate objects as needed.
///
/// Non-object intermediates are replaced by objects. An empty path replaces
/// the root.
pub fn set(root: &mut Value, key_path: &str, value: Value) {
    let keys = split(key_path);
    let Some((last, parents)) = keys.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for key in parents {
        current = ensure_object(current)
            .entry(key.clone())
            .or_insert(Value::Null);
    }
    ensure_object(current).insert(last.clone(), value);
}

/// The object at `value`, replacing any non-object first.
fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            *other = Value::Object(Map::new());
            ensure_object(other)
        }
    }
}

/// Remove the value at `key_path` and return it.
///
/// No-op when an intermediate segment is missing. An empty path is ignored.
pub fn delete(root: &mut Value, key_path: &str) -> Option<Value> {
    let keys = split(key_path);
    let (last, parents) = keys.split_last()?;

    let mut current = root;
    for key in parents {
        current = current.as_object_mut()?.get_mut(key)?;
    }
    current.as_object_mut()?.remove(last)
}
