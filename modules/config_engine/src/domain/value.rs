//! Structural helpers over `serde_json::Value`
//!
//! Deep clone is `Clone`; everything else the store needs to treat JSON trees
//! as plain data lives here.

use serde_json::{Map, Number, Value};

/// Largest integer an `f64` represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Structural equality with numeric comparison of numbers (`12 == 12.0`)
/// and key-order-insensitive objects.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| deep_equal(x, y)))
        }
        _ => a == b,
    }
}

/// `deep_equal` lifted over "undefined".
pub fn deep_equal_opt(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => deep_equal(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Fill keys missing from `target` with copies from `defaults`, recursively.
///
/// Keys already present in `target` win. Non-object targets are left alone.
pub fn deep_defaults(target: &mut Value, defaults: &Value) {
    let (Value::Object(target), Value::Object(defaults)) = (target, defaults) else {
        return;
    };
    for (key, default) in defaults {
        match target.get_mut(key) {
            Some(existing) if !existing.is_null() => deep_defaults(existing, default),
            _ => {
                target.insert(key.clone(), default.clone());
            }
        }
    }
}

/// Copy of `value` with object keys sorted recursively.
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let sorted: Map<String, Value> = keys
                .into_iter()
                .map(|key| (key.clone(), sort_keys(&map[key])))
                .collect();
            Value::Object(sorted)
        }
        other => other.clone(),
    }
}

/// Drop empty objects, recursively. Returns `None` when nothing is left.
pub fn without_empty_objects(value: Value) -> Option<Value> {
    match value {
        Value::Object(map) => {
            let pruned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(key, child)| without_empty_objects(child).map(|child| (key, child)))
                .collect();
            (!pruned.is_empty()).then_some(Value::Object(pruned))
        }
        Value::Null => None,
        other => Some(other),
    }
}

/// Remove every entry of `settings` that equals the matching entry of
/// `defaults`, recursing into nested objects. Returns whether anything was
/// removed. The resolved (default-merged) view is unchanged.
pub fn prune_defaults(settings: &mut Value, defaults: &Value) -> bool {
    let (Value::Object(settings), Value::Object(defaults)) = (settings, defaults) else {
        return false;
    };

    let mut removed = false;
    let keys: Vec<String> = settings.keys().cloned().collect();
    for key in keys {
        let Some(default) = defaults.get(&key) else {
            continue;
        };
        let Some(value) = settings.get_mut(&key) else {
            continue;
        };
        if deep_equal(value, default) {
            settings.remove(&key);
            removed = true;
        } else if value.is_object() && default.is_object() {
            removed |= prune_defaults(value, default);
            if value.as_object().is_some_and(Map::is_empty) {
                settings.remove(&key);
            }
        }
    }
    removed
}

/// JSON number for `n`, as an integer when `n` is integral and exactly
/// representable. `None` for non-finite input.
pub fn number_value(n: f64) -> Option<Value> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Some(Value::Number(Number::from(n as i64)));
    }
    Number::from_f64(n).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_equal_numbers_and_key_order() {
        assert!(deep_equal(&json!(12), &json!(12.0)));
        assert!(deep_equal(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
        assert!(deep_equal(&json!([1, {"b": 2}]), &json!([1.0, {"b": 2}])));
        assert!(!deep_equal(&json!([1, 2, 3]), &json!([1, 2])));
        assert!(!deep_equal(&json!({"a": 1}), &json!({"a": 1, "b": null})));
        assert!(!deep_equal(&json!("1"), &json!(1)));
    }

    #[test]
    fn test_deep_equal_opt() {
        assert!(deep_equal_opt(None, None));
        assert!(!deep_equal_opt(Some(&Value::Null), None));
    }

    #[test]
    fn test_deep_defaults_value_keys_win() {
        let mut value = json!({"baz": 3, "nested": {"x": 1}});
        deep_defaults(&mut value, &json!({"baz": 1, "ok": 2, "nested": {"x": 0, "y": 0}}));
        assert_eq!(value, json!({"baz": 3, "nested": {"x": 1, "y": 0}, "ok": 2}));

        let mut scalar = json!(7);
        deep_defaults(&mut scalar, &json!({"baz": 1}));
        assert_eq!(scalar, json!(7));
    }

    #[test]
    fn test_sort_keys_is_recursive() {
        let sorted = sort_keys(&json!({"b": {"z": 1, "a": 2}, "a": [{"d": 1, "c": 2}]}));
        let rendered = serde_json::to_string(&sorted).unwrap_or_default();
        assert_eq!(rendered, r#"{"a":[{"d":1,"c":2}],"b":{"a":2,"z":1}}"#);
    }

    #[test]
    fn test_without_empty_objects() {
        assert_eq!(
            without_empty_objects(json!({"a": {}, "b": {"c": {}}, "d": 1, "e": null})),
            Some(json!({"d": 1}))
        );
        assert_eq!(without_empty_objects(json!({"a": {}})), None);
        assert_eq!(without_empty_objects(json!([])), Some(json!([])));
    }

    #[test]
    fn test_prune_defaults() {
        let mut settings = json!({"foo": {"same": 1, "changes": 2, "obj": {"a": 1}}, "other": 3});
        let defaults = json!({"foo": {"same": 1, "changes": 1, "obj": {"a": 1, "b": 2}}});
        assert!(prune_defaults(&mut settings, &defaults));
        assert_eq!(settings, json!({"foo": {"changes": 2}, "other": 3}));
    }

    #[test]
    fn test_number_value() {
        assert_eq!(number_value(20.0), Some(json!(20)));
        assert_eq!(number_value(25.4), Some(json!(25.4)));
        assert_eq!(number_value(f64::INFINITY), None);
        assert_eq!(number_value(f64::NAN), None);
    }
}
