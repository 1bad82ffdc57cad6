//! Schema enforcers: coerce raw input into a schema's declared type
//!
//! Enforcers for a type run in registration order, then the universal `*`
//! bucket (range clamping, enum validation). Returning an error means the
//! value must not be stored. For a type list the first candidate whose full
//! chain succeeds wins; if none does, the last error is returned.

use crate::contract::ConfigError;
use crate::domain::color::Color;
use crate::domain::key_path;
use crate::domain::schema::{SchemaNode, SchemaType};
use crate::domain::value::{deep_equal, number_value};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Enforcer signature. The registry is passed in so container types can
/// recurse into their children.
pub type EnforcerFn =
    fn(&EnforcerRegistry, &str, Value, &SchemaNode) -> Result<Value, ConfigError>;

/// A named enforcer function
#[derive(Clone, Copy)]
pub struct Enforcer {
    pub name: &'static str,
    pub run: EnforcerFn,
}

impl fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Enforcer").field(&self.name).finish()
    }
}

/// Table from type to enforcer chain, plus the universal bucket.
///
/// Built once, then shared read-only (usually behind an `Arc`) by every
/// store using it.
#[derive(Debug, Clone, Default)]
pub struct EnforcerRegistry {
    by_type: HashMap<SchemaType, Vec<Enforcer>>,
    universal: Vec<Enforcer>,
}

impl EnforcerRegistry {
    /// Registry without any enforcers
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in type semantics
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry
            .register(SchemaType::Any, "coerce", coerce_any)
            .register(SchemaType::Integer, "coerce", coerce_integer)
            .register(SchemaType::Number, "coerce", coerce_number)
            .register(SchemaType::Boolean, "coerce", coerce_boolean)
            .register(SchemaType::String, "validate", validate_string)
            .register(SchemaType::String, "validateMaximumLength", validate_maximum_length)
            .register(SchemaType::Null, "coerce", coerce_null)
            .register(SchemaType::Object, "coerce", coerce_object)
            .register(SchemaType::Array, "coerce", coerce_array)
            .register(SchemaType::Color, "coerce", coerce_color)
            .register(SchemaType::Wildcard, "coerceMinimumAndMaximum", clamp_minimum_and_maximum)
            .register(SchemaType::Wildcard, "validateEnum", validate_enum);
        registry
    }

    /// Append an enforcer to a type's chain. `*` appends to the universal
    /// bucket that runs after every type.
    pub fn register(
        &mut self,
        kind: impl Into<SchemaType>,
        name: &'static str,
        run: EnforcerFn,
    ) -> &mut Self {
        let enforcer = Enforcer { name, run };
        match kind.into() {
            SchemaType::Wildcard => self.universal.push(enforcer),
            kind => self.by_type.entry(kind).or_default().push(enforcer),
        }
        self
    }

    /// Whether a type has enforcers (the wildcard type always does)
    pub fn supports(&self, kind: &SchemaType) -> bool {
        *kind == SchemaType::Wildcard || self.by_type.contains_key(kind)
    }

    /// Coerce `value` into a value conforming to `schema`.
    pub fn execute(
        &self,
        key_path: &str,
        value: Value,
        schema: &SchemaNode,
    ) -> Result<Value, ConfigError> {
        let mut last_error = None;
        for kind in schema.types() {
            match self.run_chain(&kind, key_path, value.clone(), schema) {
                Ok(coerced) => return Ok(coerced),
                Err(e) => {
                    tracing::trace!(key_path, kind = %kind, error = %e, "type candidate rejected");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(value),
        }
    }

    fn run_chain(
        &self,
        kind: &SchemaType,
        key_path: &str,
        mut value: Value,
        schema: &SchemaNode,
    ) -> Result<Value, ConfigError> {
        let typed: &[Enforcer] = match kind {
            SchemaType::Wildcard => &[],
            kind => self
                .by_type
                .get(kind)
                .ok_or_else(|| ConfigError::UnknownType {
                    key_path: key_path.to_string(),
                    type_name: kind.to_string(),
                })?,
        };
        for enforcer in typed.iter().chain(&self.universal) {
            value = (enforcer.run)(self, key_path, value, schema)?;
        }
        Ok(value)
    }
}

// ===== Built-in enforcers =====

fn coerce_any(
    _: &EnforcerRegistry,
    _key_path: &str,
    value: Value,
    _schema: &SchemaNode,
) -> Result<Value, ConfigError> {
    Ok(value)
}

fn coerce_integer(
    _: &EnforcerRegistry,
    key_path: &str,
    value: Value,
    _schema: &SchemaNode,
) -> Result<Value, ConfigError> {
    if value.is_i64() || value.is_u64() {
        return Ok(value);
    }
    let parsed = match &value {
        Value::Number(n) => n.as_f64().map(f64::trunc),
        Value::String(s) => leading_integer(s),
        _ => None,
    };
    parsed
        .and_then(number_value)
        .ok_or_else(|| ConfigError::coercion(key_path, &value, "an int"))
}

fn coerce_number(
    _: &EnforcerRegistry,
    key_path: &str,
    value: Value,
    _schema: &SchemaNode,
) -> Result<Value, ConfigError> {
    if value.is_number() {
        return Ok(value);
    }
    let parsed = value.as_str().and_then(leading_number);
    parsed
        .and_then(number_value)
        .ok_or_else(|| ConfigError::coercion(key_path, &value, "a number"))
}

fn coerce_boolean(
    _: &EnforcerRegistry,
    key_path: &str,
    value: Value,
    _schema: &SchemaNode,
) -> Result<Value, ConfigError> {
    let coerced = match &value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    };
    coerced.map(Value::Bool).ok_or_else(|| {
        ConfigError::coercion(key_path, &value, "a boolean or the string 'true' or 'false'")
    })
}

fn validate_string(
    _: &EnforcerRegistry,
    key_path: &str,
    value: Value,
    _schema: &SchemaNode,
) -> Result<Value, ConfigError> {
    if value.is_string() {
        Ok(value)
    } else {
        Err(ConfigError::validation(key_path, &value, "a string"))
    }
}

fn validate_maximum_length(
    _: &EnforcerRegistry,
    _key_path: &str,
    value: Value,
    schema: &SchemaNode,
) -> Result<Value, ConfigError> {
    if let (Some(s), Some(max)) = (value.as_str(), schema.maximum_length) {
        if s.chars().count() > max {
            return Ok(Value::String(s.chars().take(max).collect()));
        }
    }
    Ok(value)
}

fn coerce_null(
    _: &EnforcerRegistry,
    key_path: &str,
    value: Value,
    _schema: &SchemaNode,
) -> Result<Value, ConfigError> {
    if value.is_null() {
        Ok(value)
    } else {
        Err(ConfigError::validation(key_path, &value, "null"))
    }
}

fn coerce_object(
    registry: &EnforcerRegistry,
    key_path: &str,
    value: Value,
    schema: &SchemaNode,
) -> Result<Value, ConfigError> {
    let entries = match value {
        Value::Object(entries) => entries,
        other => return Err(ConfigError::validation(key_path, &other, "an object")),
    };
    // No declared properties: the contents are unconstrained
    if schema.properties.is_none() {
        return Ok(Value::Object(entries));
    }

    let mut coerced = Map::with_capacity(entries.len());
    for (key, child) in entries {
        let child_path = key_path::push(key_path, &key);
        match schema.property(&key).or_else(|| schema.additional_schema()) {
            Some(child_schema) => match registry.execute(&child_path, child, child_schema) {
                Ok(child) => {
                    coerced.insert(key, child);
                }
                Err(e) => {
                    tracing::warn!(key_path = %child_path, error = %e, "Error setting item in object");
                }
            },
            None if schema.allows_additional() => {
                coerced.insert(key, child);
            }
            None => {
                tracing::warn!(key_path = %child_path, "Illegal object key");
            }
        }
    }
    Ok(Value::Object(coerced))
}

fn coerce_array(
    registry: &EnforcerRegistry,
    key_path: &str,
    value: Value,
    schema: &SchemaNode,
) -> Result<Value, ConfigError> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(ConfigError::validation(key_path, &other, "an array")),
    };
    let Some(item_schema) = schema.items.as_deref() else {
        return Ok(Value::Array(items));
    };

    let coerced = items
        .into_iter()
        .filter_map(|item| match registry.execute(key_path, item, item_schema) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(key_path, error = %e, "Error setting item in array");
                None
            }
        })
        .collect();
    Ok(Value::Array(coerced))
}

fn coerce_color(
    _: &EnforcerRegistry,
    key_path: &str,
    value: Value,
    _schema: &SchemaNode,
) -> Result<Value, ConfigError> {
    Color::parse(&value)
        .map(|color| color.to_value())
        .ok_or_else(|| ConfigError::validation(key_path, &value, "a color"))
}

fn clamp_minimum_and_maximum(
    _: &EnforcerRegistry,
    _key_path: &str,
    value: Value,
    schema: &SchemaNode,
) -> Result<Value, ConfigError> {
    let Some(n) = value.as_f64() else {
        return Ok(value);
    };
    let mut clamped = n;
    if let Some(minimum) = schema.minimum {
        clamped = clamped.max(minimum);
    }
    if let Some(maximum) = schema.maximum {
        clamped = clamped.min(maximum);
    }
    if clamped == n {
        return Ok(value);
    }
    Ok(number_value(clamped).unwrap_or(value))
}

fn validate_enum(
    _: &EnforcerRegistry,
    key_path: &str,
    value: Value,
    schema: &SchemaNode,
) -> Result<Value, ConfigError> {
    let permitted = schema.permitted_values();
    if permitted.is_empty() || permitted.iter().any(|allowed| deep_equal(allowed, &value)) {
        return Ok(value);
    }
    Err(ConfigError::EnumViolation {
        key_path: key_path.to_string(),
        value: value.to_string(),
        allowed: Value::Array(permitted.into_iter().cloned().collect()).to_string(),
    })
}

// ===== Numeric prefix parsing =====

/// Leading `[+-]digits` of `s` after leading whitespace.
fn leading_integer(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let digits_start = usize::from(s.starts_with(['+', '-']));
    let digits = s[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    s[..digits_start + digits].parse().ok()
}

/// Leading decimal number of `s` (sign, digits, fraction, exponent) after
/// leading whitespace.
fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let count_digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let mut end = usize::from(s.starts_with(['+', '-']));
    let int_digits = count_digits(end);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(end + 1);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(exp_end);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }
    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(value: Value) -> SchemaNode {
        match SchemaNode::from_value("test", value) {
            Ok(node) => node,
            Err(e) => panic!("schema should parse: {e}"),
        }
    }

    fn enforce(value: Value, schema_json: Value) -> Result<Value, ConfigError> {
        EnforcerRegistry::builtin().execute("foo.bar", value, &schema(schema_json))
    }

    #[test]
    fn test_integer_coercion() {
        let int = json!({"type": "integer"});
        assert_eq!(enforce(json!("123"), int.clone()), Ok(json!(123)));
        assert_eq!(enforce(json!(12.3), int.clone()), Ok(json!(12)));
        assert_eq!(enforce(json!(" 42px"), int.clone()), Ok(json!(42)));
        assert_eq!(enforce(json!("-7"), int.clone()), Ok(json!(-7)));
        assert!(matches!(
            enforce(json!("nope"), int.clone()),
            Err(ConfigError::Coercion { .. })
        ));
        assert!(matches!(
            enforce(Value::Null, int.clone()),
            Err(ConfigError::Coercion { .. })
        ));
        assert!(matches!(enforce(json!(true), int), Err(ConfigError::Coercion { .. })));
    }

    #[test]
    fn test_number_coercion() {
        let number = json!({"type": "number"});
        assert_eq!(enforce(json!("12.23"), number.clone()), Ok(json!(12.23)));
        assert_eq!(enforce(json!("1.0"), number.clone()), Ok(json!(1)));
        assert_eq!(enforce(json!(".5"), number.clone()), Ok(json!(0.5)));
        assert_eq!(enforce(json!("1e3x"), number.clone()), Ok(json!(1000)));
        assert!(matches!(
            enforce(json!("Infinity"), number.clone()),
            Err(ConfigError::Coercion { .. })
        ));
        assert!(matches!(enforce(json!("."), number), Err(ConfigError::Coercion { .. })));
    }

    #[test]
    fn test_minimum_and_maximum_clamp() {
        let ranged = json!({"type": "integer", "minimum": 10, "maximum": 20});
        assert_eq!(enforce(json!("123"), ranged.clone()), Ok(json!(20)));
        assert_eq!(enforce(json!("1"), ranged.clone()), Ok(json!(10)));
        assert_eq!(enforce(json!(15), ranged), Ok(json!(15)));

        let float = json!({"type": "number", "minimum": 11.2, "maximum": 25.4});
        assert_eq!(enforce(json!("123.2"), float.clone()), Ok(json!(25.4)));
        assert_eq!(enforce(json!("1.0"), float), Ok(json!(11.2)));
    }

    #[test]
    fn test_boolean_coercion() {
        let boolean = json!({"type": "boolean"});
        assert_eq!(enforce(json!("TRUE"), boolean.clone()), Ok(json!(true)));
        assert_eq!(enforce(json!("false"), boolean.clone()), Ok(json!(false)));
        assert_eq!(enforce(json!(true), boolean.clone()), Ok(json!(true)));
        for rejected in [json!(1), json!(0), json!({}), Value::Null, json!("yes")] {
            assert!(matches!(
                enforce(rejected, boolean.clone()),
                Err(ConfigError::Coercion { .. })
            ));
        }
    }

    #[test]
    fn test_string_validation_and_truncation() {
        let string = json!({"type": "string", "maximumLength": 3});
        assert_eq!(enforce(json!("abcdefg"), string.clone()), Ok(json!("abc")));
        assert_eq!(enforce(json!("héllo"), string.clone()), Ok(json!("hél")));
        for rejected in [json!(123), json!(true), Value::Null, json!([]), json!({"nope": "nope"})] {
            assert!(matches!(
                enforce(rejected, string.clone()),
                Err(ConfigError::Validation { .. })
            ));
        }
    }

    #[test]
    fn test_type_list_first_success_wins() {
        let list = json!({"type": ["integer", "string"]});
        assert_eq!(enforce(json!("123"), list.clone()), Ok(json!(123)));
        assert_eq!(enforce(json!("cats"), list.clone()), Ok(json!("cats")));
        assert!(matches!(
            enforce(json!(false), list),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_object_children_are_coerced_and_failures_dropped() {
        let object = json!({
            "type": "object",
            "properties": {
                "anInt": {"type": "integer"},
                "nestedObject": {
                    "type": "object",
                    "properties": {"nestedBool": {"type": "boolean"}}
                }
            }
        });
        assert_eq!(
            enforce(json!({"anInt": "23", "nestedObject": {"nestedBool": "true"}}), object.clone()),
            Ok(json!({"anInt": 23, "nestedObject": {"nestedBool": true}}))
        );
        assert_eq!(
            enforce(json!({"anInt": "nope", "extra": 1}), object.clone()),
            Ok(json!({"extra": 1}))
        );
        assert!(matches!(enforce(json!(7), object), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_object_additional_properties_policy() {
        let closed = json!({
            "type": "object",
            "properties": {"anInt": {"type": "integer"}},
            "additionalProperties": false
        });
        assert_eq!(
            enforce(json!({"anInt": 5, "somethingElse": "ok"}), closed),
            Ok(json!({"anInt": 5}))
        );

        let typed = json!({
            "type": "object",
            "properties": {"anInt": {"type": "integer"}},
            "additionalProperties": {"type": "string"}
        });
        assert_eq!(
            enforce(json!({"anInt": 6, "ok": "ok", "bad": 7}), typed),
            Ok(json!({"anInt": 6, "ok": "ok"}))
        );

        let typed_empty_properties = json!({
            "type": "object",
            "properties": {},
            "additionalProperties": {"type": "integer"}
        });
        assert_eq!(
            enforce(json!({"a": "1", "b": "x"}), typed_empty_properties),
            Ok(json!({"a": 1}))
        );
    }

    #[test]
    fn test_object_without_properties_passes_through() {
        let closed = json!({"type": "object", "additionalProperties": false});
        assert_eq!(
            enforce(json!({"x": 1, "y": [2]}), closed),
            Ok(json!({"x": 1, "y": [2]}))
        );

        let typed = json!({"type": "object", "additionalProperties": {"type": "integer"}});
        assert_eq!(enforce(json!({"a": "1"}), typed), Ok(json!({"a": "1"})));
    }

    #[test]
    fn test_array_items() {
        let array = json!({"type": "array", "items": {"type": "integer"}});
        assert_eq!(enforce(json!(["2", "3", "4"]), array.clone()), Ok(json!([2, 3, 4])));
        assert_eq!(enforce(json!(["1", "x", 3]), array.clone()), Ok(json!([1, 3])));
        assert!(matches!(enforce(json!("1,2"), array), Err(ConfigError::Validation { .. })));

        let untyped = json!({"type": "array"});
        assert_eq!(enforce(json!([1, "a", null]), untyped), Ok(json!([1, "a", null])));
    }

    #[test]
    fn test_enum_validation() {
        let strings = json!({"type": "string", "enum": ["ok", "one", "two"]});
        assert_eq!(enforce(json!("one"), strings.clone()), Ok(json!("one")));
        assert!(matches!(
            enforce(json!("nope"), strings),
            Err(ConfigError::EnumViolation { .. })
        ));

        let ints = json!({"type": "integer", "enum": [2, 3, 5]});
        assert_eq!(enforce(json!("3"), ints.clone()), Ok(json!(3)));
        assert!(matches!(
            enforce(json!("400"), ints),
            Err(ConfigError::EnumViolation { .. })
        ));

        let items = json!({
            "type": "array",
            "items": {"type": "string", "enum": ["one", "two", "three"]}
        });
        assert_eq!(enforce(json!(["one", "five"]), items), Ok(json!(["one"])));

        let wrapped = json!({
            "type": "string",
            "enum": [{"value": "one", "description": "One"}, "two"]
        });
        assert_eq!(enforce(json!("one"), wrapped.clone()), Ok(json!("one")));
        assert!(matches!(
            enforce(json!("One"), wrapped),
            Err(ConfigError::EnumViolation { .. })
        ));
    }

    #[test]
    fn test_null_any_wildcard_and_color() {
        assert_eq!(enforce(Value::Null, json!({"type": "null"})), Ok(Value::Null));
        assert!(enforce(json!(0), json!({"type": "null"})).is_err());
        assert_eq!(enforce(json!({"x": 1}), json!({"type": "any"})), Ok(json!({"x": 1})));
        assert_eq!(enforce(json!([1]), json!({"type": "*"})), Ok(json!([1])));
        assert_eq!(enforce(json!("white"), json!({"type": "color"})), Ok(json!("#ffffff")));
        assert!(matches!(
            enforce(json!(30), json!({"type": "color"})),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_unknown_type_and_custom_registration() {
        assert!(matches!(
            enforce(json!("x"), json!({"type": "path"})),
            Err(ConfigError::UnknownType { .. })
        ));

        fn absolute_path(
            _: &EnforcerRegistry,
            key_path: &str,
            value: Value,
            _: &SchemaNode,
        ) -> Result<Value, ConfigError> {
            match value.as_str() {
                Some(path) if path.starts_with('/') => Ok(value),
                _ => Err(ConfigError::validation(key_path, &value, "an absolute path")),
            }
        }

        let mut registry = EnforcerRegistry::builtin();
        registry.register("path", "absolute", absolute_path);
        assert!(registry.supports(&SchemaType::Custom("path".into())));

        let path_schema = schema(json!({"type": "path", "enum": ["/etc", "/usr"]}));
        assert_eq!(
            registry.execute("p", json!("/etc"), &path_schema),
            Ok(json!("/etc"))
        );
        assert!(matches!(
            registry.execute("p", json!("etc"), &path_schema),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            registry.execute("p", json!("/var"), &path_schema),
            Err(ConfigError::EnumViolation { .. })
        ));
    }

    #[test]
    fn test_numeric_prefix_parsing() {
        assert_eq!(leading_integer("12abc"), Some(12.0));
        assert_eq!(leading_integer("+5"), Some(5.0));
        assert_eq!(leading_integer("-"), None);
        assert_eq!(leading_number("-1.5e2kg"), Some(-150.0));
        assert_eq!(leading_number("3."), Some(3.0));
        assert_eq!(leading_number("2e"), Some(2.0));
        assert_eq!(leading_number("abc"), None);
    }
}
