//! Schema tree describing configuration keys
//!
//! Schemas arrive as JSON (`{"type": "integer", "default": 12, ...}`). Keys
//! the engine does not interpret (titles, descriptions, ordering hints for a
//! settings UI) are kept in `extra` and round-trip untouched.

use crate::contract::ConfigError;
use crate::domain::key_path;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Declared type of a schema node.
///
/// The built-in kinds are closed; `Custom` names a type whose enforcers are
/// registered on the `EnforcerRegistry`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SchemaType {
    Any,
    Integer,
    Number,
    Boolean,
    String,
    Null,
    Object,
    Array,
    Color,
    /// `*`: no type-specific enforcers, only the universal bucket
    Wildcard,
    Custom(std::string::String),
}

impl SchemaType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => "any",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Null => "null",
            Self::Object => "object",
            Self::Array => "array",
            Self::Color => "color",
            Self::Wildcard => "*",
            Self::Custom(name) => name,
        }
    }
}

impl From<std::string::String> for SchemaType {
    fn from(name: std::string::String) -> Self {
        match name.as_str() {
            "any" => Self::Any,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "string" => Self::String,
            "null" => Self::Null,
            "object" => Self::Object,
            "array" => Self::Array,
            "color" => Self::Color,
            "*" => Self::Wildcard,
            _ => Self::Custom(name),
        }
    }
}

impl From<&str> for SchemaType {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<SchemaType> for std::string::String {
    fn from(kind: SchemaType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `type`: a single name or an ordered list of candidates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypeSpec {
    One(SchemaType),
    Many(Vec<SchemaType>),
}

/// `additionalProperties`: a boolean policy or a schema for unknown keys
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

/// One configuration key's declared type, default and constraints
///
/// Parsing is lenient: a constraint of the wrong shape (`"minimum": "10"`,
/// tuple-form `items`) is not interpreted and stays in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_spec: Option<TypeSpec>,

    /// A JSON `null` default parses to `None` and counts as absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<std::string::String, SchemaNode>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,

    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_length: Option<usize>,

    /// Keys not interpreted by the engine
    #[serde(flatten)]
    pub extra: Map<std::string::String, Value>,
}

impl SchemaNode {
    pub fn of_type(kind: impl Into<SchemaType>) -> Self {
        Self {
            type_spec: Some(TypeSpec::One(kind.into())),
            ..Self::default()
        }
    }

    /// Open schema returned for undeclared keys of unrestricted objects
    pub fn any() -> Self {
        Self::of_type(SchemaType::Any)
    }

    /// Empty object schema, the root of every store
    pub fn object() -> Self {
        Self {
            properties: Some(IndexMap::new()),
            ..Self::of_type(SchemaType::Object)
        }
    }

    /// Parse a schema fragment passed to `set_schema`.
    pub fn from_value(key_path: &str, value: Value) -> Result<Self, ConfigError> {
        let Value::Object(map) = value else {
            return Err(ConfigError::schema(key_path, "schemas can only be objects"));
        };
        if map.get("type").map_or(true, Value::is_null) {
            return Err(ConfigError::schema(
                key_path,
                "schema objects must have a type attribute",
            ));
        }
        let node = Self::from_map(map);
        if node.type_spec.is_none() {
            return Err(ConfigError::schema(
                key_path,
                "type must be a type name or a list of type names",
            ));
        }
        Ok(node)
    }

    /// Build a node from a JSON object, recursing into `properties`,
    /// `items` and `additionalProperties`.
    pub fn from_map(map: Map<std::string::String, Value>) -> Self {
        let mut node = Self::default();
        for (key, value) in map {
            let interpreted = match key.as_str() {
                "type" => parse_type_spec(value).map(|spec| node.type_spec = Some(spec)),
                "default" => {
                    node.default = Some(value).filter(|v| !v.is_null());
                    Ok(())
                }
                "properties" => match value {
                    Value::Object(children) => {
                        node.properties = Some(parse_properties(children));
                        Ok(())
                    }
                    other => Err(other),
                },
                "items" => match value {
                    Value::Object(item) => {
                        node.items = Some(Box::new(Self::from_map(item)));
                        Ok(())
                    }
                    other => Err(other),
                },
                "additionalProperties" => match value {
                    Value::Bool(allowed) => {
                        node.additional_properties = Some(AdditionalProperties::Allowed(allowed));
                        Ok(())
                    }
                    Value::Object(schema) => {
                        node.additional_properties = Some(AdditionalProperties::Schema(
                            Box::new(Self::from_map(schema)),
                        ));
                        Ok(())
                    }
                    other => Err(other),
                },
                "enum" => match value {
                    Value::Array(values) => {
                        node.enum_values = Some(values);
                        Ok(())
                    }
                    other => Err(other),
                },
                "minimum" => match value.as_f64() {
                    Some(minimum) => {
                        node.minimum = Some(minimum);
                        Ok(())
                    }
                    None => Err(value),
                },
                "maximum" => match value.as_f64() {
                    Some(maximum) => {
                        node.maximum = Some(maximum);
                        Ok(())
                    }
                    None => Err(value),
                },
                "maximumLength" => match value.as_f64().filter(|n| n.is_finite() && *n >= 0.0) {
                    Some(length) => {
                        node.maximum_length = Some(length as usize);
                        Ok(())
                    }
                    None => Err(value),
                },
                _ => Err(value),
            };
            if let Err(value) = interpreted {
                node.extra.insert(key, value);
            }
        }
        node
    }

    /// Candidate types in trial order.
    ///
    /// A node without a declared type is an object when it has properties,
    /// otherwise `any`.
    pub fn types(&self) -> Vec<SchemaType> {
        match &self.type_spec {
            Some(TypeSpec::One(kind)) => vec![kind.clone()],
            Some(TypeSpec::Many(kinds)) => kinds.clone(),
            None if self.properties.is_some() => vec![SchemaType::Object],
            None => vec![SchemaType::Any],
        }
    }

    pub fn is_object(&self) -> bool {
        self.types().contains(&SchemaType::Object)
    }

    pub fn property(&self, key: &str) -> Option<&SchemaNode> {
        self.properties.as_ref().and_then(|props| props.get(key))
    }

    /// Schema applied to keys not listed in `properties`, if any
    pub fn additional_schema(&self) -> Option<&SchemaNode> {
        match &self.additional_properties {
            Some(AdditionalProperties::Schema(schema)) => Some(schema),
            _ => None,
        }
    }

    /// `false` only when `additionalProperties: false`
    pub fn allows_additional(&self) -> bool {
        !matches!(
            self.additional_properties,
            Some(AdditionalProperties::Allowed(false))
        )
    }

    /// Enum literals with `{value, description}` wrappers unwrapped
    pub fn permitted_values(&self) -> Vec<&Value> {
        self.enum_values
            .iter()
            .flatten()
            .map(|entry| match entry {
                Value::Object(map) if map.contains_key("value") => &map["value"],
                other => other,
            })
            .collect()
    }

    /// Resolve the schema addressing `key_path`.
    ///
    /// Undeclared keys of an object without an `additionalProperties`
    /// restriction resolve to `any`, as does everything below an object that
    /// declares no `properties` at all. `None` when the path is forbidden or
    /// crosses a non-object node.
    pub fn lookup(&self, key_path: &str) -> Option<SchemaNode> {
        let mut node = self;
        for key in key_path::split(key_path) {
            if !node.is_object() {
                return None;
            }
            if node.properties.is_none() {
                return Some(Self::any());
            }
            node = match node.property(&key).or_else(|| node.additional_schema()) {
                Some(child) => child,
                None if node.allows_additional() => return Some(Self::any()),
                None => return None,
            };
        }
        Some(node.clone())
    }

    /// Walk to `key_path`, turning every node on the way into an object and
    /// creating missing children.
    pub fn ensure_path(&mut self, key_path: &str) -> &mut SchemaNode {
        let mut node = self;
        for key in key_path::split(key_path) {
            node.type_spec = Some(TypeSpec::One(SchemaType::Object));
            node = node
                .properties
                .get_or_insert_with(IndexMap::new)
                .entry(key)
                .or_default();
        }
        node
    }

    /// Fold `other` into this node: fields set on `other` replace ours,
    /// `properties` entries are merged key by key.
    pub fn merge(&mut self, other: SchemaNode) {
        let SchemaNode {
            type_spec,
            default,
            properties,
            items,
            additional_properties,
            enum_values,
            minimum,
            maximum,
            maximum_length,
            extra,
        } = other;

        // An uninterpreted key replaces the interpreted field of that name
        for key in extra.keys() {
            self.forget(key);
        }

        if type_spec.is_some() {
            self.forget("type");
            self.type_spec = type_spec;
        }
        if default.is_some() {
            self.forget("default");
            self.default = default;
        }
        if let Some(properties) = properties {
            self.extra.remove("properties");
            let ours = self.properties.get_or_insert_with(IndexMap::new);
            for (key, child) in properties {
                ours.insert(key, child);
            }
        }
        if items.is_some() {
            self.forget("items");
            self.items = items;
        }
        if additional_properties.is_some() {
            self.forget("additionalProperties");
            self.additional_properties = additional_properties;
        }
        if enum_values.is_some() {
            self.forget("enum");
            self.enum_values = enum_values;
        }
        if minimum.is_some() {
            self.forget("minimum");
            self.minimum = minimum;
        }
        if maximum.is_some() {
            self.forget("maximum");
            self.maximum = maximum;
        }
        if maximum_length.is_some() {
            self.forget("maximumLength");
            self.maximum_length = maximum_length;
        }
        self.extra.extend(extra);
    }

    /// Drop whatever this node holds under the JSON key `key`.
    fn forget(&mut self, key: &str) {
        self.extra.remove(key);
        match key {
            "type" => self.type_spec = None,
            "default" => self.default = None,
            "properties" => self.properties = None,
            "items" => self.items = None,
            "additionalProperties" => self.additional_properties = None,
            "enum" => self.enum_values = None,
            "minimum" => self.minimum = None,
            "maximum" => self.maximum = None,
            "maximumLength" => self.maximum_length = None,
            _ => {}
        }
    }

    /// Default value derived from this node.
    ///
    /// An explicit `default` wins; an object node without one yields an
    /// object shaped like its properties (children without defaults are
    /// omitted).
    pub fn extract_defaults(&self) -> Option<Value> {
        if let Some(default) = &self.default {
            return Some(default.clone());
        }
        if !self.is_object() {
            return None;
        }
        let properties = self.properties.as_ref()?;
        let defaults: Map<std::string::String, Value> = properties
            .iter()
            .filter_map(|(key, child)| child.extract_defaults().map(|d| (key.clone(), d)))
            .collect();
        Some(Value::Object(defaults))
    }
}

impl<'de> Deserialize<'de> for SchemaNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::<std::string::String, Value>::deserialize(deserializer).map(Self::from_map)
    }
}

/// A type name, or a list made only of type names
fn parse_type_spec(value: Value) -> Result<TypeSpec, Value> {
    match value {
        Value::String(name) => Ok(TypeSpec::One(name.into())),
        Value::Array(names) if names.iter().all(Value::is_string) => Ok(TypeSpec::Many(
            names
                .into_iter()
                .filter_map(|name| match name {
                    Value::String(name) => Some(SchemaType::from(name)),
                    _ => None,
                })
                .collect(),
        )),
        other => Err(other),
    }
}

fn parse_properties(children: Map<std::string::String, Value>) -> IndexMap<std::string::String, SchemaNode> {
    children
        .into_iter()
        .filter_map(|(key, child)| match child {
            Value::Object(child) => Some((key, SchemaNode::from_map(child))),
            _ => {
                tracing::debug!(property = %key, "ignoring property schema that is not an object");
                None
            }
        })
        .collect()
}
