//! Contract error types for the configuration engine
//!
//! Hard failures raised by schema registration and value enforcement.
//! Write APIs on the store convert these into a `false` return; only
//! `set_schema` hands them to the caller.

/// Configuration engine errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Malformed schema passed to `set_schema`
    #[error("Error loading schema for '{key_path}': {reason}")]
    Schema {
        /// Key path the schema was registered at
        key_path: String,
        /// What is wrong with the schema
        reason: String,
    },

    /// Value cannot be parsed into the declared primitive type
    #[error("Validation failed at '{key_path}', {value} cannot be coerced into {expected}")]
    Coercion {
        key_path: String,
        /// JSON rendering of the rejected value
        value: String,
        /// Human readable target type ("an int", "a boolean", ...)
        expected: String,
    },

    /// Structurally wrong value for the declared type
    #[error("Validation failed at '{key_path}', {value} must be {expected}")]
    Validation {
        key_path: String,
        value: String,
        expected: String,
    },

    /// Value is not one of the permitted enum literals
    #[error("Validation failed at '{key_path}', {value} is not one of {allowed}")]
    EnumViolation {
        key_path: String,
        value: String,
        /// JSON rendering of the permitted values
        allowed: String,
    },

    /// No schema addresses this key path
    #[error("Illegal key path '{key_path}'")]
    IllegalKeyPath { key_path: String },

    /// Schema declares a type no enforcer is registered for
    #[error("No enforcers registered for type '{type_name}' (at '{key_path}')")]
    UnknownType { key_path: String, type_name: String },
}

impl ConfigError {
    pub(crate) fn schema(key_path: &str, reason: impl Into<String>) -> Self {
        Self::Schema {
            key_path: key_path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn coercion(key_path: &str, value: &serde_json::Value, expected: &str) -> Self {
        Self::Coercion {
            key_path: key_path.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    pub(crate) fn validation(key_path: &str, value: &serde_json::Value, expected: &str) -> Self {
        Self::Validation {
            key_path: key_path.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Key path the error was raised at
    pub fn key_path(&self) -> &str {
        match self {
            Self::Schema { key_path, .. }
            | Self::Coercion { key_path, .. }
            | Self::Validation { key_path, .. }
            | Self::EnumViolation { key_path, .. }
            | Self::IllegalKeyPath { key_path }
            | Self::UnknownType { key_path, .. } => key_path,
        }
    }
}
