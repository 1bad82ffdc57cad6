//! Native client trait for settings consumers
//!
//! The subset of the store a settings editor needs. Direct function calls,
//! no transport.

use super::model::{GetOptions, SetOptions};
use crate::domain::{ConfigStore, Disposable, SchemaNode};
use serde_json::Value;

/// Callback handed to [`ConfigApi::observe`]
pub type ObserveCallback = Box<dyn FnMut(&Option<Value>) + Send>;

/// Configuration API for settings consumers
pub trait ConfigApi: Send + Sync {
    /// Resolved value at a key path
    fn get(&self, key_path: &str, options: &GetOptions) -> Option<Value>;

    /// Coerce and store a value. `false` when the value was rejected.
    fn set(&self, key_path: &str, value: Value, options: &SetOptions) -> bool;

    /// Revert a key path to its default
    fn unset(&self, key_path: &str, source: Option<&str>) -> bool;

    /// Schema addressing a key path, if any
    fn get_schema(&self, key_path: &str) -> Option<SchemaNode>;

    /// Watch the resolved value at a key path
    fn observe(&self, key_path: &str, callback: ObserveCallback) -> Disposable;
}

impl ConfigApi for ConfigStore {
    fn get(&self, key_path: &str, options: &GetOptions) -> Option<Value> {
        ConfigStore::get(self, key_path, options)
    }

    fn set(&self, key_path: &str, value: Value, options: &SetOptions) -> bool {
        ConfigStore::set(self, key_path, value, options)
    }

    fn unset(&self, key_path: &str, source: Option<&str>) -> bool {
        ConfigStore::unset(self, key_path, source)
    }

    fn get_schema(&self, key_path: &str) -> Option<SchemaNode> {
        ConfigStore::get_schema(self, key_path)
    }

    fn observe(&self, key_path: &str, callback: ObserveCallback) -> Disposable {
        ConfigStore::observe(self, key_path, callback)
    }
}
