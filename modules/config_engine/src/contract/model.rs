//! Contract models for the configuration engine
//!
//! Option bags and event payloads shared between the store and its callers.

use serde_json::Value;

/// Options for `ConfigStore::get`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Only read from these sources. A non-empty list suppresses defaults.
    pub sources: Vec<String>,
    /// Never read from these sources
    pub exclude_sources: Vec<String>,
}

impl GetOptions {
    /// Read only from the given source, without defaults
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            sources: vec![source.into()],
            exclude_sources: Vec::new(),
        }
    }

    /// Read from every source except the given one
    pub fn excluding(source: impl Into<String>) -> Self {
        Self {
            sources: Vec::new(),
            exclude_sources: vec![source.into()],
        }
    }

    pub(crate) fn includes(&self, source: &str) -> bool {
        let listed = self.sources.is_empty() || self.sources.iter().any(|s| s == source);
        listed && !self.excludes(source)
    }

    pub(crate) fn excludes(&self, source: &str) -> bool {
        self.exclude_sources.iter().any(|s| s == source)
    }

    pub(crate) fn wants_defaults(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Options for `ConfigStore::set`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOptions {
    /// Request a save of the user settings after the write
    pub save: bool,
    /// Layer to write. `None` is the main (user) source; the loaded
    /// project file writes the project layer.
    pub source: Option<String>,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            save: true,
            source: None,
        }
    }
}

impl SetOptions {
    /// Write without requesting a save
    pub fn without_save() -> Self {
        Self {
            save: false,
            ..Self::default()
        }
    }

    /// Write to the given source's layer
    pub fn for_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }
}

/// Payload handed to `on_did_change` listeners
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}
