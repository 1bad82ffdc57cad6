//! Common test utilities: recording save sink, store builders and fixtures
#![allow(dead_code)]

use config_engine::{ConfigStore, SaveSink, StoreConfig};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// Save sink remembering every payload it was handed
#[derive(Clone, Default)]
pub struct RecordingSink {
    saved: Arc<Mutex<Vec<Value>>>,
}

impl RecordingSink {
    pub fn saved(&self) -> Vec<Value> {
        self.saved.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.saved.lock().len()
    }

    pub fn last(&self) -> Option<Value> {
        self.saved.lock().last().cloned()
    }
}

impl SaveSink for RecordingSink {
    fn save(&self, settings: &Value) -> anyhow::Result<()> {
        self.saved.lock().push(settings.clone());
        Ok(())
    }
}

/// Save sink that always fails
pub struct FailingSink;

impl SaveSink for FailingSink {
    fn save(&self, _settings: &Value) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }
}

/// Store whose user settings count as loaded, so writes request saves
pub fn loaded_store() -> (ConfigStore, RecordingSink) {
    init_tracing();
    let sink = RecordingSink::default();
    let store = ConfigStore::new(
        StoreConfig::default().with_main_source("/home/me/.app/config.json"),
        Arc::new(sink.clone()),
    );
    store.reset_user_settings(json!({}));
    (store, sink)
}

/// Store holding `schema` at `key_path`
pub fn store_with_schema(key_path: &str, schema: Value) -> ConfigStore {
    let (store, _sink) = loaded_store();
    if let Err(e) = store.set_schema(key_path, schema) {
        panic!("fixture schema should register: {e}");
    }
    store
}

/// Editor-like schema used by the persistence and observer tests
pub fn editor_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "editor": {
                "type": "object",
                "title": "Editor",
                "properties": {
                    "fontSize": {"type": "integer", "default": 14, "minimum": 6, "maximum": 72},
                    "fontFamily": {"type": "string", "default": "Menlo"},
                    "showInvisibles": {"type": "boolean", "default": false},
                    "tabLength": {"type": "integer", "default": 2, "enum": [2, 4, 8]}
                }
            },
            "core": {
                "type": "object",
                "properties": {
                    "themes": {"type": "array", "default": ["one-dark-ui"], "items": {"type": "string"}},
                    "projectHome": {"type": "string", "default": "~/projects"}
                }
            }
        }
    })
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn print_test_header(test_name: &str, purpose: &[&str]) {
    println!("\n🧪 TEST: {}", test_name);
    if let Some(first) = purpose.first() {
        println!("📋 PURPOSE: {}", first);
    }
    for line in purpose.iter().skip(1) {
        println!("   {}", line);
    }
}

pub fn print_json(label: &str, value: &Option<Value>) {
    let rendered = value
        .as_ref()
        .and_then(|v| serde_json::to_string_pretty(v).ok())
        .unwrap_or_else(|| "undefined".to_string());
    println!("   {}: {}", label, rendered);
}
