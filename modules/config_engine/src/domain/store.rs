//! Settings store - schema, defaults and user settings orchestration

use super::enforcers::EnforcerRegistry;
use super::key_path;
use super::observers::{self, Disposable, ObserverRegistry};
use super::persistence::SaveSink;
use super::schema::SchemaNode;
use super::value::{deep_defaults, deep_equal_opt, prune_defaults, sort_keys, without_empty_objects};
use crate::config::StoreConfig;
use crate::contract::{ConfigError, GetOptions, SetOptions, ValueChange};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Notify;

/// Settings layer a write lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    User,
    Project,
}

struct StoreState {
    schema: SchemaNode,
    defaults: Value,
    /// User settings, kept as a diff against `defaults`
    settings: Value,
    project_settings: Value,
    project_file: Option<String>,
    transact_depth: usize,
    pending_save: bool,
    settings_loaded: bool,
}

impl StoreState {
    fn new() -> Self {
        Self {
            schema: SchemaNode::object(),
            defaults: empty_object(),
            settings: empty_object(),
            project_settings: empty_object(),
            project_file: None,
            transact_depth: 0,
            pending_save: false,
            settings_loaded: false,
        }
    }

    fn layer_mut(&mut self, layer: Layer) -> &mut Value {
        match layer {
            Layer::User => &mut self.settings,
            Layer::Project => &mut self.project_settings,
        }
    }
}

/// Schema-typed, key-path addressable settings store
///
/// Every method takes `&self`. No internal lock is held while an observer
/// callback runs, so callbacks may read from or write to the store.
pub struct ConfigStore {
    config: StoreConfig,
    state: Mutex<StoreState>,
    observers: Arc<Mutex<ObserverRegistry>>,
    enforcers: Arc<EnforcerRegistry>,
    sink: Arc<dyn SaveSink>,
    save_notify: Arc<Notify>,
}

impl ConfigStore {
    /// Create a store using the built-in enforcers
    pub fn new(config: StoreConfig, sink: Arc<dyn SaveSink>) -> Self {
        Self::with_registry(config, Arc::new(EnforcerRegistry::builtin()), sink)
    }

    /// Create a store sharing an existing enforcer registry
    pub fn with_registry(
        config: StoreConfig,
        enforcers: Arc<EnforcerRegistry>,
        sink: Arc<dyn SaveSink>,
    ) -> Self {
        Self {
            config,
            state: Mutex::new(StoreState::new()),
            observers: Arc::new(Mutex::new(ObserverRegistry::default())),
            enforcers,
            sink,
            save_notify: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Drop schema, defaults, both settings layers and every observer.
    pub fn clear(&self) {
        {
            let mut state = self.state.lock();
            let depth = state.transact_depth;
            *state = StoreState::new();
            state.transact_depth = depth;
        }
        self.observers.lock().clear();
        tracing::debug!("configuration store cleared");
    }

    // ===== Schema =====

    /// Register a JSON schema fragment at `key_path`.
    ///
    /// Fails only when `schema` is not an object with a `type`. Defaults
    /// are folded in and existing settings are re-validated, emitting at
    /// most one change event.
    pub fn set_schema(&self, key_path: &str, schema: Value) -> Result<(), ConfigError> {
        let node = SchemaNode::from_value(key_path, schema)?;
        self.set_schema_node(key_path, node)
    }

    /// Register an already parsed schema node at `key_path`.
    pub fn set_schema_node(&self, key_path: &str, node: SchemaNode) -> Result<(), ConfigError> {
        if node.type_spec.is_none() {
            return Err(ConfigError::schema(
                key_path,
                "schema objects must have a type attribute",
            ));
        }

        let defaults = node.extract_defaults();
        self.state.lock().schema.ensure_path(key_path).merge(node);
        tracing::debug!(key_path, "schema registered");

        self.transact(|| {
            if let Some(defaults) = defaults {
                self.set_defaults(key_path, defaults);
            }
            self.revalidate_settings();
        });
        Ok(())
    }

    /// Schema addressing `key_path`. See [`SchemaNode::lookup`].
    pub fn get_schema(&self, key_path: &str) -> Option<SchemaNode> {
        self.state.lock().schema.lookup(key_path)
    }

    fn revalidate_settings(&self) {
        self.revalidate_layer(Layer::User);
        self.revalidate_layer(Layer::Project);
        self.emit_change_event();
    }

    fn revalidate_layer(&self, layer: Layer) {
        let (schema, settings, defaults) = {
            let mut state = self.state.lock();
            (
                state.schema.clone(),
                state.layer_mut(layer).clone(),
                state.defaults.clone(),
            )
        };

        let mut conformed = match self.enforcers.execute("", settings, &schema) {
            Ok(value) if value.is_object() => value,
            Ok(_) => empty_object(),
            Err(e) => {
                tracing::warn!(?layer, error = %e, "settings do not conform to the schema, dropping them");
                empty_object()
            }
        };
        if self.config.prune_on_schema_change && prune_defaults(&mut conformed, &defaults) {
            tracing::debug!(?layer, "pruned settings equal to their new defaults");
        }

        *self.state.lock().layer_mut(layer) =
            without_empty_objects(conformed).unwrap_or_else(empty_object);
    }

    // ===== Defaults =====

    /// Install `defaults` at `key_path`.
    ///
    /// Objects are walked and every leaf is coerced through its schema on
    /// its own; a leaf that fails is skipped with a warning.
    pub fn set_defaults(&self, key_path: &str, defaults: Value) {
        match defaults {
            Value::Object(entries) => self.transact(|| {
                for (key, child) in entries {
                    self.set_defaults(&key_path::push(key_path, &key), child);
                }
            }),
            Value::Null => {}
            _ if key_path.is_empty() => {
                tracing::warn!("root defaults must be an object");
            }
            value => match self.conform(key_path, value) {
                Ok(value) => {
                    key_path::set(&mut self.state.lock().defaults, key_path, value);
                    self.emit_change_event();
                }
                Err(e) => {
                    tracing::warn!(key_path, error = %e, "failed to set default");
                }
            },
        }
    }

    pub fn get_default(&self, key_path: &str) -> Option<Value> {
        key_path::get(&self.state.lock().defaults, key_path).cloned()
    }

    /// Whether the user layer holds no value at `key_path`
    pub fn is_default(&self, key_path: &str) -> bool {
        key_path::get(&self.state.lock().settings, key_path).is_none()
    }

    // ===== Reads and writes =====

    /// Resolved value at `key_path`.
    ///
    /// The returned value is a copy. When both the stored value and the
    /// default are objects the default's missing keys are merged in.
    ///
    /// The project layer overrides the user layer, so excluding the main
    /// source hides both.
    pub fn get(&self, key_path: &str, options: &GetOptions) -> Option<Value> {
        let state = self.state.lock();

        let mut value = None;
        if !options.excludes(&self.config.main_source) {
            if options.includes(&self.config.main_source) {
                value = key_path::get(&state.settings, key_path).cloned();
            }
            if let Some(project_file) = &state.project_file {
                if options.includes(project_file) {
                    if let Some(project_value) = key_path::get(&state.project_settings, key_path) {
                        value = Some(project_value.clone());
                    }
                }
            }
        }

        let default = if options.wants_defaults() {
            key_path::get(&state.defaults, key_path)
        } else {
            None
        };

        match (value, default) {
            (Some(mut value), Some(default)) => {
                deep_defaults(&mut value, default);
                Some(value)
            }
            (Some(value), None) => Some(value),
            (None, default) => default.cloned(),
        }
    }

    /// Coerce `value` through the schema at `key_path` and store it.
    ///
    /// Returns `false`, leaving the store untouched, when no schema
    /// addresses the path or the value cannot be made to conform.
    pub fn set(&self, key_path: &str, value: Value, options: &SetOptions) -> bool {
        self.set_value(key_path, Some(value), options)
    }

    /// Like [`set`](Self::set); `None` reverts the key to its default.
    pub fn set_value(&self, key_path: &str, value: Option<Value>, options: &SetOptions) -> bool {
        let Some(layer) = self.layer_for(options.source.as_deref()) else {
            tracing::debug!(key_path, source = ?options.source, "no settings layer for source");
            return false;
        };

        let value = match value {
            Some(value) => match self.conform(key_path, value) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!(key_path, error = %e, "value rejected");
                    return false;
                }
            },
            None => None,
        };

        self.set_raw_value(key_path, value, layer);
        if layer == Layer::User && options.save {
            self.request_save();
        }
        true
    }

    /// Revert `key_path` to its default in the given source's layer.
    pub fn unset(&self, key_path: &str, source: Option<&str>) -> bool {
        let options = SetOptions {
            source: source.map(str::to_string),
            ..SetOptions::default()
        };
        self.set_value(key_path, None, &options)
    }

    fn conform(&self, key_path: &str, value: Value) -> Result<Value, ConfigError> {
        let schema = self
            .get_schema(key_path)
            .ok_or_else(|| ConfigError::IllegalKeyPath {
                key_path: key_path.to_string(),
            })?;
        self.enforcers.execute(key_path, value, &schema)
    }

    fn layer_for(&self, source: Option<&str>) -> Option<Layer> {
        match source {
            None => Some(Layer::User),
            Some(source) if source == self.config.main_source => Some(Layer::User),
            Some(source) if self.state.lock().project_file.as_deref() == Some(source) => {
                Some(Layer::Project)
            }
            Some(_) => None,
        }
    }

    fn set_raw_value(&self, key_path: &str, value: Option<Value>, layer: Layer) {
        {
            let mut state = self.state.lock();
            let default = key_path::get(&state.defaults, key_path).cloned();
            let tree = state.layer_mut(layer);
            match value.filter(|v| !v.is_null()) {
                Some(value) if !deep_equal_opt(Some(&value), default.as_ref()) => {
                    key_path::set(tree, key_path, value);
                }
                _ => remove_value(tree, key_path),
            }
        }
        self.emit_change_event();
    }

    // ===== Loading =====

    /// Replace the user layer with `new_settings`.
    ///
    /// Accepts a saved payload (`{"*": {...}}`), the legacy `{"global": {...}}`
    /// form or a bare settings tree. Every top-level key goes through `set`
    /// without requesting a save; invalid entries are skipped.
    pub fn reset_user_settings(&self, new_settings: Value) {
        self.reset_settings(new_settings, Layer::User);
    }

    /// Load a project file's settings as an override layer.
    pub fn reset_project_settings(&self, new_settings: Value, project_file: impl Into<String>) {
        let project_file = project_file.into();
        tracing::debug!(project_file = %project_file, "loading project settings");
        self.state.lock().project_file = Some(project_file);
        self.reset_settings(new_settings, Layer::Project);
    }

    pub fn clear_project_settings(&self) {
        {
            let mut state = self.state.lock();
            state.project_settings = empty_object();
            state.project_file = None;
        }
        self.emit_change_event();
    }

    fn reset_settings(&self, new_settings: Value, layer: Layer) {
        let entries = unscoped_settings(new_settings);
        let source = match layer {
            Layer::User => None,
            Layer::Project => self.project_file(),
        };
        let options = SetOptions {
            save: false,
            source,
        };

        self.transact(|| {
            {
                let mut state = self.state.lock();
                *state.layer_mut(layer) = empty_object();
                if layer == Layer::User {
                    state.settings_loaded = true;
                }
            }
            for (key, value) in entries {
                if !self.set(&key, value, &options) {
                    tracing::warn!(key_path = %key, "ignoring setting that does not match the schema");
                }
            }
        });
    }

    pub fn settings_loaded(&self) -> bool {
        self.state.lock().settings_loaded
    }

    pub fn user_config_path(&self) -> &str {
        &self.config.main_source
    }

    pub fn project_file(&self) -> Option<String> {
        self.state.lock().project_file.clone()
    }

    // ===== Persistence =====

    /// Hand `{"*": <user settings>}` to the save sink, keys sorted.
    pub fn save(&self) {
        let payload = {
            let state = self.state.lock();
            let mut root = Map::new();
            root.insert("*".to_string(), state.settings.clone());
            sort_keys(&Value::Object(root))
        };
        match self.sink.save(&payload) {
            Ok(()) => tracing::debug!(main_source = %self.config.main_source, "user settings saved"),
            Err(e) => tracing::error!(error = %e, "failed to save user settings"),
        }
    }

    fn request_save(&self) {
        {
            let mut state = self.state.lock();
            if !state.settings_loaded {
                return;
            }
            state.pending_save = true;
        }
        self.save_notify.notify_one();
    }

    /// Clear the pending-save flag, returning whether it was set.
    pub fn take_pending_save(&self) -> bool {
        std::mem::take(&mut self.state.lock().pending_save)
    }

    /// Save if a save is pending. Returns whether one was.
    pub fn flush_pending_save(&self) -> bool {
        let pending = self.take_pending_save();
        if pending {
            self.save();
        }
        pending
    }

    /// Notified whenever a save becomes pending
    pub fn save_notifier(&self) -> Arc<Notify> {
        self.save_notify.clone()
    }

    // ===== Observation =====

    /// Call `callback` with the current value at `key_path` now and again
    /// whenever the resolved value changes.
    pub fn observe<F>(&self, key_path: &str, mut callback: F) -> Disposable
    where
        F: FnMut(&Option<Value>) + Send + 'static,
    {
        let current = self.get(key_path, &GetOptions::default());
        callback(&current);
        self.on_did_change(key_path, move |change: &ValueChange| {
            callback(&change.new_value)
        })
    }

    /// Call `callback` with the old and new value whenever the resolved
    /// value at `key_path` changes. An empty key path observes everything.
    pub fn on_did_change<F>(&self, key_path: &str, callback: F) -> Disposable
    where
        F: FnMut(&ValueChange) + Send + 'static,
    {
        let current = self.get(key_path, &GetOptions::default());
        let id = self
            .observers
            .lock()
            .add(key_path, current, Box::new(callback));
        Disposable::new(id, &self.observers)
    }

    fn emit_change_event(&self) {
        if self.state.lock().transact_depth > 0 {
            return;
        }
        let listeners = self.observers.lock().snapshot();
        for observer in &listeners {
            let Some(key_path) = observers::key_path_of(observer) else {
                continue;
            };
            let value = self.get(&key_path, &GetOptions::default());
            observers::dispatch(observer, value);
        }
    }

    // ===== Transactions =====

    /// Run `f` with change events suppressed; one event is emitted when the
    /// outermost transaction ends.
    pub fn transact<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.begin_transaction();
        f()
    }

    /// Async [`transact`](Self::transact). The transaction ends once the
    /// future settles, including when it is dropped early.
    pub async fn transact_async<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.begin_transaction();
        f().await
    }

    fn begin_transaction(&self) -> TransactionGuard<'_> {
        self.state.lock().transact_depth += 1;
        TransactionGuard { store: self }
    }
}

struct TransactionGuard<'a> {
    store: &'a ConfigStore,
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        let depth = {
            let mut state = self.store.state.lock();
            state.transact_depth = state.transact_depth.saturating_sub(1);
            state.transact_depth
        };
        if depth == 0 && !std::thread::panicking() {
            self.store.emit_change_event();
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Delete `key_path` from `tree` and prune parents left empty.
fn remove_value(tree: &mut Value, key_path: &str) {
    let segments = key_path::split(key_path);
    if segments.is_empty() {
        *tree = empty_object();
        return;
    }

    key_path::delete(tree, key_path);
    for depth in (1..segments.len()).rev() {
        let parent = key_path::join(&segments[..depth]);
        let is_empty = key_path::get(tree, &parent)
            .and_then(Value::as_object)
            .is_some_and(Map::is_empty);
        if !is_empty {
            break;
        }
        key_path::delete(tree, &parent);
    }
}

/// Unscoped part of a loaded settings document
fn unscoped_settings(settings: Value) -> Map<String, Value> {
    let Value::Object(mut document) = settings else {
        tracing::warn!("settings document is not an object, ignoring it");
        return Map::new();
    };

    if let Some(global) = document.remove("global") {
        document.insert("*".to_string(), global);
    }
    match document.remove("*") {
        Some(Value::Object(unscoped)) => {
            for selector in document.keys() {
                tracing::debug!(selector = %selector, "scoped settings are not supported, ignoring");
            }
            unscoped
        }
        Some(_) => {
            tracing::warn!("unscoped settings are not an object, ignoring them");
            Map::new()
        }
        None => document,
    }
}
