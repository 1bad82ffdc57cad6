//! Key-path observers and their disposable handles
//!
//! Each observer remembers the last resolved value it was shown. On every
//! change emission the store re-resolves the observer's key path and only
//! invokes the callback when the value actually changed.

use crate::contract::ValueChange;
use crate::domain::value::deep_equal_opt;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

pub(crate) type ChangeCallback = Box<dyn FnMut(&ValueChange) + Send>;

pub(crate) struct Observer {
    key_path: String,
    last: Option<Value>,
    /// Taken out while the callback runs so no lock is held during the call
    callback: Option<ChangeCallback>,
    disposed: bool,
}

pub(crate) type SharedObserver = Arc<Mutex<Observer>>;

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: u64,
    observers: BTreeMap<u64, SharedObserver>,
}

impl ObserverRegistry {
    pub(crate) fn add(
        &mut self,
        key_path: &str,
        current: Option<Value>,
        callback: ChangeCallback,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.observers.insert(
            id,
            Arc::new(Mutex::new(Observer {
                key_path: key_path.to_string(),
                last: current,
                callback: Some(callback),
                disposed: false,
            })),
        );
        id
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        match self.observers.remove(&id) {
            Some(observer) => {
                let mut observer = observer.lock();
                observer.disposed = true;
                observer.callback = None;
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        let ids: Vec<u64> = self.observers.keys().copied().collect();
        for id in ids {
            self.remove(id);
        }
    }

    /// Observers in registration order
    pub(crate) fn snapshot(&self) -> Vec<SharedObserver> {
        self.observers.values().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }
}

pub(crate) fn key_path_of(observer: &SharedObserver) -> Option<String> {
    let observer = observer.lock();
    (!observer.disposed).then(|| observer.key_path.clone())
}

/// Invoke the observer if `new_value` differs from what it last saw.
/// Returns whether the callback ran.
pub(crate) fn dispatch(observer: &SharedObserver, new_value: Option<Value>) -> bool {
    let (change, mut callback) = {
        let mut entry = observer.lock();
        // No callback here means it is running further up the stack
        if entry.disposed
            || entry.callback.is_none()
            || deep_equal_opt(entry.last.as_ref(), new_value.as_ref())
        {
            return false;
        }
        let Some(callback) = entry.callback.take() else {
            return false;
        };
        let old_value = std::mem::replace(&mut entry.last, new_value.clone());
        (ValueChange { old_value, new_value }, callback)
    };

    callback(&change);

    let mut entry = observer.lock();
    if !entry.disposed {
        entry.callback = Some(callback);
    }
    true
}

/// Handle returned by `observe` / `on_did_change`
///
/// Disposing removes the callback from the store. Disposing twice, or after
/// the store is gone, does nothing.
pub struct Disposable {
    id: u64,
    registry: Weak<Mutex<ObserverRegistry>>,
    disposed: AtomicBool,
}

impl Disposable {
    pub(crate) fn new(id: u64, registry: &Arc<Mutex<ObserverRegistry>>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(self.id);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Disposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposable")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting_callback(count: &Arc<AtomicUsize>) -> ChangeCallback {
        let count = count.clone();
        Box::new(move |_change: &ValueChange| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_dispatch_only_on_change() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut registry = ObserverRegistry::default();
        registry.add("a", Some(json!(1)), counting_callback(&count));
        let observers = registry.snapshot();
        let observer = &observers[0];

        assert!(!dispatch(observer, Some(json!(1.0))));
        assert!(dispatch(observer, Some(json!(2))));
        assert!(!dispatch(observer, Some(json!(2))));
        assert!(dispatch(observer, None));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let count = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(Mutex::new(ObserverRegistry::default()));
        let id = registry.lock().add("a", None, counting_callback(&count));
        let observer = registry.lock().snapshot()[0].clone();

        let handle = Disposable::new(id, &registry);
        handle.dispose();
        handle.dispose();
        assert!(handle.is_disposed());
        assert_eq!(registry.lock().len(), 0);

        assert!(!dispatch(&observer, Some(json!(1))));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(key_path_of(&observer), None);
    }

    #[test]
    fn test_dispose_after_registry_dropped() {
        let registry = Arc::new(Mutex::new(ObserverRegistry::default()));
        let id = registry.lock().add("a", None, Box::new(|_: &ValueChange| {}));
        let handle = Disposable::new(id, &registry);
        drop(registry);
        handle.dispose();
        assert!(handle.is_disposed());
    }
}
