//! Debounced persistence of user settings
//!
//! The store only raises a pending-save flag. This task waits for the flag,
//! lets writes settle for `StoreConfig::save_debounce`, then saves once.
//! Every new write during the quiet period restarts it.

use crate::domain::ConfigStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn the save scheduler for `store`.
///
/// On cancellation any pending save is flushed before the task exits.
pub fn spawn(store: Arc<ConfigStore>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(run(store, cancel))
}

async fn run(store: Arc<ConfigStore>, cancel: CancellationToken) {
    let notifier = store.save_notifier();
    let debounce = store.config().save_debounce();
    tracing::debug!(debounce_ms = store.config().save_debounce_ms, "save scheduler started");

    'scheduler: loop {
        tokio::select! {
            _ = cancel.cancelled() => break 'scheduler,
            _ = notifier.notified() => {}
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break 'scheduler,
                // Another write: restart the quiet period
                _ = notifier.notified() => continue,
                _ = tokio::time::sleep(debounce) => break,
            }
        }

        store.flush_pending_save();
    }

    if store.flush_pending_save() {
        tracing::debug!("flushed pending save on shutdown");
    }
    tracing::debug!("save scheduler stopped");
}
