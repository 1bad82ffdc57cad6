//! Persistence hook for user settings
//!
//! The store never writes files itself. When user settings need saving it
//! hands `{"*": <settings tree>}` (keys sorted recursively) to a `SaveSink`
//! injected at construction. The byte format on disk is the sink's business.

use serde_json::Value;

/// Receiver of saved user settings
///
/// Implementations should handle:
/// - Serializing the payload into the user's config file
/// - Their own error reporting; failures are logged by the store, never retried
pub trait SaveSink: Send + Sync {
    /// Persist the user settings payload
    ///
    /// # Arguments
    /// * `settings` - `{"*": <settings tree>}` with keys sorted
    fn save(&self, settings: &Value) -> anyhow::Result<()>;
}

/// No-op sink for tests or when persistence is disabled
pub struct NoOpSaveSink;

impl SaveSink for NoOpSaveSink {
    fn save(&self, _settings: &Value) -> anyhow::Result<()> {
        // No-op: settings are not persisted
        Ok(())
    }
}

impl<F> SaveSink for F
where
    F: Fn(&Value) -> anyhow::Result<()> + Send + Sync,
{
    fn save(&self, settings: &Value) -> anyhow::Result<()> {
        self(settings)
    }
}
