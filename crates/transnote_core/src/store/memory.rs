//! In-memory preference store for tests and throwaway sessions.

use super::{EditDecision, PreferenceStore, StoreChange, StoreError, StoreResult};
use super::CHANGE_CHANNEL_CAPACITY;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
    changes: broadcast::Sender<StoreChange>,
}

impl Default for MemoryPreferenceStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Mutex::new(HashMap::new()),
            changes,
        }
    }
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with `key` already holding `value`.
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::default();
        if let Ok(mut values) = store.values.lock() {
            values.insert(key.into(), value.into());
        }
        store
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn edit(
        &self,
        key: &str,
        edit: &mut dyn FnMut(Option<&str>) -> EditDecision,
    ) -> StoreResult<bool> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        let next = match edit(values.get(key).map(String::as_str)) {
            EditDecision::Write(next) => next,
            EditDecision::Keep => return Ok(false),
        };
        values.insert(key.to_string(), next.clone());
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            value: next,
        });
        drop(values);
        Ok(true)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
