use std::collections::HashMap;
use std::sync::Mutex;

use vkv_types::{MapKey, PromiseObject};

/// In-memory table of keys with writes pending merge.
///
/// A pending promise is authoritative for its key only until the key is
/// observed merged; once a reader serves the proof-backed map value it
/// calls [`PromiseRegistry::remove`] and the promise is superseded.
///
/// The mutex is held only across the map operation itself, never across
/// network or disk calls. Concurrent upserts for the same key are not
/// serialized against each other: last write observed wins. That is a
/// documented gap of the write path, not a guarantee.
pub struct PromiseRegistry {
    entries: Mutex<HashMap<MapKey, PromiseObject>>,
}

impl PromiseRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record a pending promise for its key, replacing any previous one.
    pub fn upsert(&self, object: PromiseObject) {
        let mut entries = self.entries.lock().expect("lock poisoned");
        entries.insert(object.key.clone(), object);
    }

    /// The pending promise for `key`, if any.
    pub fn get(&self, key: &MapKey) -> Option<PromiseObject> {
        let entries = self.entries.lock().expect("lock poisoned");
        entries.get(key).cloned()
    }

    /// Drop the pending promise for `key` once its merge has been observed.
    ///
    /// Returns the superseded entry, if one was present.
    pub fn remove(&self, key: &MapKey) -> Option<PromiseObject> {
        let mut entries = self.entries.lock().expect("lock poisoned");
        entries.remove(key)
    }

    /// Number of keys with pending promises.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock poisoned").len()
    }

    /// Returns `true` if no promises are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().expect("lock poisoned").is_empty()
    }
}

impl Default for PromiseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PromiseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromiseRegistry")
            .field("pending", &self.len())
            .finish()
    }
}
