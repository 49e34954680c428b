use std::collections::HashMap;
use std::sync::RwLock;

use vkv_crypto::ContentHasher;
use vkv_types::{ContentHash, SmrDescriptor};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. All objects are held in memory behind a
/// `RwLock` for safe concurrent access. Bytes are cloned on read.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ContentHash, Vec<u8>>>,
    cached_root: RwLock<Option<SmrDescriptor>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            cached_root: RwLock::new(None),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(|bytes| bytes.len() as u64)
            .sum()
    }

    /// Remove all objects and the cached root descriptor.
    pub fn clear(&self) {
        self.objects.write().expect("lock poisoned").clear();
        *self.cached_root.write().expect("lock poisoned") = None;
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn insert(&self, hash: &ContentHash, bytes: &[u8]) -> StoreResult<()> {
        if hash.is_null() {
            return Err(StoreError::NullHash);
        }
        let computed = ContentHasher::VALUE.hash(bytes);
        if computed != *hash {
            return Err(StoreError::HashMismatch {
                expected: *hash,
                computed,
            });
        }
        let mut map = self.objects.write().expect("lock poisoned");
        // Idempotent: if already present, skip (content-addressing guarantees
        // the same hash always maps to the same content).
        map.entry(*hash).or_insert_with(|| bytes.to_vec());
        Ok(())
    }

    fn retrieve(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(hash).cloned().ok_or(StoreError::NotFound(*hash))
    }

    fn contains(&self, hash: &ContentHash) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(hash))
    }

    fn latest_cached_root(&self) -> StoreResult<Option<SmrDescriptor>> {
        Ok(self.cached_root.read().expect("lock poisoned").clone())
    }

    fn set_cached_root(&self, descriptor: SmrDescriptor) -> StoreResult<()> {
        *self.cached_root.write().expect("lock poisoned") = Some(descriptor);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}
