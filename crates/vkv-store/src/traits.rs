use vkv_types::{ContentHash, SmrDescriptor};

use crate::error::StoreResult;

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. Content-addressing guarantees this:
///   the same data always produces the same hash.
/// - Inserts are idempotent: re-inserting existing content is a no-op.
/// - Concurrent reads are always safe (objects are immutable).
/// - The store never interprets object contents.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Persist `bytes` under `hash`.
    ///
    /// Implementations must reject a `hash` that does not match the data;
    /// a mismatched insert would break the content-address invariant for
    /// every later reader.
    fn insert(&self, hash: &ContentHash, bytes: &[u8]) -> StoreResult<()>;

    /// Retrieve the bytes stored under `hash`.
    ///
    /// Returns `StoreError::NotFound` if the object does not exist. A miss
    /// for a hash that a merged map leaf references is an integrity
    /// violation at the layer above, not a retryable condition.
    fn retrieve(&self, hash: &ContentHash) -> StoreResult<Vec<u8>>;

    /// Check whether an object exists in the store.
    fn contains(&self, hash: &ContentHash) -> StoreResult<bool>;

    /// The descriptor of the latest map root known to be anchored in the
    /// log, if any has been recorded.
    fn latest_cached_root(&self) -> StoreResult<Option<SmrDescriptor>>;

    /// Record a newly certified map root descriptor.
    ///
    /// Called by the process that observes map roots being anchored;
    /// readers only ever load the descriptor.
    fn set_cached_root(&self, descriptor: SmrDescriptor) -> StoreResult<()>;
}
