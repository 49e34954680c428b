//! Content-addressed object storage for the vkv storage layer.
//!
//! Map leaves carry only content hashes; the real bytes of every attestation
//! and operation record live here, keyed by their BLAKE3 hash. The store also
//! owns one extra slot: the descriptor of the latest map root known to be
//! anchored in the log, which readers use to pin their lookups.
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Concurrent reads are always safe (objects are immutable).
//! 3. The store never interprets object contents; it is a pure key-value store.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use traits::ObjectStore;
