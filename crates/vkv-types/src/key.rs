use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque key into the versioned sparse map.
///
/// The storage layer never interprets key bytes; callers typically use a
/// content hash or a derived queue-slot hash. Keys are owned byte strings
/// so the promise registry can index by them.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapKey(Vec<u8>);

impl MapKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the key in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the key is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.0[..self.0.len().min(4)];
        write!(f, "MapKey({}…)", hex::encode(shown))
    }
}

impl From<&[u8]> for MapKey {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for MapKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Opaque 32-byte identifier of an application-level queue.
///
/// Queue membership is encoded as map keys derived from this identifier
/// plus a slot index, not as a native sequence structure.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueId([u8; 32]);

impl QueueId {
    /// Create a queue identifier from a 32-byte value.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// Derive a queue identifier by hashing arbitrary bytes.
    pub fn derive(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// A random queue identifier for tests and demos.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// The raw 32-byte identifier.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| TypeError::InvalidLength {
            expected: 32,
            actual: b.len(),
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueueId({})", hex::encode(&self.0[..4]))
    }
}
