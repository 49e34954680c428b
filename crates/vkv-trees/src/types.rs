use serde::{Deserialize, Serialize};
use vkv_types::ContentHash;

use crate::error::{TreeError, TreeResult};

/// Acknowledgement of a log append.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Hash under which the appended leaf will be addressable.
    pub leaf_hash: ContentHash,
}

/// Signed root of an append-only log at a given size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedLogRoot {
    /// Number of leaves covered by this root.
    pub tree_size: u64,
    /// Root hash of the log at `tree_size`.
    pub root_hash: [u8; 32],
    /// Signature by the log operator over the root.
    pub signature: Vec<u8>,
}

impl SignedLogRoot {
    /// Canonical serialized form carried in wire bundles.
    pub fn encode(&self) -> TreeResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| TreeError::Decode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> TreeResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| TreeError::Decode(e.to_string()))
    }
}

/// Signed commitment to the full map state at one revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMapRoot {
    /// Revision of the map's entire key space this root commits to.
    pub revision: u64,
    /// Root hash of the sparse map at `revision`.
    pub root_hash: [u8; 32],
    /// Signature by the map operator over the root.
    pub signature: Vec<u8>,
}

impl SignedMapRoot {
    /// Canonical serialized form. The anchor log commits to the hash of
    /// exactly these bytes, so encoding must stay deterministic.
    pub fn encode(&self) -> TreeResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| TreeError::Decode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> TreeResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| TreeError::Decode(e.to_string()))
    }
}

/// One leaf returned by a map lookup, with its (non-)inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLeafInclusion {
    /// Leaf value, or `None` when the key is absent at the queried revision.
    pub leaf_value: Option<Vec<u8>>,
    /// Opaque proof of inclusion (or of absence) against the lookup's root.
    pub proof: Vec<u8>,
}

impl MapLeafInclusion {
    /// Returns `true` when the key has a value at the queried revision.
    pub fn is_present(&self) -> bool {
        self.leaf_value.is_some()
    }
}

/// Result of a map lookup: one inclusion per requested key, plus the root
/// they all verify against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLookup {
    pub inclusions: Vec<MapLeafInclusion>,
    pub root: SignedMapRoot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_log_root_encode_roundtrip() {
        let root = SignedLogRoot {
            tree_size: 5,
            root_hash: [3u8; 32],
            signature: vec![9, 9],
        };
        let bytes = root.encode().unwrap();
        assert_eq!(SignedLogRoot::decode(&bytes).unwrap(), root);
    }

    #[test]
    fn signed_map_root_encoding_is_deterministic() {
        let root = SignedMapRoot {
            revision: 2,
            root_hash: [7u8; 32],
            signature: vec![1],
        };
        assert_eq!(root.encode().unwrap(), root.encode().unwrap());
    }

    #[test]
    fn leaf_presence() {
        let present = MapLeafInclusion {
            leaf_value: Some(vec![1]),
            proof: vec![],
        };
        let absent = MapLeafInclusion {
            leaf_value: None,
            proof: vec![],
        };
        assert!(present.is_present());
        assert!(!absent.is_present());
    }
}
