use serde::{Deserialize, Serialize};

use crate::promise::MergePromise;

/// Proof-carrying read response.
///
/// Exactly one of three shapes is populated:
///
/// - **Unmerged**: `unmerged == true`, `promise` and `value` set, no proofs.
///   The write is pending; the promise is the only commitment available.
/// - **Merged, absent**: proofs set, `value == None`. The map provably does
///   not contain the key at the certified revision.
/// - **Merged, present**: proofs and `value` set. The value bytes were
///   re-resolved through the object store from the leaf's content hash.
///
/// Proof fields are opaque serialized blobs, verifiable only against the
/// corresponding tree's public key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResponse {
    /// True when answered from a pending merge promise instead of the map.
    pub unmerged: bool,
    /// The pending promise (unmerged responses only).
    pub promise: Option<MergePromise>,
    /// Serialized signed map root at the answering revision.
    pub signed_map_root: Option<Vec<u8>>,
    /// Serialized map inclusion (or non-inclusion) proof for the key.
    pub map_inclusion: Option<Vec<u8>>,
    /// Serialized signed root of the anchor log.
    pub signed_log_root: Option<Vec<u8>>,
    /// Serialized proof that the map root is anchored in the log.
    pub log_inclusion: Option<Vec<u8>>,
    /// Consistency proof hashes covering `[trusted_size, log_size]`;
    /// empty when the caller supplied no trusted size or is caught up.
    pub log_consistency: Vec<Vec<u8>>,
    /// The value bytes, when the key resolves to a value.
    pub value: Option<Vec<u8>>,
}

impl GetResponse {
    /// An unmerged response carrying a promise and the pending value.
    pub fn unmerged(promise: MergePromise, value: Vec<u8>) -> Self {
        Self {
            unmerged: true,
            promise: Some(promise),
            value: Some(value),
            ..Default::default()
        }
    }

    /// Returns `true` if this response carries map/log proof material.
    pub fn is_proven(&self) -> bool {
        self.signed_map_root.is_some() && self.map_inclusion.is_some()
    }
}
