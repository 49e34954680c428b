use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;
use crate::key::MapKey;

/// Domain tag prepended to every merge-promise signing payload.
pub const PROMISE_DOMAIN: &[u8] = b"vkv-merge-promise-v1";

/// Signed operator commitment that a pending write will eventually be
/// merged into the map as `key -> value_hash`.
///
/// A promise is produced synchronously at write time, before the external
/// merge process has run. It certifies durability intent, not map
/// inclusion: holding a promise says nothing about whether the merge has
/// already happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePromise {
    /// Map key the operator commits to merging.
    pub key: MapKey,
    /// Content hash of the value the key will map to.
    pub value_hash: ContentHash,
    /// Ed25519 public key of the signing operator.
    pub signer: [u8; 32],
    /// Ed25519 signature over [`MergePromise::signed_payload`].
    pub signature: Vec<u8>,
}

impl MergePromise {
    /// The canonical byte string covered by the signature.
    ///
    /// Domain-tagged and length-prefixed so that `(key, value_hash)` pairs
    /// cannot be confused across boundaries or with other signed payloads.
    pub fn signed_payload(key: &MapKey, value_hash: &ContentHash) -> Vec<u8> {
        let mut payload =
            Vec::with_capacity(PROMISE_DOMAIN.len() + 1 + 8 + key.len() + 32);
        payload.extend_from_slice(PROMISE_DOMAIN);
        payload.push(b':');
        payload.extend_from_slice(&(key.len() as u64).to_le_bytes());
        payload.extend_from_slice(key.as_bytes());
        payload.extend_from_slice(value_hash.as_bytes());
        payload
    }
}

/// Registry entry pairing a [`MergePromise`] with the content hash needed to
/// re-resolve the real value bytes through the object store.
///
/// Serialized as JSON and appended to the operation log at write time, so
/// the log carries a durable record of every promise ever issued.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromiseObject {
    pub promise: MergePromise,
    pub key: MapKey,
    pub value_hash: ContentHash,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_promise() -> MergePromise {
        MergePromise {
            key: MapKey::new(b"k".to_vec()),
            value_hash: ContentHash::from_bytes(b"v"),
            signer: [7u8; 32],
            signature: vec![1, 2, 3],
        }
    }

    #[test]
    fn signed_payload_is_deterministic() {
        let key = MapKey::new(b"key".to_vec());
        let hash = ContentHash::from_bytes(b"value");
        assert_eq!(
            MergePromise::signed_payload(&key, &hash),
            MergePromise::signed_payload(&key, &hash)
        );
    }

    #[test]
    fn signed_payload_binds_key_and_hash() {
        let hash = ContentHash::from_bytes(b"value");
        let p1 = MergePromise::signed_payload(&MapKey::new(b"a".to_vec()), &hash);
        let p2 = MergePromise::signed_payload(&MapKey::new(b"b".to_vec()), &hash);
        assert_ne!(p1, p2);

        let key = MapKey::new(b"a".to_vec());
        let p3 = MergePromise::signed_payload(&key, &ContentHash::from_bytes(b"other"));
        assert_ne!(p1, p3);
    }

    #[test]
    fn promise_object_json_roundtrip() {
        let po = PromiseObject {
            promise: sample_promise(),
            key: MapKey::new(b"k".to_vec()),
            value_hash: ContentHash::from_bytes(b"v"),
        };
        let json = serde_json::to_string(&po).unwrap();
        let parsed: PromiseObject = serde_json::from_str(&json).unwrap();
        assert_eq!(po, parsed);
    }
}
