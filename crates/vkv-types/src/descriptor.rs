use serde::{Deserialize, Serialize};

/// Cached descriptor of the latest log-anchored signed map root.
///
/// Persisted alongside the object store by whatever process observes new map
/// roots being certified into the anchor log. A reader holding a descriptor
/// can pin its map lookups at `revision` and hand back the log material that
/// proves the root was anchored, without touching the anchor log on the read
/// path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmrDescriptor {
    /// Map revision this descriptor certifies.
    pub revision: u64,
    /// Size of the anchor log at certification time.
    pub log_size: u64,
    /// Serialized signed root of the anchor log.
    pub log_signed_root: Vec<u8>,
    /// Serialized proof that the map root is included in the anchor log.
    pub log_inclusion: Vec<u8>,
}

impl SmrDescriptor {
    pub fn new(
        revision: u64,
        log_size: u64,
        log_signed_root: Vec<u8>,
        log_inclusion: Vec<u8>,
    ) -> Self {
        Self {
            revision,
            log_size,
            log_signed_root,
            log_inclusion,
        }
    }
}
