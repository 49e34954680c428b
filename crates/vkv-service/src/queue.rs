use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use vkv_crypto::ContentHasher;
use vkv_types::{MapKey, QueueId};

/// Map key of one queue slot: the hash of `queue_id ‖ u64-LE(index + 1)`.
///
/// The 40-byte preimage layout (32-byte queue id, then the little-endian
/// successor of the index) is part of the on-map format; every writer and
/// reader of a queue must derive slot keys identically.
pub fn queue_slot_key(queue_id: &QueueId, index: i64) -> MapKey {
    let mut preimage = [0u8; 40];
    preimage[..32].copy_from_slice(queue_id.as_bytes());
    preimage[32..].copy_from_slice(&((index + 1) as u64).to_le_bytes());
    let hash = ContentHasher::QUEUE_SLOT.hash(&preimage);
    MapKey::new(hash.as_bytes().to_vec())
}

/// Find the highest existing index of a queue, given only a point-existence
/// oracle. Returns −1 when the queue is empty.
///
/// Requires prefix-closed existence: if index `i` exists, every index below
/// it exists. Queue growth is one-at-a-time and monotonic, so the map
/// satisfies this.
///
/// The search brackets the tail with an exponential phase (starting bound
/// 128, growing by a factor of 16; the growth factor is part of the
/// observable probe sequence and must not change), then narrows with a
/// pivot/interval binary phase. Total cost is O(log n) probes.
pub async fn resolve_tail<F, Fut, E>(mut exists: F) -> Result<i64, E>
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    if !exists(0).await? {
        return Ok(-1);
    }
    let mut bound: i64 = 128;
    while exists(bound).await? {
        bound <<= 4;
    }
    let mut pivot = bound / 2;
    let mut interval = bound / 4;
    loop {
        if exists(pivot).await? {
            if interval == 0 {
                break;
            }
            pivot += interval;
            interval /= 2;
        } else {
            if interval == 0 {
                // Absence with the interval exhausted means we are one past
                // the last existing index.
                pivot -= 1;
                break;
            }
            pivot -= interval;
            interval /= 2;
        }
    }
    Ok(pivot)
}

/// Memoized per-queue tail indices.
///
/// Derived, not persisted: a cold cache only costs probes. The mutex is
/// held across the map access only.
pub struct QueueIndexCache {
    entries: Mutex<HashMap<QueueId, i64>>,
}

impl QueueIndexCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, queue_id: &QueueId) -> Option<i64> {
        self.entries.lock().expect("lock poisoned").get(queue_id).copied()
    }

    /// Record a known tail index, from a completed search or from a caller
    /// that just appended and knows the true value.
    pub fn set(&self, queue_id: QueueId, index: i64) {
        self.entries.lock().expect("lock poisoned").insert(queue_id, index);
    }
}

impl Default for QueueIndexCache {
    fn default() -> Self {
        Self::new()
    }
}
