use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};
use vkv_crypto::{ContentHasher, PromiseSigner, SigningKey, VerifyingKey};
use vkv_store::{ObjectStore, StoreError};
use vkv_trees::{LogClient, MapClient, MapLeafInclusion, MapLookup, TreeError};
use vkv_types::{ContentHash, GetResponse, MapKey, MergePromise, PromiseObject, QueueId};

use crate::config::ServiceConfig;
use crate::error::{StorageError, StorageResult};
use crate::queue::{queue_slot_key, resolve_tail, QueueIndexCache};
use crate::registry::PromiseRegistry;

/// The verifiable storage core: one instance per deployment or tenant.
///
/// Owns all shared mutable state (promise registry, queue-index cache, the
/// `goodrev` revision hint) as fields, so independent instances can coexist
/// for isolated testing. Readers and writers run concurrently; each table
/// guards itself, and no lock is held across a call into the log, map, or
/// object store.
pub struct StorageService {
    config: ServiceConfig,
    signer: PromiseSigner,
    store: Arc<dyn ObjectStore>,
    log: Arc<dyn LogClient>,
    map: Arc<dyn MapClient>,
    promises: PromiseRegistry,
    queue_index: QueueIndexCache,
    /// Last map revision known to be anchored in the log. A lock-free hint:
    /// staleness costs an extra probe during stabilization, never
    /// correctness. Decreases only during the fallback scan.
    goodrev: AtomicI64,
}

impl StorageService {
    pub fn new(
        config: ServiceConfig,
        signer: PromiseSigner,
        store: Arc<dyn ObjectStore>,
        log: Arc<dyn LogClient>,
        map: Arc<dyn MapClient>,
    ) -> Self {
        Self {
            config,
            signer,
            store,
            log,
            map,
            promises: PromiseRegistry::new(),
            queue_index: QueueIndexCache::new(),
            goodrev: AtomicI64::new(0),
        }
    }

    /// Construct from raw signing key material.
    ///
    /// Bad key material fails here, before the service holds any state.
    pub fn from_key_bytes(
        config: ServiceConfig,
        key_bytes: &[u8],
        store: Arc<dyn ObjectStore>,
        log: Arc<dyn LogClient>,
        map: Arc<dyn MapClient>,
    ) -> StorageResult<Self> {
        let key = SigningKey::parse(key_bytes)?;
        Ok(Self::new(config, PromiseSigner::new(key), store, log, map))
    }

    /// The public key readers use to verify promises from this service.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signer.verifying_key()
    }

    /// Number of keys currently awaiting merge.
    pub fn pending_promises(&self) -> usize {
        self.promises.len()
    }

    // -----------------------------------------------------------------------
    // Merge coordination (writes)
    // -----------------------------------------------------------------------

    /// Durably accept a write and return a signed merge promise.
    ///
    /// The promise certifies durability intent, not map inclusion: the
    /// external merge process moves the leaf into the map later. Steps, in
    /// order: hash the value, sign the promise, record it in the registry,
    /// append the promise record to the operation log, persist the value
    /// bytes. Failures propagate without retry.
    ///
    /// Concurrent inserts for the same key are not serialized against each
    /// other; the registry keeps whichever write it observes last.
    pub async fn insert(&self, key: MapKey, value: Vec<u8>) -> StorageResult<MergePromise> {
        let value_hash = ContentHasher::VALUE.hash(&value);
        let promise = self.signer.make_promise(&key, &value_hash);
        let object = PromiseObject {
            promise: promise.clone(),
            key: key.clone(),
            value_hash,
        };
        self.promises.upsert(object.clone());

        let payload =
            serde_json::to_vec(&object).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.log.append(self.config.op_log, &payload).await?;

        // The log references the value before it is persisted; a crash in
        // between surfaces as an integrity error on the next read, never as
        // silent loss.
        self.store.insert(&value_hash, &value)?;
        debug!(key = ?key, hash = %value_hash, "write promised");
        Ok(promise)
    }

    // -----------------------------------------------------------------------
    // Proof-carrying reads
    // -----------------------------------------------------------------------

    /// Read `key` against the cached log-anchored map root.
    ///
    /// `trusted_size` is the anchor-log size the caller last verified; when
    /// it is non-zero and behind the descriptor's log size, the response
    /// carries a consistency proof over exactly that gap.
    ///
    /// Without a cached descriptor only the promise registry can answer;
    /// if it also lacks the key, this fails with
    /// [`StorageError::MapRootTooOld`].
    pub async fn get(&self, key: &MapKey, trusted_size: u64) -> StorageResult<GetResponse> {
        let Some(descriptor) = self.store.latest_cached_root()? else {
            return match self.pending_response(key)? {
                Some(response) => Ok(response),
                None => Err(StorageError::MapRootTooOld),
            };
        };

        let lookup = self
            .map
            .get_leaves_at_revision(self.config.map, std::slice::from_ref(key), descriptor.revision)
            .await?;
        let leaf = single_leaf(&lookup)?;

        if !leaf.is_present() {
            if let Some(response) = self.pending_response(key)? {
                return Ok(response);
            }
        }

        let log_consistency = if trusted_size != 0 && descriptor.log_size > trusted_size {
            self.log
                .consistency_proof(self.config.anchor_log, trusted_size, descriptor.log_size)
                .await?
        } else {
            Vec::new()
        };

        let signed_map_root = lookup.root.encode().map_err(StorageError::from)?;
        self.assemble_merged(
            key,
            leaf,
            signed_map_root,
            descriptor.log_signed_root,
            descriptor.log_inclusion,
            log_consistency,
        )
    }

    /// Read `key` at the map's latest revision, certifying the root against
    /// the anchor log live instead of trusting a cached descriptor.
    ///
    /// The map recomputes its root before the log records it; when that race
    /// is observed (the fresh root is not yet anchored), the revision
    /// stabilizer walks `goodrev` downward over older revisions until it
    /// finds one the log anchors, or fails with
    /// [`StorageError::CertificationGap`] once the scan underflows.
    pub async fn get_live(&self, key: &MapKey) -> StorageResult<GetResponse> {
        let lookup = self
            .map
            .get_leaves(self.config.map, std::slice::from_ref(key))
            .await?;
        let leaf = single_leaf(&lookup)?;

        if !leaf.is_present() {
            if let Some(response) = self.pending_response(key)? {
                return Ok(response);
            }
        }

        let log_root = self.log.latest_signed_root(self.config.anchor_log).await?;
        let encoded_root = lookup.root.encode().map_err(StorageError::from)?;
        let root_leaf_hash = ContentHasher::MAP_ROOT.hash(&encoded_root);
        match self
            .log
            .inclusion_proof(self.config.anchor_log, &root_leaf_hash, log_root.tree_size)
            .await
        {
            Ok(log_inclusion) => {
                self.goodrev
                    .store(lookup.root.revision as i64, Ordering::Relaxed);
                let signed_log_root = log_root.encode().map_err(StorageError::from)?;
                self.assemble_merged(
                    key,
                    leaf,
                    encoded_root,
                    signed_log_root,
                    log_inclusion,
                    Vec::new(),
                )
            }
            Err(TreeError::NotFound) => {
                debug!(
                    revision = lookup.root.revision,
                    "fresh map root not yet anchored; falling back to older revisions"
                );
                self.stabilize(key).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Walk `goodrev` downward until a revision's root is found anchored.
    async fn stabilize(&self, key: &MapKey) -> StorageResult<GetResponse> {
        let mut revision = self.goodrev.load(Ordering::Relaxed);
        loop {
            if revision < 0 {
                warn!("revision fallback scan exhausted without an anchored root");
                return Err(StorageError::CertificationGap);
            }
            if let Some(response) = self.certify_at_revision(key, revision as u64).await? {
                self.goodrev.store(revision, Ordering::Relaxed);
                return Ok(response);
            }
            revision -= 1;
            if revision >= 0 {
                // The shared hint decreases only here, during the scan.
                self.goodrev.store(revision, Ordering::Relaxed);
            }
        }
    }

    /// Attempt a fully certified answer pinned at `revision`.
    ///
    /// Returns `Ok(None)` when the log does not anchor that revision's root
    /// (or the map no longer serves the revision); the scan continues.
    async fn certify_at_revision(
        &self,
        key: &MapKey,
        revision: u64,
    ) -> StorageResult<Option<GetResponse>> {
        let lookup = match self
            .map
            .get_leaves_at_revision(self.config.map, std::slice::from_ref(key), revision)
            .await
        {
            Ok(lookup) => lookup,
            Err(TreeError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let leaf = single_leaf(&lookup)?;

        if !leaf.is_present() {
            if let Some(response) = self.pending_response(key)? {
                return Ok(Some(response));
            }
        }

        let log_root = self.log.latest_signed_root(self.config.anchor_log).await?;
        let encoded_root = lookup.root.encode().map_err(StorageError::from)?;
        let root_leaf_hash = ContentHasher::MAP_ROOT.hash(&encoded_root);
        match self
            .log
            .inclusion_proof(self.config.anchor_log, &root_leaf_hash, log_root.tree_size)
            .await
        {
            Ok(log_inclusion) => {
                let signed_log_root = log_root.encode().map_err(StorageError::from)?;
                let response = self.assemble_merged(
                    key,
                    leaf,
                    encoded_root,
                    signed_log_root,
                    log_inclusion,
                    Vec::new(),
                )?;
                Ok(Some(response))
            }
            Err(TreeError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Answer from the promise registry, re-resolving the pending value
    /// through the object store.
    fn pending_response(&self, key: &MapKey) -> StorageResult<Option<GetResponse>> {
        let Some(pending) = self.promises.get(key) else {
            return Ok(None);
        };
        let value = self
            .store
            .retrieve(&pending.value_hash)
            .map_err(integrity_on_miss)?;
        Ok(Some(GetResponse::unmerged(pending.promise, value)))
    }

    /// Build a merged response (absent or present) from a certified lookup.
    ///
    /// A present leaf names a content hash; the real bytes come from the
    /// object store, and a miss there is a fatal integrity violation. Once
    /// the merged value is served, any pending promise for the key is
    /// superseded and evicted.
    fn assemble_merged(
        &self,
        key: &MapKey,
        leaf: &MapLeafInclusion,
        signed_map_root: Vec<u8>,
        signed_log_root: Vec<u8>,
        log_inclusion: Vec<u8>,
        log_consistency: Vec<Vec<u8>>,
    ) -> StorageResult<GetResponse> {
        let mut response = GetResponse {
            signed_map_root: Some(signed_map_root),
            map_inclusion: Some(leaf.proof.clone()),
            signed_log_root: Some(signed_log_root),
            log_inclusion: Some(log_inclusion),
            log_consistency,
            ..Default::default()
        };
        if let Some(leaf_bytes) = &leaf.leaf_value {
            let hash = leaf_content_hash(leaf_bytes)?;
            let value = self.store.retrieve(&hash).map_err(integrity_on_miss)?;
            if self.promises.remove(key).is_some() {
                debug!(key = ?key, "merge observed; superseded promise evicted");
            }
            response.value = Some(value);
        }
        Ok(response)
    }

    // -----------------------------------------------------------------------
    // Queue index resolution
    // -----------------------------------------------------------------------

    /// Whether slot `index` of the queue exists in the map.
    pub async fn queue_exists(&self, queue_id: QueueId, index: i64) -> StorageResult<bool> {
        let key = queue_slot_key(&queue_id, index);
        let lookup = self
            .map
            .get_leaves(self.config.map, std::slice::from_ref(&key))
            .await?;
        Ok(lookup
            .inclusions
            .first()
            .map(MapLeafInclusion::is_present)
            .unwrap_or(false))
    }

    /// Highest existing slot index of the queue, or −1 when empty.
    ///
    /// Memoized per queue id; searches cost O(log n) probes on a cold
    /// cache and nothing afterwards. An empty result is not cached, since
    /// the first append changes it.
    pub async fn queue_index(&self, queue_id: QueueId) -> StorageResult<i64> {
        if let Some(index) = self.queue_index.get(&queue_id) {
            return Ok(index);
        }
        let index = resolve_tail(|i| self.queue_exists(queue_id, i)).await?;
        if index >= 0 {
            self.queue_index.set(queue_id, index);
        }
        Ok(index)
    }

    /// Short-circuit future probing for callers that know the true tail
    /// (e.g. they just appended slot `index`).
    pub fn set_queue_index(&self, queue_id: QueueId, index: i64) {
        self.queue_index.set(queue_id, index);
    }
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("config", &self.config)
            .field("pending_promises", &self.promises.len())
            .finish()
    }
}

fn single_leaf(lookup: &MapLookup) -> StorageResult<&MapLeafInclusion> {
    lookup
        .inclusions
        .first()
        .ok_or_else(|| StorageError::Transport("map lookup returned no leaves".into()))
}

fn leaf_content_hash(leaf_bytes: &[u8]) -> StorageResult<ContentHash> {
    let digest: [u8; 32] = leaf_bytes
        .try_into()
        .map_err(|_| StorageError::Serialization("map leaf is not a 32-byte content hash".into()))?;
    Ok(ContentHash::from_digest(digest))
}

fn integrity_on_miss(err: StoreError) -> StorageError {
    match err {
        StoreError::NotFound(hash) => StorageError::Integrity { hash },
        other => StorageError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vkv_store::InMemoryObjectStore;
    use vkv_trees::memory::verify_map_inclusion;
    use vkv_trees::{InMemoryTransparency, SignedMapRoot};
    use vkv_types::TreeId;

    const OPS: TreeId = TreeId::new(1);
    const MAP: TreeId = TreeId::new(2);
    const ANCHOR: TreeId = TreeId::new(3);

    struct Harness {
        service: StorageService,
        transparency: Arc<InMemoryTransparency>,
        store: Arc<InMemoryObjectStore>,
    }

    fn harness() -> Harness {
        let transparency = Arc::new(InMemoryTransparency::new());
        let store = Arc::new(InMemoryObjectStore::new());
        let service = StorageService::new(
            ServiceConfig::default(),
            PromiseSigner::new(SigningKey::generate()),
            store.clone(),
            transparency.clone(),
            transparency.clone(),
        );
        Harness {
            service,
            transparency,
            store,
        }
    }

    fn key(bytes: &[u8]) -> MapKey {
        MapKey::new(bytes.to_vec())
    }

    /// Play the external merge process for one promised write: move the
    /// leaf into the map, anchor the new root, and record the descriptor.
    fn merge_externally(h: &Harness, key: &MapKey, value_hash: ContentHash) {
        h.transparency
            .stage(MAP, key.clone(), value_hash.as_bytes().to_vec());
        let desc = h.transparency.merge_staged(MAP, ANCHOR).unwrap();
        h.store.set_cached_root(desc).unwrap();
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn insert_returns_verifiable_promise() {
        let h = harness();
        let promise = h.service.insert(key(b"k"), b"value".to_vec()).await.unwrap();
        assert_eq!(promise.value_hash, ContentHasher::VALUE.hash(b"value"));
        assert!(vkv_crypto::signer::verify_promise(&promise).is_ok());
        assert_eq!(h.service.pending_promises(), 1);
    }

    #[tokio::test]
    async fn insert_persists_value_and_appends_log_record() {
        let h = harness();
        h.service.insert(key(b"k"), b"value".to_vec()).await.unwrap();

        let hash = ContentHasher::VALUE.hash(b"value");
        assert_eq!(h.store.retrieve(&hash).unwrap(), b"value");
        let llr = h.transparency.latest_signed_root(OPS).await.unwrap();
        assert_eq!(llr.tree_size, 1);
    }

    #[tokio::test]
    async fn bad_key_material_fails_construction() {
        let transparency = Arc::new(InMemoryTransparency::new());
        let store = Arc::new(InMemoryObjectStore::new());
        let result = StorageService::from_key_bytes(
            ServiceConfig::default(),
            b"short",
            store,
            transparency.clone(),
            transparency,
        );
        assert!(matches!(result, Err(StorageError::Signing(_))));
    }

    // -----------------------------------------------------------------------
    // Read path: unmerged
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn get_before_merge_is_unmerged_with_original_bytes() {
        let h = harness();
        h.service.insert(key(b"k"), b"original".to_vec()).await.unwrap();

        let response = h.service.get(&key(b"k"), 0).await.unwrap();
        assert!(response.unmerged);
        assert_eq!(response.value.as_deref(), Some(b"original".as_slice()));
        assert!(response.promise.is_some());
        assert!(!response.is_proven());
    }

    #[tokio::test]
    async fn unmerged_wins_even_with_cached_root_present() {
        let h = harness();
        // Anchor an empty revision so a descriptor exists.
        let desc = h.transparency.merge_staged(MAP, ANCHOR).unwrap();
        h.store.set_cached_root(desc).unwrap();

        h.service.insert(key(b"k"), b"pending".to_vec()).await.unwrap();
        let response = h.service.get(&key(b"k"), 0).await.unwrap();
        assert!(response.unmerged);
        assert_eq!(response.value.as_deref(), Some(b"pending".as_slice()));
    }

    #[tokio::test]
    async fn pending_value_missing_from_store_is_integrity_error() {
        let h = harness();
        h.service.insert(key(b"k"), b"value".to_vec()).await.unwrap();
        h.store.clear();

        let result = h.service.get(&key(b"k"), 0).await;
        assert!(matches!(result, Err(StorageError::Integrity { .. })));
    }

    // -----------------------------------------------------------------------
    // Read path: map root too old
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn no_root_and_no_promise_is_map_root_too_old() {
        let h = harness();
        let result = h.service.get(&key(b"absent"), 0).await;
        assert!(matches!(result, Err(StorageError::MapRootTooOld)));
    }

    #[tokio::test]
    async fn adding_a_promise_flips_map_root_too_old() {
        let h = harness();
        assert!(matches!(
            h.service.get(&key(b"k"), 0).await,
            Err(StorageError::MapRootTooOld)
        ));
        h.service.insert(key(b"k"), b"v".to_vec()).await.unwrap();
        assert!(h.service.get(&key(b"k"), 0).await.unwrap().unmerged);
    }

    #[tokio::test]
    async fn adding_a_cached_root_flips_map_root_too_old() {
        let h = harness();
        let desc = h.transparency.merge_staged(MAP, ANCHOR).unwrap();
        h.store.set_cached_root(desc).unwrap();

        // Same key, still no promise: now a proof-backed absence, not an error.
        let response = h.service.get(&key(b"absent"), 0).await.unwrap();
        assert!(!response.unmerged);
        assert!(response.is_proven());
        assert!(response.value.is_none());
    }

    // -----------------------------------------------------------------------
    // Read path: merged
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn merged_get_returns_proven_value_and_evicts_promise() {
        let h = harness();
        let promise = h.service.insert(key(b"k"), b"payload".to_vec()).await.unwrap();
        merge_externally(&h, &key(b"k"), promise.value_hash);

        let response = h.service.get(&key(b"k"), 0).await.unwrap();
        assert!(!response.unmerged);
        assert_eq!(response.value.as_deref(), Some(b"payload".as_slice()));
        assert!(response.is_proven());
        assert!(response.signed_log_root.is_some());
        assert!(response.log_inclusion.is_some());

        // Inclusion proof verifies against the returned root, over the
        // leaf's content hash.
        assert!(verify_map_inclusion(
            response.signed_map_root.as_deref().unwrap(),
            &key(b"k"),
            Some(promise.value_hash.as_bytes()),
            response.map_inclusion.as_deref().unwrap(),
        ));

        // The promise is superseded by the proof-backed answer.
        assert_eq!(h.service.pending_promises(), 0);
        let again = h.service.get(&key(b"k"), 0).await.unwrap();
        assert!(!again.unmerged);
    }

    #[tokio::test]
    async fn reads_stay_pinned_at_descriptor_revision() {
        let h = harness();
        let p1 = h.service.insert(key(b"k1"), b"v1".to_vec()).await.unwrap();
        merge_externally(&h, &key(b"k1"), p1.value_hash);

        // The map advances past the cached descriptor.
        let p2 = h.service.insert(key(b"k2"), b"v2".to_vec()).await.unwrap();
        h.transparency
            .stage(MAP, key(b"k2"), p2.value_hash.as_bytes().to_vec());
        h.transparency.merge_staged_unanchored(MAP).unwrap();

        // k2 is absent at the pinned revision, so its promise answers.
        let response = h.service.get(&key(b"k2"), 0).await.unwrap();
        assert!(response.unmerged);

        // k1 remains proof-backed at the pinned revision.
        let response = h.service.get(&key(b"k1"), 0).await.unwrap();
        let root = SignedMapRoot::decode(response.signed_map_root.as_deref().unwrap()).unwrap();
        assert_eq!(root.revision, 1);
    }

    #[tokio::test]
    async fn merged_leaf_without_backing_object_is_integrity_error() {
        let h = harness();
        // A leaf referencing bytes the store never received.
        let orphan = ContentHash::from_bytes(b"never persisted");
        h.transparency
            .stage(MAP, key(b"k"), orphan.as_bytes().to_vec());
        let desc = h.transparency.merge_staged(MAP, ANCHOR).unwrap();
        h.store.set_cached_root(desc).unwrap();

        let result = h.service.get(&key(b"k"), 0).await;
        match result {
            Err(StorageError::Integrity { hash }) => assert_eq!(hash, orphan),
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Consistency proofs
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn consistency_proof_presence_follows_trusted_size() {
        let h = harness();
        let promise = h.service.insert(key(b"k"), b"v".to_vec()).await.unwrap();
        merge_externally(&h, &key(b"k"), promise.value_hash);
        // Second anchored revision: the anchor log now has size 2.
        let desc = h.transparency.merge_staged(MAP, ANCHOR).unwrap();
        assert_eq!(desc.log_size, 2);
        h.store.set_cached_root(desc).unwrap();

        // No trusted size: no proof.
        let response = h.service.get(&key(b"k"), 0).await.unwrap();
        assert!(response.log_consistency.is_empty());

        // Caught up: no proof.
        let response = h.service.get(&key(b"k"), 2).await.unwrap();
        assert!(response.log_consistency.is_empty());

        // Strictly behind: proof covering [1, 2].
        let response = h.service.get(&key(b"k"), 1).await.unwrap();
        assert!(!response.log_consistency.is_empty());
    }

    // -----------------------------------------------------------------------
    // Live certification and the revision stabilizer
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn get_live_certifies_latest_root() {
        let h = harness();
        let promise = h.service.insert(key(b"k"), b"v".to_vec()).await.unwrap();
        // Anchor the merge but deliberately skip the descriptor cache.
        h.transparency
            .stage(MAP, key(b"k"), promise.value_hash.as_bytes().to_vec());
        h.transparency.merge_staged(MAP, ANCHOR).unwrap();

        let response = h.service.get_live(&key(b"k")).await.unwrap();
        assert!(!response.unmerged);
        assert_eq!(response.value.as_deref(), Some(b"v".as_slice()));
        assert!(response.is_proven());
    }

    #[tokio::test]
    async fn stabilizer_falls_back_to_last_anchored_revision() {
        let h = harness();
        let promise = h.service.insert(key(b"k"), b"v".to_vec()).await.unwrap();
        h.transparency
            .stage(MAP, key(b"k"), promise.value_hash.as_bytes().to_vec());
        h.transparency.merge_staged(MAP, ANCHOR).unwrap();

        // Teach the service that revision 1 is anchored.
        h.service.get_live(&key(b"k")).await.unwrap();

        // The map advances to revision 2, but the log lags behind.
        h.transparency
            .stage(MAP, key(b"other"), ContentHash::from_bytes(b"x").as_bytes().to_vec());
        h.transparency.merge_staged_unanchored(MAP).unwrap();

        let response = h.service.get_live(&key(b"k")).await.unwrap();
        assert!(!response.unmerged);
        assert_eq!(response.value.as_deref(), Some(b"v".as_slice()));
        let root = SignedMapRoot::decode(response.signed_map_root.as_deref().unwrap()).unwrap();
        assert_eq!(root.revision, 1);
    }

    #[tokio::test]
    async fn scan_underflow_is_certification_gap() {
        let h = harness();
        let promise = h.service.insert(key(b"k"), b"v".to_vec()).await.unwrap();
        h.transparency
            .stage(MAP, key(b"k"), promise.value_hash.as_bytes().to_vec());
        // Published but never anchored: nothing in the log certifies any root.
        h.transparency.merge_staged_unanchored(MAP).unwrap();
        // Without the promise path, the read must fail closed.
        h.service.promises.remove(&key(b"k"));

        let result = h.service.get_live(&key(b"k")).await;
        assert!(matches!(result, Err(StorageError::CertificationGap)));
    }

    #[tokio::test]
    async fn stabilizer_still_answers_pending_keys() {
        let h = harness();
        h.transparency
            .stage(MAP, key(b"other"), ContentHash::from_bytes(b"x").as_bytes().to_vec());
        h.transparency.merge_staged_unanchored(MAP).unwrap();

        h.service.insert(key(b"k"), b"pending".to_vec()).await.unwrap();
        let response = h.service.get_live(&key(b"k")).await.unwrap();
        assert!(response.unmerged);
        assert_eq!(response.value.as_deref(), Some(b"pending".as_slice()));
    }

    // -----------------------------------------------------------------------
    // Concurrent writes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn concurrent_same_key_inserts_have_one_winner_per_run() {
        let h = Arc::new(harness());

        let a = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.service.insert(key(b"k"), b"value-a".to_vec()).await })
        };
        let b = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.service.insert(key(b"k"), b"value-b".to_vec()).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // One pending promise remains, and reads agree with it.
        assert_eq!(h.service.pending_promises(), 1);
        let first = h.service.get(&key(b"k"), 0).await.unwrap();
        let winner_hash = first.promise.as_ref().unwrap().value_hash;
        assert_eq!(
            ContentHasher::VALUE.hash(first.value.as_deref().unwrap()),
            winner_hash
        );
        let second = h.service.get(&key(b"k"), 0).await.unwrap();
        assert_eq!(second.promise.unwrap().value_hash, winner_hash);
    }

    // -----------------------------------------------------------------------
    // Queue index resolution
    // -----------------------------------------------------------------------

    fn populate_queue(h: &Harness, queue_id: QueueId, count: i64) {
        for index in 0..count {
            h.transparency
                .stage(MAP, queue_slot_key(&queue_id, index), vec![1]);
        }
        h.transparency.merge_staged_unanchored(MAP).unwrap();
    }

    #[tokio::test]
    async fn empty_queue_resolves_to_minus_one() {
        let h = harness();
        let queue_id = QueueId::derive(b"empty");
        assert_eq!(h.service.queue_index(queue_id).await.unwrap(), -1);

        // An empty result is not cached: the first append changes it.
        populate_queue(&h, queue_id, 1);
        assert_eq!(h.service.queue_index(queue_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn queue_tail_found_through_probing() {
        let h = harness();
        let queue_id = QueueId::derive(b"forty-two");
        populate_queue(&h, queue_id, 42);
        assert_eq!(h.service.queue_index(queue_id).await.unwrap(), 41);
    }

    #[tokio::test]
    async fn queue_index_is_memoized() {
        let h = harness();
        let queue_id = QueueId::derive(b"memo");
        populate_queue(&h, queue_id, 5);
        assert_eq!(h.service.queue_index(queue_id).await.unwrap(), 4);

        // The map grows, but the memo answers until a hint refreshes it.
        h.transparency
            .stage(MAP, queue_slot_key(&queue_id, 5), vec![1]);
        h.transparency.merge_staged_unanchored(MAP).unwrap();
        assert_eq!(h.service.queue_index(queue_id).await.unwrap(), 4);

        h.service.set_queue_index(queue_id, 5);
        assert_eq!(h.service.queue_index(queue_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn queue_exists_matches_membership() {
        let h = harness();
        let queue_id = QueueId::derive(b"membership");
        populate_queue(&h, queue_id, 3);
        assert!(h.service.queue_exists(queue_id, 0).await.unwrap());
        assert!(h.service.queue_exists(queue_id, 2).await.unwrap());
        assert!(!h.service.queue_exists(queue_id, 3).await.unwrap());
    }
}
