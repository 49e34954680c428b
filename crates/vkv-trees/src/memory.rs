use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;
use vkv_crypto::{ContentHasher, SigningKey};
use vkv_types::{ContentHash, MapKey, SmrDescriptor, TreeId};

use crate::error::{TreeError, TreeResult};
use crate::traits::{LogClient, MapClient};
use crate::types::{Ack, MapLeafInclusion, MapLookup, SignedLogRoot, SignedMapRoot};

/// In-process transparency service implementing both [`LogClient`] and
/// [`MapClient`], for tests and embedding.
///
/// Logs are plain append-only leaf-hash chains. The map holds a full
/// key-space snapshot per revision; `stage` collects pending writes and
/// `merge_staged` publishes them as the next revision, playing the role of
/// the external merge process. `merge_staged_unanchored` publishes a
/// revision without recording its root in the anchor log, which reproduces
/// the race the revision stabilizer exists to reconcile.
///
/// Proof blobs are deterministic digests, not real Merkle paths. They are
/// opaque to the storage layer either way; [`verify_map_inclusion`] is the
/// fake's stand-in for the external tree verifier.
pub struct InMemoryTransparency {
    key: SigningKey,
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    logs: HashMap<TreeId, Vec<ContentHash>>,
    maps: HashMap<TreeId, MapState>,
}

struct MapState {
    staged: BTreeMap<MapKey, Vec<u8>>,
    revisions: Vec<MapRevision>,
}

struct MapRevision {
    entries: HashMap<MapKey, Vec<u8>>,
    root: SignedMapRoot,
}

impl InMemoryTransparency {
    pub fn new() -> Self {
        Self {
            key: SigningKey::generate(),
            inner: Mutex::new(State::default()),
        }
    }

    /// Stage a map write for the next merge.
    pub fn stage(&self, map_id: TreeId, key: MapKey, value: Vec<u8>) {
        let mut state = self.inner.lock().expect("lock poisoned");
        let map = ensure_map(&mut state.maps, map_id, &self.key);
        map.staged.insert(key, value);
    }

    /// Publish staged writes as a new revision and anchor its root in the
    /// given log. Returns the descriptor a root observer would persist.
    pub fn merge_staged(
        &self,
        map_id: TreeId,
        anchor_log_id: TreeId,
    ) -> TreeResult<SmrDescriptor> {
        let revision = self.merge_staged_unanchored(map_id)?;
        self.anchor_revision(map_id, revision, anchor_log_id)
    }

    /// Publish staged writes as a new revision without anchoring it.
    ///
    /// The map has then advanced past what the anchor log certifies.
    pub fn merge_staged_unanchored(&self, map_id: TreeId) -> TreeResult<u64> {
        let mut state = self.inner.lock().expect("lock poisoned");
        let map = ensure_map(&mut state.maps, map_id, &self.key);

        let mut entries = map
            .revisions
            .last()
            .map(|rev| rev.entries.clone())
            .unwrap_or_default();
        for (key, value) in std::mem::take(&mut map.staged) {
            entries.insert(key, value);
        }
        let revision = map.revisions.len() as u64;
        let root = sign_map_root(&self.key, revision, &entries);
        debug!(revision, entries = entries.len(), "published map revision");
        map.revisions.push(MapRevision { entries, root });
        Ok(revision)
    }

    /// Anchor an already-published revision's root in the given log.
    pub fn anchor_revision(
        &self,
        map_id: TreeId,
        revision: u64,
        anchor_log_id: TreeId,
    ) -> TreeResult<SmrDescriptor> {
        let mut state = self.inner.lock().expect("lock poisoned");
        let root = state
            .maps
            .get(&map_id)
            .and_then(|m| m.revisions.get(revision as usize))
            .map(|rev| rev.root.clone())
            .ok_or(TreeError::NotFound)?;

        let encoded = root.encode()?;
        let leaf_hash = ContentHasher::MAP_ROOT.hash(&encoded);
        let log = state.logs.entry(anchor_log_id).or_default();
        log.push(leaf_hash);

        let tree_size = log.len() as u64;
        let signed_root = sign_log_root(&self.key, log, tree_size);
        let inclusion = log_inclusion_blob(&signed_root.root_hash, &leaf_hash);
        debug!(revision, tree_size, "anchored map root");
        Ok(SmrDescriptor::new(
            revision,
            tree_size,
            signed_root.encode()?,
            inclusion,
        ))
    }
}

impl Default for InMemoryTransparency {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogClient for InMemoryTransparency {
    async fn append(&self, log_id: TreeId, payload: &[u8]) -> TreeResult<Ack> {
        let leaf_hash = ContentHasher::LOG_LEAF.hash(payload);
        let mut state = self.inner.lock().expect("lock poisoned");
        state.logs.entry(log_id).or_default().push(leaf_hash);
        Ok(Ack { leaf_hash })
    }

    async fn latest_signed_root(&self, log_id: TreeId) -> TreeResult<SignedLogRoot> {
        let state = self.inner.lock().expect("lock poisoned");
        let leaves = state.logs.get(&log_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(sign_log_root(&self.key, leaves, leaves.len() as u64))
    }

    async fn inclusion_proof(
        &self,
        log_id: TreeId,
        leaf_hash: &ContentHash,
        tree_size: u64,
    ) -> TreeResult<Vec<u8>> {
        let state = self.inner.lock().expect("lock poisoned");
        let leaves = state.logs.get(&log_id).map(Vec::as_slice).unwrap_or(&[]);
        if tree_size as usize > leaves.len() {
            return Err(TreeError::Transport(format!(
                "tree size {tree_size} beyond log length {}",
                leaves.len()
            )));
        }
        if !leaves[..tree_size as usize].contains(leaf_hash) {
            return Err(TreeError::NotFound);
        }
        let root_hash = chain_root(&leaves[..tree_size as usize]);
        Ok(log_inclusion_blob(&root_hash, leaf_hash))
    }

    async fn consistency_proof(
        &self,
        log_id: TreeId,
        first_size: u64,
        second_size: u64,
    ) -> TreeResult<Vec<Vec<u8>>> {
        if first_size > second_size {
            return Err(TreeError::Transport(format!(
                "inverted consistency range [{first_size}, {second_size}]"
            )));
        }
        let state = self.inner.lock().expect("lock poisoned");
        let leaves = state.logs.get(&log_id).map(Vec::as_slice).unwrap_or(&[]);
        if second_size as usize > leaves.len() {
            return Err(TreeError::Transport(format!(
                "tree size {second_size} beyond log length {}",
                leaves.len()
            )));
        }
        if first_size == second_size {
            return Ok(Vec::new());
        }
        Ok(vec![
            chain_root(&leaves[..first_size as usize]).to_vec(),
            chain_root(&leaves[..second_size as usize]).to_vec(),
        ])
    }
}

#[async_trait]
impl MapClient for InMemoryTransparency {
    async fn get_leaves(&self, map_id: TreeId, keys: &[MapKey]) -> TreeResult<MapLookup> {
        let mut state = self.inner.lock().expect("lock poisoned");
        let map = ensure_map(&mut state.maps, map_id, &self.key);
        let revision = (map.revisions.len() - 1) as u64;
        lookup_at(map, keys, revision)
    }

    async fn get_leaves_at_revision(
        &self,
        map_id: TreeId,
        keys: &[MapKey],
        revision: u64,
    ) -> TreeResult<MapLookup> {
        let mut state = self.inner.lock().expect("lock poisoned");
        let map = ensure_map(&mut state.maps, map_id, &self.key);
        lookup_at(map, keys, revision)
    }
}

fn ensure_map<'a>(
    maps: &'a mut HashMap<TreeId, MapState>,
    map_id: TreeId,
    key: &SigningKey,
) -> &'a mut MapState {
    maps.entry(map_id).or_insert_with(|| {
        // Revision 0 is the empty key space, so lookups work before any merge.
        let entries = HashMap::new();
        let root = sign_map_root(key, 0, &entries);
        MapState {
            staged: BTreeMap::new(),
            revisions: vec![MapRevision { entries, root }],
        }
    })
}

fn lookup_at(map: &MapState, keys: &[MapKey], revision: u64) -> TreeResult<MapLookup> {
    let rev = map
        .revisions
        .get(revision as usize)
        .ok_or(TreeError::NotFound)?;
    let inclusions = keys
        .iter()
        .map(|key| {
            let leaf_value = rev.entries.get(key).cloned();
            let proof = map_inclusion_blob(&rev.root.root_hash, key, leaf_value.as_deref());
            MapLeafInclusion { leaf_value, proof }
        })
        .collect();
    Ok(MapLookup {
        inclusions,
        root: rev.root.clone(),
    })
}

fn sign_map_root(key: &SigningKey, revision: u64, entries: &HashMap<MapKey, Vec<u8>>) -> SignedMapRoot {
    let mut sorted: Vec<_> = entries.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"vkv-fake-map-root:");
    hasher.update(&revision.to_le_bytes());
    for (k, v) in sorted {
        hasher.update(&(k.len() as u64).to_le_bytes());
        hasher.update(k.as_bytes());
        hasher.update(&(v.len() as u64).to_le_bytes());
        hasher.update(v);
    }
    let root_hash = *hasher.finalize().as_bytes();

    let mut message = Vec::with_capacity(8 + 32);
    message.extend_from_slice(&revision.to_le_bytes());
    message.extend_from_slice(&root_hash);
    let signature = key.sign(&message);
    SignedMapRoot {
        revision,
        root_hash,
        signature: signature_bytes(&signature),
    }
}

fn sign_log_root(key: &SigningKey, leaves: &[ContentHash], tree_size: u64) -> SignedLogRoot {
    let root_hash = chain_root(&leaves[..tree_size as usize]);
    let mut message = Vec::with_capacity(8 + 32);
    message.extend_from_slice(&tree_size.to_le_bytes());
    message.extend_from_slice(&root_hash);
    let signature = key.sign(&message);
    SignedLogRoot {
        tree_size,
        root_hash,
        signature: signature_bytes(&signature),
    }
}

fn signature_bytes(signature: &vkv_crypto::Signature) -> Vec<u8> {
    serde_json::to_vec(signature).unwrap_or_default()
}

fn chain_root(leaves: &[ContentHash]) -> [u8; 32] {
    let mut acc = [0u8; 32];
    for leaf in leaves {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"vkv-fake-log-chain:");
        hasher.update(&acc);
        hasher.update(leaf.as_bytes());
        acc = *hasher.finalize().as_bytes();
    }
    acc
}

fn map_inclusion_blob(root_hash: &[u8; 32], key: &MapKey, leaf_value: Option<&[u8]>) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"vkv-fake-map-proof:");
    hasher.update(root_hash);
    hasher.update(&(key.len() as u64).to_le_bytes());
    hasher.update(key.as_bytes());
    match leaf_value {
        Some(value) => {
            hasher.update(&[1]);
            hasher.update(value);
        }
        None => {
            hasher.update(&[0]);
        }
    }
    hasher.finalize().as_bytes().to_vec()
}

fn log_inclusion_blob(root_hash: &[u8; 32], leaf_hash: &ContentHash) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"vkv-fake-log-proof:");
    hasher.update(root_hash);
    hasher.update(leaf_hash.as_bytes());
    hasher.finalize().as_bytes().to_vec()
}

/// Verify a fake map inclusion proof against a serialized signed map root.
///
/// Stand-in for the external tree verifier: recomputes the deterministic
/// proof digest and compares.
pub fn verify_map_inclusion(
    signed_map_root: &[u8],
    key: &MapKey,
    leaf_value: Option<&[u8]>,
    proof: &[u8],
) -> bool {
    match SignedMapRoot::decode(signed_map_root) {
        Ok(root) => map_inclusion_blob(&root.root_hash, key, leaf_value) == proof,
        Err(_) => false,
    }
}
