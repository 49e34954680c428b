use std::sync::Arc;

use async_trait::async_trait;
use vkv_types::{ContentHash, MapKey, TreeId};

use crate::error::TreeResult;
use crate::types::{Ack, MapLookup, SignedLogRoot};

/// Client for an external append-only log service.
///
/// Any call may block on the network; this layer imposes no timeout or
/// retry of its own, and cancellation must be threaded through by the
/// caller. Transport failures are propagated, never retried here.
#[async_trait]
pub trait LogClient: Send + Sync {
    /// Append a payload to the log. Ordering is defined by log sequence.
    async fn append(&self, log_id: TreeId, payload: &[u8]) -> TreeResult<Ack>;

    /// The log's latest signed root.
    async fn latest_signed_root(&self, log_id: TreeId) -> TreeResult<SignedLogRoot>;

    /// Prove that `leaf_hash` is included in the log at `tree_size`.
    ///
    /// Returns `TreeError::NotFound` when the leaf is not present at that
    /// size, a normal outcome during the map/log anchoring race.
    async fn inclusion_proof(
        &self,
        log_id: TreeId,
        leaf_hash: &ContentHash,
        tree_size: u64,
    ) -> TreeResult<Vec<u8>>;

    /// Prove that the log state at `second_size` extends the state at
    /// `first_size`. Hashes cover exactly `[first_size, second_size]`.
    async fn consistency_proof(
        &self,
        log_id: TreeId,
        first_size: u64,
        second_size: u64,
    ) -> TreeResult<Vec<Vec<u8>>>;
}

/// Client for an external versioned sparse map service.
#[async_trait]
pub trait MapClient: Send + Sync {
    /// Look up keys at the map's latest revision.
    async fn get_leaves(&self, map_id: TreeId, keys: &[MapKey]) -> TreeResult<MapLookup>;

    /// Look up keys pinned at a specific revision.
    async fn get_leaves_at_revision(
        &self,
        map_id: TreeId,
        keys: &[MapKey],
        revision: u64,
    ) -> TreeResult<MapLookup>;
}

#[async_trait]
impl<T: LogClient + ?Sized> LogClient for Arc<T> {
    async fn append(&self, log_id: TreeId, payload: &[u8]) -> TreeResult<Ack> {
        (**self).append(log_id, payload).await
    }

    async fn latest_signed_root(&self, log_id: TreeId) -> TreeResult<SignedLogRoot> {
        (**self).latest_signed_root(log_id).await
    }

    async fn inclusion_proof(
        &self,
        log_id: TreeId,
        leaf_hash: &ContentHash,
        tree_size: u64,
    ) -> TreeResult<Vec<u8>> {
        (**self).inclusion_proof(log_id, leaf_hash, tree_size).await
    }

    async fn consistency_proof(
        &self,
        log_id: TreeId,
        first_size: u64,
        second_size: u64,
    ) -> TreeResult<Vec<Vec<u8>>> {
        (**self).consistency_proof(log_id, first_size, second_size).await
    }
}

#[async_trait]
impl<T: MapClient + ?Sized> MapClient for Arc<T> {
    async fn get_leaves(&self, map_id: TreeId, keys: &[MapKey]) -> TreeResult<MapLookup> {
        (**self).get_leaves(map_id, keys).await
    }

    async fn get_leaves_at_revision(
        &self,
        map_id: TreeId,
        keys: &[MapKey],
        revision: u64,
    ) -> TreeResult<MapLookup> {
        (**self).get_leaves_at_revision(map_id, keys, revision).await
    }
}
