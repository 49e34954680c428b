use vkv_crypto::SignatureError;
use vkv_store::StoreError;
use vkv_trees::TreeError;
use vkv_types::ContentHash;

/// Errors from the storage core, returned as values at the API boundary.
///
/// The taxonomy separates retryable conditions from fatal ones:
/// `Transport` failures belong to the caller's retry policy; `Integrity`
/// and `CertificationGap` are fatal for the request and must never be
/// papered over with stale data; `MapRootTooOld` means "try again once
/// sync catches up".
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Log, map, or object-store RPC failure. Propagated, not retried here.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A merged map leaf references an object the store does not hold.
    #[error("integrity violation: map leaf references missing object {hash}")]
    Integrity { hash: ContentHash },

    /// The revision fallback scan exhausted every known revision without
    /// finding one whose root the log anchors.
    #[error("certification gap: no map revision is anchored in the log")]
    CertificationGap,

    /// No certified map root is available and no promise is pending for
    /// the requested key. Retry once sync catches up.
    #[error("no recent certified map root and no pending promise for key")]
    MapRootTooOld,

    /// Bad signing key material; aborts a write before any state mutates.
    #[error("signing failure: {0}")]
    Signing(#[from] SignatureError),

    /// Object store failure other than a missing object.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// Wire payload could not be serialized or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<TreeError> for StorageError {
    fn from(err: TreeError) -> Self {
        match err {
            // NotFound is intercepted where it is meaningful control flow
            // (the stabilizer); anywhere else it is an unexpected answer
            // from the tree.
            TreeError::NotFound => StorageError::Transport("unexpected not-found from tree".into()),
            TreeError::Transport(msg) => StorageError::Transport(msg),
            TreeError::Decode(msg) => StorageError::Serialization(msg),
        }
    }
}

/// Result alias for storage core operations.
pub type StorageResult<T> = Result<T, StorageError>;
