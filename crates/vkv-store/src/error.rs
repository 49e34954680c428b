use vkv_types::ContentHash;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ContentHash),

    /// Attempted to write under a hash that does not match the data.
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        expected: ContentHash,
        computed: ContentHash,
    },

    /// Attempted to write under the null hash.
    #[error("cannot store object with null content hash")]
    NullHash,

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
