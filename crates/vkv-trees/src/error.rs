use thiserror::Error;

/// Errors from transparency tree clients.
///
/// `NotFound` is a distinct outcome, not a transport failure: the log
/// answering "that leaf is not in the tree at this size" is load-bearing
/// control flow for the revision stabilizer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("not found")]
    NotFound,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),
}

/// Result alias for tree client operations.
pub type TreeResult<T> = Result<T, TreeError>;
