use thiserror::Error;
use tokio::task::JoinError;

pub type BlobResult<T> = Result<T, BlobStoreError>;

/// Failures surfaced by blob store operations.
///
/// "Not found" and "already exists" are not errors: they are reported as
/// `false` / `None` results by the operations themselves.
#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Blocking storage task failed: {0}")]
    Task(#[from] JoinError),
}

impl BlobStoreError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        BlobStoreError::InvalidArgument(msg.into())
    }
}
