use blob_store::BlobStoreError;
use thiserror::Error;


#[derive(Debug, Error)]
pub enum BlobCliErr {
    #[error("Blob store operation failed: {0}")]
    Store(#[from] BlobStoreError),

    #[error("Failed to read input or write output: {0}")]
    Io(#[from] std::io::Error),
}
