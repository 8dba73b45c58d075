//! Key-addressed blob storage.
//!
//! [`FileBlobStore`] keeps each blob as one file, named after its key, in a
//! flat directory. Writes are staged in a sibling temp file, synced, and then
//! moved into place in a single rename, so a concurrent reader sees either
//! the previous blob or the new one in full.
//!
//! Generic code programs against [`BlobStorage`]; [`InMemoryBlobStore`] is a
//! second implementation for tests and embedding.

pub mod error;
pub mod key;
pub mod local_store;
pub mod memory_store;
pub mod store;

pub use error::{BlobResult, BlobStoreError};
pub use local_store::FileBlobStore;
pub use memory_store::InMemoryBlobStore;
pub use store::{bytes_producer, BlobReader, BlobStorage, BlobStores, ContentProducer};
pub use tokio_util::sync::CancellationToken;
