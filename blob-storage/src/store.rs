use std::io::Write;
use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use crate::error::{BlobResult, BlobStoreError};
use crate::local_store::FileBlobStore;
use crate::memory_store::InMemoryBlobStore;

/// Caller-supplied logic that emits a blob's bytes into the provided sink.
pub type ContentProducer =
    Box<dyn FnOnce(&mut dyn Write, &CancellationToken) -> BlobResult<()> + Send + 'static>;

/// Readable handle returned to the caller, who owns it from then on.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Wraps a fixed byte buffer as a [`ContentProducer`].
pub fn bytes_producer(data: impl Into<Vec<u8>>) -> ContentProducer {
    let data = data.into();
    Box::new(move |sink: &mut dyn Write, _cancel: &CancellationToken| -> BlobResult<()> {
        sink.write_all(&data)?;
        Ok(())
    })
}

pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> BlobResult<()> {
    if cancel.is_cancelled() {
        return Err(BlobStoreError::Cancelled);
    }
    Ok(())
}

/// Keyed blob storage: existence checks, reads, writes and deletes.
///
/// Absence is never an error. `exists` and `delete` report `false`,
/// `try_read` reports `None`, and a write that finds the key taken while
/// `overwrite` is off reports `false`.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn exists(&self, key: &str, cancel: &CancellationToken) -> BlobResult<bool>;

    /// Opens the blob for reading, or `None` if it does not exist.
    async fn try_read(&self, key: &str, cancel: &CancellationToken) -> BlobResult<Option<BlobReader>>;

    /// Stores the producer's output under `key`.
    ///
    /// Returns `true` once the new content is visible, `false` if `overwrite`
    /// is off and the key already holds a blob.
    async fn write(
        &self,
        key: &str,
        overwrite: bool,
        cancel: &CancellationToken,
        producer: ContentProducer,
    ) -> BlobResult<bool>;

    /// Removes the blob. `false` if there was nothing to remove.
    async fn delete(&self, key: &str, cancel: &CancellationToken) -> BlobResult<bool>;

    async fn create(
        &self,
        key: &str,
        cancel: &CancellationToken,
        producer: ContentProducer,
    ) -> BlobResult<bool> {
        self.write(key, false, cancel, producer).await
    }

    async fn create_or_update(
        &self,
        key: &str,
        cancel: &CancellationToken,
        producer: ContentProducer,
    ) -> BlobResult<bool> {
        self.write(key, true, cancel, producer).await
    }

    /// Same as [`BlobStorage::create_or_update`].
    async fn update(
        &self,
        key: &str,
        cancel: &CancellationToken,
        producer: ContentProducer,
    ) -> BlobResult<bool> {
        self.create_or_update(key, cancel, producer).await
    }
}

#[derive(Debug, Clone)]
pub enum BlobStores {
    Local(FileBlobStore),
    Memory(InMemoryBlobStore),
}

impl BlobStores {
    /// Returns a reference to the inner value as a trait object.
    pub fn as_trait(&self) -> &dyn BlobStorage {
        match self {
            BlobStores::Local(a) => a,
            BlobStores::Memory(b) => b,
        }
    }
}
