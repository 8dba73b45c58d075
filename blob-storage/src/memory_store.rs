use std::io::{Cursor, Write};
use std::sync::Arc;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use crate::error::{BlobResult, BlobStoreError};
use crate::key::validate_key;
use crate::store::{ensure_not_cancelled, BlobReader, BlobStorage, ContentProducer};

/// Blob store held entirely in memory, for tests and embedding.
///
/// Keys follow the same validation rules as [`crate::FileBlobStore`], so code
/// exercised against this store behaves the same on disk. Clones share the
/// same blobs.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<DashMap<String, Arc<[u8]>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStorage for InMemoryBlobStore {
    async fn exists(&self, key: &str, cancel: &CancellationToken) -> BlobResult<bool> {
        ensure_not_cancelled(cancel)?;
        validate_key(key)?;
        Ok(self.blobs.contains_key(key))
    }

    async fn try_read(&self, key: &str, cancel: &CancellationToken) -> BlobResult<Option<BlobReader>> {
        ensure_not_cancelled(cancel)?;
        validate_key(key)?;
        // Clone the Arc out so no shard lock outlives this call
        let blob = self.blobs.get(key).map(|entry| entry.value().clone());
        Ok(blob.map(|data| Box::new(Cursor::new(data)) as BlobReader))
    }

    async fn write(
        &self,
        key: &str,
        overwrite: bool,
        cancel: &CancellationToken,
        producer: ContentProducer,
    ) -> BlobResult<bool> {
        ensure_not_cancelled(cancel)?;
        validate_key(key)?;
        if !overwrite && self.blobs.contains_key(key) {
            return Ok(false);
        }

        let mut buffer = Vec::new();
        let sink: &mut dyn Write = &mut buffer;
        producer(sink, cancel).map_err(|e| {
            if cancel.is_cancelled() {
                BlobStoreError::Cancelled
            } else {
                e
            }
        })?;

        let data: Arc<[u8]> = buffer.into();
        match self.blobs.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if !overwrite {
                    return Ok(false);
                }
                occupied.insert(data);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(data);
            }
        }
        Ok(true)
    }

    async fn delete(&self, key: &str, cancel: &CancellationToken) -> BlobResult<bool> {
        ensure_not_cancelled(cancel)?;
        validate_key(key)?;
        Ok(self.blobs.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::bytes_producer;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_clones_share_blobs() {
        let store = InMemoryBlobStore::new();
        let other = store.clone();
        let cancel = CancellationToken::new();

        assert!(store.is_empty());
        store.create("k", &cancel, bytes_producer("shared")).await.unwrap();
        assert_eq!(other.len(), 1);
        assert!(other.exists("k", &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_reader_outlives_delete() {
        let store = InMemoryBlobStore::new();
        let cancel = CancellationToken::new();
        store.create("k", &cancel, bytes_producer("payload")).await.unwrap();

        let mut reader = store.try_read("k", &cancel).await.unwrap().unwrap();
        assert!(store.delete("k", &cancel).await.unwrap());

        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"payload");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_producer_stores_nothing() {
        let store = InMemoryBlobStore::new();
        let cancel = CancellationToken::new();

        let err = store
            .create_or_update(
                "k",
                &cancel,
                Box::new(|sink: &mut dyn Write, _: &CancellationToken| -> BlobResult<()> {
                    sink.write_all(b"partial")?;
                    Err(BlobStoreError::invalid("producer refused"))
                }),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BlobStoreError::InvalidArgument(_)));
        assert!(!store.exists("k", &cancel).await.unwrap());
    }
}
