use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use crate::error::{BlobResult, BlobStoreError};
use crate::key;
use crate::store::{ensure_not_cancelled, BlobReader, BlobStorage, ContentProducer};

/// Blob store keeping one file per key in a flat directory.
///
/// Writes go to a uniquely named sibling temp file which is flushed to disk
/// and then moved onto the key's path, so readers only ever observe complete
/// blobs.
#[derive(Clone, Debug)]
pub struct FileBlobStore {
    base_path: PathBuf,
}

impl FileBlobStore {
    /// Opens a store rooted at `base_path`, creating the directory (and its
    /// parents) if needed. Calling it again for the same path is harmless.
    pub fn get_or_create(base_path: impl AsRef<Path>) -> BlobResult<Self> {
        let base_path = base_path.as_ref();
        if base_path.as_os_str().is_empty() {
            return Err(BlobStoreError::invalid("base path must not be empty"));
        }
        fs::create_dir_all(base_path)?;
        Ok(Self { base_path: base_path.to_path_buf() })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of the file backing `key`.
    pub fn resolve(&self, key: &str) -> BlobResult<PathBuf> {
        key::resolve(&self.base_path, key)
    }

    pub fn exists(&self, key: &str) -> BlobResult<bool> {
        Ok(self.resolve(key)?.is_file())
    }

    /// Opens the blob read-only. `None` if no blob is stored under `key`.
    ///
    /// The handle does not lock the file: other readers, and writers
    /// replacing the blob, proceed while it is open.
    pub fn read(&self, key: &str) -> BlobResult<Option<File>> {
        let path = self.resolve(key)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            // Windows refuses to open directories at all
            Err(_) if path.is_dir() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !file.metadata()?.is_file() {
            return Ok(None);
        }
        Ok(Some(file))
    }

    pub fn try_read(&self, key: &str) -> BlobResult<(bool, Option<File>)> {
        let file = self.read(key)?;
        Ok((file.is_some(), file))
    }

    pub fn read_to_vec(&self, key: &str) -> BlobResult<Option<Vec<u8>>> {
        let Some(mut file) = self.read(key)? else {
            return Ok(None);
        };
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Some(data))
    }

    /// Writes the producer's output under `key`.
    ///
    /// Returns `false` without touching the existing blob when `overwrite` is
    /// off and the key is taken. The temp file is removed on every exit path
    /// that did not move it into place.
    pub fn write<F>(
        &self,
        key: &str,
        overwrite: bool,
        cancel: &CancellationToken,
        producer: F,
    ) -> BlobResult<bool>
    where
        F: FnOnce(&mut dyn Write, &CancellationToken) -> BlobResult<()>,
    {
        ensure_not_cancelled(cancel)?;
        let target = self.resolve(key)?;
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)?;
        }
        let temp_path = key::temp_path_for(&target);

        if !overwrite && target.is_file() {
            debug!(key, "blob already exists, skipping write");
            return Ok(false);
        }

        let (temp, file) = TempFile::create(temp_path)?;
        let mut writer = BufWriter::new(file);
        let sink: &mut dyn Write = &mut writer;
        producer(sink, cancel).map_err(|e| {
            if cancel.is_cancelled() {
                BlobStoreError::Cancelled
            } else {
                e
            }
        })?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        let committed = if overwrite {
            temp.replace(&target)?
        } else {
            temp.persist_new(&target)?
        };
        if committed {
            debug!(key, overwrite, "blob committed");
        } else {
            debug!(key, "blob appeared during write, discarding new content");
        }
        Ok(committed)
    }

    pub fn create<F>(&self, key: &str, cancel: &CancellationToken, producer: F) -> BlobResult<bool>
    where
        F: FnOnce(&mut dyn Write, &CancellationToken) -> BlobResult<()>,
    {
        self.write(key, false, cancel, producer)
    }

    pub fn create_or_update<F>(
        &self,
        key: &str,
        cancel: &CancellationToken,
        producer: F,
    ) -> BlobResult<bool>
    where
        F: FnOnce(&mut dyn Write, &CancellationToken) -> BlobResult<()>,
    {
        self.write(key, true, cancel, producer)
    }

    /// Deletes the blob. Failures to remove it are logged and reported as
    /// `false`; only an invalid key is an error.
    pub fn delete(&self, key: &str) -> BlobResult<bool> {
        let path = self.resolve(key)?;
        if !path.is_file() {
            return Ok(false);
        }
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(key, error = %e, "failed to delete blob");
                }
                Ok(false)
            }
        }
    }

    async fn run_blocking<T, F>(&self, key: &str, cancel: &CancellationToken, op: F) -> BlobResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&FileBlobStore, &str) -> BlobResult<T> + Send + 'static,
    {
        ensure_not_cancelled(cancel)?;
        key::validate_key(key)?;
        let store = self.clone();
        let key = key.to_owned();
        tokio::task::spawn_blocking(move || op(&store, &key)).await?
    }
}

#[async_trait]
impl BlobStorage for FileBlobStore {
    async fn exists(&self, key: &str, cancel: &CancellationToken) -> BlobResult<bool> {
        self.run_blocking(key, cancel, |store, key| store.exists(key)).await
    }

    async fn try_read(&self, key: &str, cancel: &CancellationToken) -> BlobResult<Option<BlobReader>> {
        let file = self.run_blocking(key, cancel, |store, key| store.read(key)).await?;
        Ok(file.map(|f| Box::new(tokio::fs::File::from_std(f)) as BlobReader))
    }

    async fn write(
        &self,
        key: &str,
        overwrite: bool,
        cancel: &CancellationToken,
        producer: ContentProducer,
    ) -> BlobResult<bool> {
        let token = cancel.clone();
        self.run_blocking(key, cancel, move |store, key| {
            store.write(key, overwrite, &token, producer)
        })
        .await
    }

    async fn delete(&self, key: &str, cancel: &CancellationToken) -> BlobResult<bool> {
        self.run_blocking(key, cancel, |store, key| store.delete(key)).await
    }
}

/// Temp file owned by a single write. Removed on drop unless it was moved
/// onto its target.
struct TempFile {
    path: PathBuf,
    moved: bool,
}

impl TempFile {
    fn create(path: PathBuf) -> io::Result<(Self, File)> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(windows)]
        {
            use std::os::windows::fs::OpenOptionsExt;
            options.share_mode(0);
        }
        let file = options.open(&path)?;
        Ok((Self { path, moved: false }, file))
    }

    /// Moves the temp file onto `target`, replacing whatever is there in one
    /// rename.
    fn replace(mut self, target: &Path) -> io::Result<bool> {
        fs::rename(&self.path, target)?;
        self.moved = true;
        Ok(true)
    }

    /// Publishes the temp file at `target` only if `target` does not exist.
    ///
    /// A hard link fails atomically when the name is taken. Filesystems that
    /// cannot link fall back to check-then-rename, which two racing writers
    /// can both pass.
    fn persist_new(self, target: &Path) -> io::Result<bool> {
        match fs::hard_link(&self.path, target) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied
                ) =>
            {
                debug!(error = %e, "hard links unavailable, falling back to rename");
                self.persist_by_rename(target)
            }
            Err(e) => Err(e),
        }
    }

    /// Re-checks `target` and renames onto it if still absent. Not atomic
    /// against another writer renaming in between the check and the move.
    fn persist_by_rename(mut self, target: &Path) -> io::Result<bool> {
        if target.exists() {
            return Ok(false);
        }
        fs::rename(&self.path, target)?;
        self.moved = true;
        Ok(true)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.moved {
            return;
        }
        // Best effort: never mask the write's own outcome.
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove temp file");
            }
        }
    }
}
