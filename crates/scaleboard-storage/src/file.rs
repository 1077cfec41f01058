//! File storage backend, the production default.
//!
//! Each document lives in its own `<key>.json` file inside a single directory.
//! Writes go to a temporary sibling file which is then renamed over the
//! target, so a crash mid-write leaves either the old or the new document on
//! disk, never a truncated one. On unix, documents are readable by the owner
//! only.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::{StorageBackend, StorageError};

/// Name of the file written and removed by [`FileBackend::open`] to prove the
/// directory is writable.
const WRITE_PROBE: &str = ".write-probe";

/// Mode of document files on unix.
#[cfg(unix)]
const DOCUMENT_MODE: u32 = 0o600;

/// A storage backend that keeps one JSON file per document.
///
/// # Examples
///
/// ```no_run
/// # use scaleboard_storage::FileBackend;
/// # #[tokio::main]
/// # async fn main() {
/// let backend = FileBackend::open("/var/lib/scaleboard").await.unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl FileBackend {
    /// Open (and create if needed) a storage directory.
    ///
    /// The directory is probed with a throwaway write so an unwritable
    /// location fails here, at startup, rather than on the first save.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the directory cannot be created or
    /// is not writable.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = path.as_ref().to_path_buf();
        let open_err = |reason: String| StorageError::Open {
            path: root.display().to_string(),
            reason,
        };

        fs::create_dir_all(&root)
            .await
            .map_err(|e| open_err(format!("cannot create directory: {e}")))?;

        let probe = root.join(WRITE_PROBE);
        fs::write(&probe, b"ok")
            .await
            .map_err(|e| open_err(format!("directory is not writable: {e}")))?;
        fs::remove_file(&probe)
            .await
            .map_err(|e| open_err(format!("cannot remove write probe: {e}")))?;

        tracing::debug!(root = %root.display(), "file storage opened");
        Ok(Self { root })
    }

    /// Directory holding the documents.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a document key to its file path.
    ///
    /// Keys are restricted to `[A-Za-z0-9_-]` so they can never escape the
    /// storage directory.
    fn document_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey {
                key: key.to_owned(),
                reason: "key must not be empty".to_owned(),
            });
        }
        if !key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(StorageError::InvalidKey {
                key: key.to_owned(),
                reason: "only alphanumeric characters, '_' and '-' are allowed".to_owned(),
            });
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait::async_trait]
impl StorageBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.document_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read {
                key: key.to_owned(),
                reason: e.to_string(),
            }),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.document_path(key)?;
        let tmp = path.with_extension("json.tmp");
        let write_err = |e: std::io::Error| StorageError::Write {
            key: key.to_owned(),
            reason: e.to_string(),
        };

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(DOCUMENT_MODE);

        let mut file = options.open(&tmp).await.map_err(write_err)?;
        // A leftover temp file keeps its old mode, so set it explicitly.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(DOCUMENT_MODE))
                .await
                .map_err(write_err)?;
        }
        file.write_all(value).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        fs::rename(&tmp, &path).await.map_err(write_err)?;
        tracing::debug!(key = %key, bytes = value.len(), "document written");
        Ok(())
    }
}
