//! Storage backend abstraction for Scaleboard.
//!
//! This crate defines the [`StorageBackend`] trait, a small document store
//! that knows nothing about credentials, encryption, or the upstream service.
//! The credential store in `scaleboard-core` serializes its record to JSON and
//! hands the bytes to a backend; secrets are already encrypted by then.
//!
//! Two implementations are provided:
//!
//! - [`FileBackend`]: production default, one file per document in a directory
//! - [`MemoryBackend`]: in-memory, for testing only

mod error;
mod file;
mod memory;

pub use error::StorageError;
pub use file::FileBackend;
pub use memory::MemoryBackend;

/// A pluggable document storage backend.
///
/// Keys are short document names (e.g. `settings`). Values are opaque byte
/// arrays. Implementations must be safe to share across async tasks
/// (`Send + Sync`).
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Retrieve a document by key.
    ///
    /// Returns `Ok(None)` if the document does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a document, replacing any existing value in one step.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the underlying backend fails.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}
