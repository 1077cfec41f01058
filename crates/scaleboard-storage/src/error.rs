//! Storage error types.
//!
//! Every error variant carries enough context to diagnose the problem
//! without a debugger.

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The storage location could not be created or is not writable.
    #[error("failed to open storage at '{path}': {reason}")]
    Open { path: String, reason: String },

    /// Failed to read a document from storage.
    #[error("failed to read document '{key}': {reason}")]
    Read { key: String, reason: String },

    /// Failed to write a document to storage.
    #[error("failed to write document '{key}': {reason}")]
    Write { key: String, reason: String },

    /// A document key is not a plain file name.
    #[error("invalid document key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
}
