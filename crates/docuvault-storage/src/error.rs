//! Storage error types.
//!
//! Every error variant carries enough context to diagnose the problem
//! without a debugger.

/// Errors that can occur during object storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to open the storage backend at the given path.
    #[error("failed to open object store at '{path}': {reason}")]
    Open { path: String, reason: String },

    /// Failed to create or check a bucket.
    #[error("bucket '{bucket}' unavailable: {reason}")]
    Bucket { bucket: String, reason: String },

    /// Failed to read an object.
    #[error("failed to read object '{key}': {reason}")]
    Read { key: String, reason: String },

    /// Failed to write an object.
    #[error("failed to write object '{key}': {reason}")]
    Write { key: String, reason: String },

    /// An object already exists at the key.
    #[error("object '{key}' already exists")]
    AlreadyExists { key: String },

    /// Failed to delete an object.
    #[error("failed to delete object '{key}': {reason}")]
    Delete { key: String, reason: String },

    /// The object key is malformed.
    #[error("invalid object key: {reason}")]
    InvalidKey { reason: String },
}
