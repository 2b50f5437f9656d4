//! Object storage abstraction for `DocuVault`.
//!
//! This crate defines the [`ObjectStore`] trait: a flat binary object store
//! that knows nothing about documents, owners, or sharing. Keys are
//! `/`-separated UTF-8 paths whose first segment is the bucket name
//! (e.g. `documents/<user>/<file>.pdf`).
//!
//! Three implementations are provided:
//!
//! - [`FsObjectStore`]: default, one file per object under a root directory (feature `fs-backend`)
//! - [`RocksDbObjectStore`]: single-file embedded store (feature `rocksdb-backend`)
//! - [`MemoryObjectStore`]: in-memory, for testing and development

mod error;
#[cfg(feature = "fs-backend")]
mod fs_backend;
mod memory;
#[cfg(feature = "rocksdb-backend")]
mod rocksdb_backend;

pub use error::StorageError;
#[cfg(feature = "fs-backend")]
pub use fs_backend::FsObjectStore;
pub use memory::MemoryObjectStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocksdb_backend::RocksDbObjectStore;

/// A pluggable binary object store.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Make sure a bucket exists, creating it when absent.
    ///
    /// Returns `true` if the bucket was created by this call.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Bucket`] if the bucket cannot be created.
    async fn ensure_bucket(&self, bucket: &str) -> Result<bool, StorageError>;

    /// Retrieve an object by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store an object. Fails with [`StorageError::AlreadyExists`] instead of
    /// overwriting an existing key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the underlying backend fails.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Delete an object. Deleting a non-existent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the underlying backend fails.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Validate an object key.
///
/// Keys must be non-empty, relative, free of `..` segments and NUL bytes, and
/// must not end with `/`.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] describing the first violated rule.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let reason = if key.is_empty() {
        Some("key must not be empty")
    } else if key.starts_with('/') {
        Some("key must be relative")
    } else if key.ends_with('/') {
        Some("key must not end with '/'")
    } else if key.contains('\0') {
        Some("key must not contain NUL bytes")
    } else if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        Some("key must not contain empty, '.' or '..' segments")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StorageError::InvalidKey {
            reason: format!("{reason}: '{key}'"),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_relative_keys() {
        validate_key("documents/user-1/1700000000000-abc.pdf").unwrap();
    }

    #[test]
    fn rejects_traversal_and_odd_shapes() {
        for bad in ["", "/abs", "dir/", "a/../b", "a//b", "./a", "a\0b"] {
            assert!(
                matches!(validate_key(bad), Err(StorageError::InvalidKey { .. })),
                "expected '{bad}' to be rejected"
            );
        }
    }
}
