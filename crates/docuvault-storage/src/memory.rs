//! In-memory object store.
//!
//! Stores every object in a `BTreeMap` behind a `RwLock`. Nothing is
//! persisted; all data is lost when the process exits. Used by unit tests,
//! server integration tests, and `DOCUVAULT_OBJECT_STORE=memory`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{ObjectStore, StorageError, validate_key};

#[derive(Debug, Default)]
struct Inner {
    buckets: BTreeSet<String>,
    objects: BTreeMap<String, Vec<u8>>,
}

/// An in-memory object store backed by a `BTreeMap`.
///
/// Cloning shares the underlying data.
///
/// # Examples
///
/// ```
/// # use docuvault_storage::{MemoryObjectStore, ObjectStore};
/// # #[tokio::main]
/// # async fn main() {
/// let store = MemoryObjectStore::new();
/// store.put("documents/u1/a.pdf", b"%PDF").await.unwrap();
/// let val = store.get("documents/u1/a.pdf").await.unwrap();
/// assert_eq!(val, Some(b"%PDF".to_vec()));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryObjectStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.inner.read().await.objects.len()
    }

    /// Whether the store holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.objects.is_empty()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<bool, StorageError> {
        validate_key(bucket).map_err(|e| StorageError::Bucket {
            bucket: bucket.to_owned(),
            reason: e.to_string(),
        })?;
        let mut inner = self.inner.write().await;
        Ok(inner.buckets.insert(bucket.to_owned()))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.objects.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        let mut inner = self.inner.write().await;
        if inner.objects.contains_key(key) {
            return Err(StorageError::AlreadyExists {
                key: key.to_owned(),
            });
        }
        inner.objects.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.objects.remove(key);
        Ok(())
    }
}
