//! `RocksDB` object store.
//!
//! Wraps the `rocksdb` crate behind the [`ObjectStore`] trait. All operations
//! are dispatched to a blocking thread via [`tokio::task::spawn_blocking`]
//! since `RocksDB` is a synchronous C++ library.
//!
//! Buckets are recorded as marker keys under `\0buckets/`. The leading NUL
//! keeps them out of the valid object key space.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rocksdb::{DBWithThreadMode, MultiThreaded, Options};

use crate::{ObjectStore, StorageError, validate_key};

type Db = DBWithThreadMode<MultiThreaded>;

const BUCKET_MARKER_PREFIX: &str = "\0buckets/";

/// An object store backed by `RocksDB`.
///
/// Thread-safe (`Arc<DB>` internally) and safe to share across async tasks.
#[derive(Clone)]
pub struct RocksDbObjectStore {
    db: Arc<Db>,
    path: PathBuf,
}

impl std::fmt::Debug for RocksDbObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbObjectStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RocksDbObjectStore {
    /// Open a `RocksDB` database at the given path, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if `RocksDB` fails to open the database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = Db::open(&opts, path).map_err(|e| StorageError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
        })
    }

    /// Return the filesystem path of this database.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl ObjectStore for RocksDbObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<bool, StorageError> {
        validate_key(bucket).map_err(|e| StorageError::Bucket {
            bucket: bucket.to_owned(),
            reason: e.to_string(),
        })?;
        let db = Arc::clone(&self.db);
        let bucket = bucket.to_owned();
        tokio::task::spawn_blocking(move || {
            let marker = format!("{BUCKET_MARKER_PREFIX}{bucket}");
            let to_err = |reason: String| StorageError::Bucket {
                bucket: bucket.clone(),
                reason,
            };
            if db
                .get(marker.as_bytes())
                .map_err(|e| to_err(e.to_string()))?
                .is_some()
            {
                return Ok(false);
            }
            db.put(marker.as_bytes(), b"1")
                .map_err(|e| to_err(e.to_string()))?;
            Ok(true)
        })
        .await
        .map_err(|e| StorageError::Bucket {
            bucket: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })?
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let db = Arc::clone(&self.db);
        let key = key.to_owned();
        tokio::task::spawn_blocking(move || {
            db.get(key.as_bytes()).map_err(|e| StorageError::Read {
                key,
                reason: e.to_string(),
            })
        })
        .await
        .map_err(|e| StorageError::Read {
            key: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })?
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        let db = Arc::clone(&self.db);
        let key = key.to_owned();
        let value = value.to_vec();
        tokio::task::spawn_blocking(move || {
            let exists = db
                .get_pinned(key.as_bytes())
                .map_err(|e| StorageError::Write {
                    key: key.clone(),
                    reason: e.to_string(),
                })?
                .is_some();
            if exists {
                return Err(StorageError::AlreadyExists { key });
            }
            db.put(key.as_bytes(), &value)
                .map_err(|e| StorageError::Write {
                    key,
                    reason: e.to_string(),
                })
        })
        .await
        .map_err(|e| StorageError::Write {
            key: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })?
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let db = Arc::clone(&self.db);
        let key = key.to_owned();
        tokio::task::spawn_blocking(move || {
            db.delete(key.as_bytes()).map_err(|e| StorageError::Delete {
                key,
                reason: e.to_string(),
            })
        })
        .await
        .map_err(|e| StorageError::Delete {
            key: String::new(),
            reason: format!("blocking task panicked: {e}"),
        })?
    }
}
