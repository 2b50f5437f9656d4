//! Filesystem object store, the default backend.
//!
//! Each object is a regular file at `<root>/<key>`; each bucket is a
//! top-level directory. Writes go to a temporary sibling and are renamed into
//! place so readers never observe a half-written document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::{ObjectStore, StorageError, validate_key};

/// Suffix used for in-flight writes.
const PARTIAL_SUFFIX: &str = ".partial";

/// An object store backed by a directory tree.
///
/// # Examples
///
/// ```no_run
/// # use docuvault_storage::FsObjectStore;
/// let store = FsObjectStore::open("/var/lib/docuvault/objects").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (and create if missing) an object store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the root directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| StorageError::Open {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Return the root directory of this store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.root.clone(), |p, seg| p.join(seg))
    }
}

#[async_trait::async_trait]
impl ObjectStore for FsObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<bool, StorageError> {
        let to_err = |reason: String| StorageError::Bucket {
            bucket: bucket.to_owned(),
            reason,
        };
        validate_key(bucket).map_err(|e| to_err(e.to_string()))?;

        let dir = self.path_for(bucket);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(false),
            Ok(_) => Err(to_err("path exists and is not a directory".to_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| to_err(e.to_string()))?;
                tracing::info!(bucket, "object bucket created");
                Ok(true)
            }
            Err(e) => Err(to_err(e.to_string())),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if validate_key(key).is_err() {
            return Ok(None);
        }
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read {
                key: key.to_owned(),
                reason: e.to_string(),
            }),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        let write_err = |reason: String| StorageError::Write {
            key: key.to_owned(),
            reason,
        };

        let path = self.path_for(key);
        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| write_err(e.to_string()))?
        {
            return Err(StorageError::AlreadyExists {
                key: key.to_owned(),
            });
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_err(e.to_string()))?;
        }

        let mut tmp = path.clone().into_os_string();
        tmp.push(PARTIAL_SUFFIX);
        let tmp = PathBuf::from(tmp);

        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| write_err(e.to_string()))?;
        file.write_all(value)
            .await
            .map_err(|e| write_err(e.to_string()))?;
        file.sync_all()
            .await
            .map_err(|e| write_err(e.to_string()))?;
        drop(file);

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| write_err(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Delete {
                key: key.to_owned(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path().join("objects")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_and_get_roundtrip() {
        let (_dir, store) = make_store();
        store.put("documents/u1/a.pdf", b"%PDF-1.7").await.unwrap();
        assert_eq!(
            store.get("documents/u1/a.pdf").await.unwrap(),
            Some(b"%PDF-1.7".to_vec())
        );
        assert!(store.root().join("documents").join("u1").join("a.pdf").exists());
    }

    #[tokio::test]
    async fn put_refuses_to_overwrite() {
        let (_dir, store) = make_store();
        store.put("documents/a.pdf", b"one").await.unwrap();
        let err = store.put("documents/a.pdf", b"two").await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn ensure_bucket_creates_directory_once() {
        let (_dir, store) = make_store();
        assert!(store.ensure_bucket("documents").await.unwrap());
        assert!(!store.ensure_bucket("documents").await.unwrap());
        assert!(store.root().join("documents").is_dir());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_dir, store) = make_store();
        store.put("documents/a.png", b"png").await.unwrap();
        store.delete("documents/a.png").await.unwrap();
        store.delete("documents/a.png").await.unwrap();
        assert_eq!(store.get("documents/a.png").await.unwrap(), None);
    }

    #[tokio::test]
    async fn traversal_keys_are_never_read() {
        let (_dir, store) = make_store();
        assert_eq!(store.get("../secret").await.unwrap(), None);
        assert!(!store.root().parent().unwrap().join("secret").exists());
    }
}
