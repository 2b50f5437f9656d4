//! Upload validation and object placement.
//!
//! A document binary lands in the `documents` bucket under
//! `documents/{user_id}/{unix_millis}-{random}.{ext}`. The random suffix is
//! ten base-36 characters from the OS CSPRNG; a clash with an existing key is
//! retried a few times rather than overwriting.

use chrono::Utc;
use docuvault_storage::{ObjectStore, StorageError};
use rand::Rng;
use rand::rngs::OsRng;
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::models::ProfileId;

/// Upper bound on an uploaded file, inclusive (10 MiB).
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Accepted file extensions, lowercase.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// Accepted declared content types. `application/octet-stream` is what many
/// clients send when they do not know better; the extension still decides.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "application/octet-stream",
];

/// Bucket holding document binaries.
pub const DOCUMENTS_BUCKET: &str = "documents";

const SUFFIX_LEN: usize = 10;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_KEY_ATTEMPTS: usize = 3;

/// A file received from a client.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Original file name as sent by the client.
    pub name: String,
    /// Declared content type, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Content type to record on the document: the declared one unless it is
    /// missing or generic, otherwise derived from the extension.
    #[must_use]
    pub fn effective_content_type(&self) -> String {
        match self.content_type.as_deref() {
            Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_owned(),
            _ => file_extension(&self.name)
                .and_then(|ext| mime_for_extension(&ext))
                .unwrap_or("application/octet-stream")
                .to_owned(),
        }
    }
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Where an upload was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Full object-store key, bucket included.
    pub key: String,
    /// Public URL the object is served from.
    pub url: String,
}

/// Lowercased extension of a file name, if it has one.
#[must_use]
pub fn file_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Canonical content type for an allowed extension.
#[must_use]
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "pdf" => Some("application/pdf"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

/// Check name, size and declared content type of an upload.
///
/// # Errors
///
/// - [`ValidationError::EmptyFile`] if `size` is zero.
/// - [`ValidationError::TooLarge`] if `size` exceeds [`MAX_FILE_SIZE`].
/// - [`ValidationError::UnsupportedExtension`] if the extension is not allowed.
/// - [`ValidationError::UnsupportedMime`] if the declared type is not allowed.
pub fn validate_upload(
    name: &str,
    size: u64,
    content_type: Option<&str>,
) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if size > MAX_FILE_SIZE {
        return Err(ValidationError::TooLarge {
            size,
            max: MAX_FILE_SIZE,
        });
    }

    let extension = file_extension(name).unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ValidationError::UnsupportedExtension { extension });
    }

    if let Some(mime) = content_type.filter(|m| !m.is_empty()) {
        let base = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !ALLOWED_MIME_TYPES.contains(&base.as_str()) {
            return Err(ValidationError::UnsupportedMime {
                mime: mime.to_owned(),
            });
        }
    }

    Ok(())
}

/// [`validate_upload`] for a received file.
///
/// # Errors
///
/// See [`validate_upload`].
pub fn validate_file(file: &UploadFile) -> Result<(), ValidationError> {
    validate_upload(&file.name, file.size(), file.content_type.as_deref())
}

/// Build a fresh object key for `user_id`'s file with extension `ext`.
#[must_use]
pub fn object_key(user_id: ProfileId, ext: &str) -> String {
    format!(
        "{DOCUMENTS_BUCKET}/{user_id}/{}-{}.{ext}",
        Utc::now().timestamp_millis(),
        random_suffix()
    )
}

fn random_suffix() -> String {
    let mut rng = OsRng;
    (0..SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect()
}

/// Maps object keys in the documents bucket to public URLs and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicUrls {
    base: String,
}

impl PublicUrls {
    /// `base` is the URL that serves the documents bucket, e.g.
    /// `https://files.example.com/storage/documents`.
    #[must_use]
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_owned(),
        }
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Public URL for a key in the documents bucket.
    #[must_use]
    pub fn url_for(&self, key: &str) -> String {
        let path = key
            .strip_prefix(DOCUMENTS_BUCKET)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(key);
        format!("{}/{path}", self.base)
    }

    /// Object key behind a URL produced by [`url_for`](Self::url_for).
    /// Returns `None` for foreign URLs.
    #[must_use]
    pub fn key_from_url(&self, url: &str) -> Option<String> {
        let path = url.strip_prefix(&self.base)?.strip_prefix('/')?;
        if path.is_empty() {
            return None;
        }
        Some(format!("{DOCUMENTS_BUCKET}/{path}"))
    }
}

/// Store a validated file under a fresh key for `user_id`.
///
/// Bucket creation is attempted first; a failure there is logged and the
/// write is tried anyway.
///
/// # Errors
///
/// Returns [`StorageError`] if the write fails, or if every generated key was
/// already taken.
pub async fn upload_file_to_storage(
    store: &dyn ObjectStore,
    urls: &PublicUrls,
    file: &UploadFile,
    user_id: ProfileId,
) -> Result<StoredFile, StorageError> {
    match store.ensure_bucket(DOCUMENTS_BUCKET).await {
        Ok(true) => debug!(bucket = DOCUMENTS_BUCKET, "bucket created"),
        Ok(false) => {}
        Err(e) => warn!(error = %e, bucket = DOCUMENTS_BUCKET, "could not ensure bucket"),
    }

    let ext = file_extension(&file.name).unwrap_or_else(|| "bin".to_owned());
    let mut last_err = None;
    for _ in 0..MAX_KEY_ATTEMPTS {
        let key = object_key(user_id, &ext);
        match store.put(&key, &file.bytes).await {
            Ok(()) => {
                let url = urls.url_for(&key);
                return Ok(StoredFile { key, url });
            }
            Err(e @ StorageError::AlreadyExists { .. }) => {
                debug!(%key, "object key taken, retrying");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| StorageError::Write {
        key: format!("{DOCUMENTS_BUCKET}/{user_id}/"),
        reason: "no free object key".to_owned(),
    }))
}
