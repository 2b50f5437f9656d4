//! Error types for `docuvault-core`.
//!
//! One enum per subsystem. Variants carry enough context to build a
//! user-facing message; none of them ever include OTPs, session tokens or
//! file contents.

use docuvault_storage::StorageError;
use uuid::Uuid;

/// Errors from the relational repository.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A row the operation depends on does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint would be violated.
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// The backing store failed (connection, query, decode).
    #[error("repository backend error: {reason}")]
    Backend { reason: String },
}

/// Errors from upload validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The file has no content.
    #[error("the selected file is empty")]
    EmptyFile,

    /// The file exceeds the size ceiling.
    #[error("maximum file size is 10MB (got {size} bytes)")]
    TooLarge { size: u64, max: u64 },

    /// The file extension is outside the allow-list.
    #[error("please upload a PDF, JPG, or PNG file (got '{extension}')")]
    UnsupportedExtension { extension: String },

    /// The declared MIME type is outside the allow-list.
    #[error("unsupported content type '{mime}'")]
    UnsupportedMime { mime: String },

    /// A field failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Errors from registration, OTP verification and sessions.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No phone number supplied.
    #[error("phone number is required")]
    EmptyPhone,

    /// A required registration field is missing.
    #[error("missing required user information: {field}")]
    MissingField { field: &'static str },

    /// A profile field failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The OTP did not match.
    #[error("invalid OTP, please try again")]
    InvalidOtp,

    /// Login attempted for a phone with no profile.
    #[error("user not found, please register first")]
    ProfileNotFound,

    /// The session token is unknown or its profile is gone.
    #[error("invalid session token")]
    InvalidSession,

    /// The session token has expired.
    #[error("session expired at {expired_at}")]
    SessionExpired { expired_at: String },

    /// The repository failed.
    #[error("auth store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from document upload, edit and delete.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The caller has no valid identity.
    #[error("you must be logged in to upload documents")]
    Unauthenticated,

    /// The uploaded file was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The document does not exist or is not visible to the caller.
    #[error("document '{id}' not found")]
    NotFound { id: Uuid },

    /// The caller is not allowed to perform the operation.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The request is malformed.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The object store failed.
    #[error("document storage error: {0}")]
    Storage(#[from] StorageError),

    /// The repository failed.
    #[error("document store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from invite codes and access grants.
#[derive(Debug, thiserror::Error)]
pub enum SharingError {
    /// The code is blank, unknown, superseded, or scoped to another document.
    #[error("the provided invite code is not valid")]
    InvalidInviteCode,

    /// The code has passed its expiry.
    #[error("invite code expired at {expired_at}")]
    InviteCodeExpired { expired_at: String },

    /// The document or grant does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The caller is not allowed to perform the operation.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The request is malformed.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The grantee already has access to the document.
    #[error("document is already shared with this user")]
    AlreadyShared,

    /// The repository failed.
    #[error("sharing store error: {0}")]
    Store(#[from] StoreError),
}
