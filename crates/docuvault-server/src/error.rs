//! HTTP error types for `DocuVault` server.
//!
//! Maps domain errors from `docuvault-core` into HTTP responses. Every error
//! variant produces a JSON body with a machine-readable `error` field and a
//! human-readable `message`. Internal errors are logged and their message is
//! replaced before it reaches the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use docuvault_core::error::{
    AuthError, DocumentError, SharingError, StoreError, ValidationError,
};
use docuvault_storage::StorageError;

/// Application-level error returned from HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Authentication missing, invalid or expired.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Client sent invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Duplicate resource.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The resource existed but has lapsed.
    #[error("gone: {0}")]
    Gone(String),

    /// Storage, database or other server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::Gone(msg) => (StatusCode::GONE, "gone", msg),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_owned(),
                )
            }
        };

        let body = ErrorBody {
            error: error_type,
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::Conflict { .. } => Self::Conflict(err.to_string()),
            StoreError::Backend { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey { .. } => Self::BadRequest(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmptyPhone | AuthError::MissingField { .. } | AuthError::Validation(_) => {
                Self::BadRequest(err.to_string())
            }
            AuthError::InvalidOtp
            | AuthError::InvalidSession
            | AuthError::SessionExpired { .. } => Self::Unauthorized(err.to_string()),
            AuthError::ProfileNotFound => Self::NotFound(err.to_string()),
            AuthError::Store(inner) => inner.into(),
        }
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Unauthenticated => Self::Unauthorized(err.to_string()),
            DocumentError::Validation(inner) => inner.into(),
            DocumentError::NotFound { .. } => Self::NotFound(err.to_string()),
            DocumentError::Forbidden { .. } => Self::Forbidden(err.to_string()),
            DocumentError::InvalidRequest { .. } => Self::BadRequest(err.to_string()),
            DocumentError::Storage(inner) => Self::Internal(inner.to_string()),
            DocumentError::Store(inner) => inner.into(),
        }
    }
}

impl From<SharingError> for AppError {
    fn from(err: SharingError) -> Self {
        match err {
            SharingError::InvalidInviteCode | SharingError::InvalidRequest { .. } => {
                Self::BadRequest(err.to_string())
            }
            SharingError::InviteCodeExpired { .. } => Self::Gone(err.to_string()),
            SharingError::NotFound { .. } => Self::NotFound(err.to_string()),
            SharingError::Forbidden { .. } => Self::Forbidden(err.to_string()),
            SharingError::AlreadyShared => Self::Conflict(err.to_string()),
            SharingError::Store(inner) => inner.into(),
        }
    }
}
