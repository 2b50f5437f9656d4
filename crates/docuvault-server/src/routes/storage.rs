//! Public reads from the documents bucket: `/storage/documents/*`
//!
//! This is what the `file_url` of a document points at when
//! `DOCUVAULT_PUBLIC_URL` is left at its default. No session is needed.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use docuvault_core::upload::{DOCUMENTS_BUCKET, file_extension, mime_for_extension};
use docuvault_storage::validate_key;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/storage/documents/{*key}", get(read_object))
}

/// `GET /storage/documents/{*key}`
async fn read_object(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let key = format!("{DOCUMENTS_BUCKET}/{key}");
    validate_key(&key)?;

    let bytes = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("object not found: {key}")))?;

    let content_type = file_extension(&key)
        .and_then(|ext| mime_for_extension(&ext))
        .unwrap_or("application/octet-stream");

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        bytes,
    ))
}
