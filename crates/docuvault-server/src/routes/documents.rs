//! Document routes: `/v1/documents/*`
//!
//! Uploads arrive as `multipart/form-data` with one `file` part. Metadata
//! can come as a `details` part holding a JSON object, as individual text
//! parts (`name`, `type`, `provider`, `policy_number`, `premium`,
//! `coverage`, `start_date`, `due_date`), or not at all, in which case it is
//! extracted from the file name. Individual parts override `details`.

use std::sync::Arc;

use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docuvault_core::extract::ExtractedInfo;
use docuvault_core::models::{Document, DocumentDetails, DocumentEdit, DocumentUpdate};
use docuvault_core::upload::{MAX_FILE_SIZE, UploadFile};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// Multipart framing and metadata parts on top of the file itself.
const UPLOAD_OVERHEAD: usize = 1024 * 1024;

pub fn router() -> Router<Arc<AppState>> {
    let body_limit = usize::try_from(MAX_FILE_SIZE)
        .unwrap_or(usize::MAX)
        .saturating_add(UPLOAD_OVERHEAD);

    Router::new()
        .route(
            "/v1/documents",
            get(list_documents)
                .post(upload_document)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/v1/documents/extract", post(extract_info))
        .route(
            "/v1/documents/{id}",
            get(get_document)
                .patch(update_document)
                .delete(delete_document),
        )
        .route("/v1/documents/{id}/edits", get(list_edits))
        .route("/v1/documents/{id}/file", get(download_document))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<Document>,
}

#[derive(Debug, Serialize)]
pub struct EditListResponse {
    pub edits: Vec<DocumentEdit>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub file_name: String,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// `GET /v1/documents`: the caller's documents, newest first.
async fn list_documents(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let documents = state.documents.list_mine(user.profile.id).await?;
    Ok(Json(DocumentListResponse { documents }))
}

/// `POST /v1/documents`: store a file and create its document.
async fn upload_document(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let mut file = None;
    let mut details = DocumentDetails::default();
    let mut overrides = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("document").to_owned();
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("could not read file: {e}")))?;
                file = Some(UploadFile {
                    name: file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "details" => {
                let text = field_text(field).await?;
                details = serde_json::from_str(&text)
                    .map_err(|e| AppError::BadRequest(format!("invalid details: {e}")))?;
            }
            _ => overrides.push((name, field_text(field).await?)),
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest("missing file part".to_owned()))?;
    for (name, value) in overrides {
        apply_detail(&mut details, &name, value)?;
    }

    let document = state
        .documents
        .upload(user.profile.id, file, details)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// `POST /v1/documents/extract`: guess metadata for a file name.
async fn extract_info(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExtractRequest>,
) -> Json<ExtractedInfo> {
    Json(state.documents.extract(&body.file_name))
}

/// `GET /v1/documents/{id}`
async fn get_document(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, AppError> {
    let document = state.documents.get(user.profile.id, id).await?;
    Ok(Json(document))
}

/// `PATCH /v1/documents/{id}`: owner-only metadata edit.
async fn update_document(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<DocumentUpdate>,
) -> Result<Json<Document>, AppError> {
    let document = state.documents.update(user.profile.id, id, body).await?;
    Ok(Json(document))
}

/// `DELETE /v1/documents/{id}`: owner-only; removes grants and the file.
async fn delete_document(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.documents.delete(user.profile.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/documents/{id}/edits`: audit trail, oldest first.
async fn list_edits(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<EditListResponse>, AppError> {
    let edits = state.documents.edits(user.profile.id, id).await?;
    Ok(Json(EditListResponse { edits }))
}

/// `GET /v1/documents/{id}/file`: the stored binary, for owner or grantee.
async fn download_document(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (document, bytes) = state.documents.download(user.profile.id, id).await?;
    let disposition = content_disposition(&document.name);
    Ok((
        [
            (header::CONTENT_TYPE, document.file_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

// ── Helpers ──────────────────────────────────────────────────────────

/// `inline` disposition with quotes, backslashes and control characters
/// in the name replaced by `_`.
fn content_disposition(name: &str) -> String {
    let name: String = name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("inline; filename=\"{name}\"")
}

async fn field_text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("could not read form field: {e}")))
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("{field} must be YYYY-MM-DD")))
}

/// Apply one text form part to `details`. Blank values are ignored; unknown
/// parts are rejected.
fn apply_detail(details: &mut DocumentDetails, field: &str, value: String) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    match field {
        "name" => details.name = Some(value),
        "type" => {
            details.doc_type = Some(value.parse().map_err(AppError::BadRequest)?);
        }
        "provider" => details.provider = Some(value),
        "policy_number" => details.policy_number = Some(value),
        "premium" => details.premium = Some(value),
        "coverage" => details.coverage = Some(value),
        "start_date" => details.start_date = Some(parse_date(field, &value)?),
        "due_date" => details.due_date = Some(parse_date(field, &value)?),
        other => return Err(AppError::BadRequest(format!("unknown form field: {other}"))),
    }
    Ok(())
}
