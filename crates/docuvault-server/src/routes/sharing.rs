//! Sharing routes: invite codes, access grants and shared-with-me.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docuvault_core::models::{InviteCode, SharedAccess};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::routes::documents::DocumentListResponse;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/v1/invite-code",
            get(current_invite_code).post(generate_invite_code),
        )
        .route("/v1/documents/{id}/share", post(share_access))
        .route("/v1/documents/{id}/access", get(list_access))
        .route("/v1/documents/{id}/access/{user_id}", delete(revoke_access))
        .route("/v1/shared", get(shared_with_me))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateInviteRequest {
    pub document_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct InviteCodeResponse {
    pub invite_code: Option<InviteCode>,
    /// `false` when there is no code or it has lapsed.
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct AccessListResponse {
    pub access: Vec<SharedAccess>,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// `GET /v1/invite-code`: the caller's current code, if any.
async fn current_invite_code(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<InviteCodeResponse>, AppError> {
    let invite_code = state.sharing.current_invite_code(user.profile.id).await?;
    let now = chrono::Utc::now();
    let active = invite_code.as_ref().is_some_and(|c| !c.is_expired(now));
    Ok(Json(InviteCodeResponse {
        invite_code,
        active,
    }))
}

/// `POST /v1/invite-code`: issue a fresh code for one of the caller's
/// documents, replacing any previous one.
async fn generate_invite_code(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<GenerateInviteRequest>,
) -> Result<(StatusCode, Json<InviteCode>), AppError> {
    let invite = state
        .sharing
        .generate_invite_code(user.profile.id, body.document_id)
        .await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

/// `POST /v1/documents/{id}/share`: redeem a code for read access.
async fn share_access(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<ShareRequest>,
) -> Result<(StatusCode, Json<SharedAccess>), AppError> {
    let grant = state
        .sharing
        .share_access(user.profile.id, id, &body.code)
        .await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

/// `GET /v1/documents/{id}/access`: grants on an owned document.
async fn list_access(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<AccessListResponse>, AppError> {
    let access = state.sharing.list_access(user.profile.id, id).await?;
    Ok(Json(AccessListResponse { access }))
}

/// `DELETE /v1/documents/{id}/access/{user_id}`: owner revokes a grantee,
/// or a grantee drops their own access.
async fn revoke_access(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .sharing
        .revoke_access(user.profile.id, user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/shared`: documents other users shared with the caller.
async fn shared_with_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let documents = state.sharing.shared_with_me(user.profile.id).await?;
    Ok(Json(DocumentListResponse { documents }))
}
