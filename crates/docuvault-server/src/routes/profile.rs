//! Current profile: `/v1/profile`

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};

use docuvault_core::models::{Profile, ProfileUpdate};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/v1/profile", get(get_profile).patch(update_profile))
}

/// `GET /v1/profile`: who the session belongs to.
async fn get_profile(Extension(user): Extension<CurrentUser>) -> Json<Profile> {
    Json(user.profile)
}

/// `PATCH /v1/profile`: edit name, email or age.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<Profile>, AppError> {
    let profile = state.auth.update_profile(user.profile.id, body).await?;
    Ok(Json(profile))
}
