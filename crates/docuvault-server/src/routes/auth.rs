//! Phone/OTP authentication routes: `/v1/auth/*`
//!
//! The challenge endpoints are public; logout needs a session.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docuvault_core::auth::{AuthKind, AuthState};
use docuvault_core::models::{Profile, Registration};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// Public OTP endpoints.
pub fn otp_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/auth/otp", post(send_otp))
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/verify", post(verify))
        .route("/v1/auth/cancel", post(cancel))
}

/// Endpoints that act on the caller's session.
pub fn session_router() -> Router<Arc<AppState>> {
    Router::new().route("/v1/auth/logout", post(logout))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PhoneRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub phone: String,
    pub otp: String,
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub state: AuthState,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub kind: AuthKind,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub profile: Profile,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
    pub state: AuthState,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// `POST /v1/auth/otp`: issue a login challenge.
async fn send_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PhoneRequest>,
) -> Result<Json<ChallengeResponse>, AppError> {
    state.auth.send_otp(&body.phone).await?;
    Ok(Json(ChallengeResponse {
        state: state.auth.state(&body.phone).await,
    }))
}

/// `POST /v1/auth/register`: stage profile details and issue a challenge.
async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Registration>,
) -> Result<Json<ChallengeResponse>, AppError> {
    let phone = body.phone.clone();
    state.auth.register(body).await?;
    Ok(Json(ChallengeResponse {
        state: state.auth.state(&phone).await,
    }))
}

/// `POST /v1/auth/verify`: confirm the OTP and open a session.
async fn verify(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    let outcome = state.auth.verify_otp(&body.phone, &body.otp).await?;
    Ok(Json(VerifyResponse {
        kind: outcome.kind,
        token: outcome.token,
        expires_at: outcome.expires_at,
        profile: outcome.profile,
    }))
}

/// `POST /v1/auth/cancel`: abandon a pending challenge.
async fn cancel(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PhoneRequest>,
) -> Json<CancelResponse> {
    let cancelled = state.auth.cancel(&body.phone).await;
    Json(CancelResponse {
        cancelled,
        state: state.auth.state(&body.phone).await,
    })
}

/// `POST /v1/auth/logout`: revoke the caller's session token.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Json<LogoutResponse> {
    let logged_out = state.auth.logout(&user.token).await;
    Json(LogoutResponse { logged_out })
}
