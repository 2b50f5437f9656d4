//! Session authentication middleware.
//!
//! Extracts the `Authorization: Bearer <token>` header, resolves it to a
//! profile through the session store, and injects [`CurrentUser`] into the
//! request extensions for downstream handlers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use docuvault_core::models::Profile;

use crate::error::AppError;
use crate::state::AppState;

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub profile: Profile,
    /// Plaintext session token, kept so logout can revoke it.
    pub token: String,
}

/// Reject requests without a live session.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] if the header is missing, does not use
/// the Bearer scheme, or carries an unknown or expired token.
pub async fn session_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)?;
    let profile = state.auth.authenticate(&token).await?;

    req.extensions_mut().insert(CurrentUser { profile, token });
    Ok(next.run(req).await)
}

fn bearer_token(req: &Request) -> Result<String, AppError> {
    let header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_owned()))?;

    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized("Authorization header must use Bearer scheme".to_owned())
    })?;

    if token.trim().is_empty() {
        return Err(AppError::Unauthorized("empty bearer token".to_owned()));
    }
    Ok(token.trim().to_owned())
}
