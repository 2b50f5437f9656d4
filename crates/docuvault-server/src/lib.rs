//! `DocuVault` HTTP server.
//!
//! Wires the core services, the repository and the object store into an
//! Axum router. The JSON API lives under `/v1/*`; stored files are served
//! from `/storage/documents/*`.

pub mod config;
pub mod error;
pub mod middleware;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::middleware as axum_mw;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::session_auth_middleware;
use crate::state::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Everything except OTP entry points, health and file serving needs a session.
    let authenticated_routes = Router::new()
        .merge(routes::auth::session_router())
        .merge(routes::profile::router())
        .merge(routes::documents::router())
        .merge(routes::sharing::router())
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            session_auth_middleware,
        ));

    // OTP endpoints are cheap to call; cap how many run at once.
    let otp_routes = Router::new()
        .merge(routes::auth::otp_router())
        .layer(tower::limit::ConcurrencyLimitLayer::new(32));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(otp_routes)
        .merge(authenticated_routes)
        .merge(routes::health::router())
        .merge(routes::storage::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}
