//! Shared application state for `DocuVault` server.
//!
//! A single [`AppState`] is built at startup and shared across all Axum
//! handlers via `Arc`. It owns the three services and a handle to the object
//! store for the public file route.

use std::sync::Arc;

use chrono::Duration;

use docuvault_core::auth::AuthService;
use docuvault_core::documents::DocumentService;
use docuvault_core::repository::Repository;
use docuvault_core::sharing::SharingService;
use docuvault_core::upload::PublicUrls;
use docuvault_storage::ObjectStore;

use crate::config::ServerConfig;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// OTP flow, sessions and profiles.
    pub auth: AuthService,
    /// Upload, listing, edits and deletes.
    pub documents: DocumentService,
    /// Invite codes and access grants.
    pub sharing: SharingService,
    /// Object store backing the documents bucket.
    pub store: Arc<dyn ObjectStore>,
}

impl AppState {
    /// Wire the services over one repository and one object store.
    #[must_use]
    pub fn new(
        repo: Arc<dyn Repository>,
        store: Arc<dyn ObjectStore>,
        config: &ServerConfig,
    ) -> Self {
        let urls = PublicUrls::new(&config.public_url);
        Self {
            auth: AuthService::new(
                Arc::clone(&repo),
                ttl(config.session_ttl_secs),
                ttl(config.otp_ttl_secs),
            ),
            documents: DocumentService::new(Arc::clone(&repo), Arc::clone(&store), urls),
            sharing: SharingService::new(repo, ttl(config.invite_ttl_secs)),
            store,
        }
    }
}

/// Seconds to a `Duration`, saturating where chrono would panic.
fn ttl(secs: i64) -> Duration {
    Duration::try_seconds(secs).unwrap_or(if secs < 0 {
        Duration::MIN
    } else {
        Duration::MAX
    })
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("public_url", &self.documents.urls().base())
            .finish_non_exhaustive()
    }
}
