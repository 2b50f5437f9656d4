//! Session tokens.
//!
//! A successful OTP verification mints a bearer token for the profile. The
//! plaintext token (`dv_<32 hex chars>`, 128 bits from UUID v4) is returned
//! once and never kept: the store maps `SHA-256(token)` to the session entry.
//! Expired entries are dropped when they are looked up, and all of them are
//! swept whenever a new session is minted.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::AuthError;
use crate::models::{ProfileId, expiry_after};

/// Prefix that marks a `DocuVault` session token.
pub const TOKEN_PREFIX: &str = "dv_";

/// A live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEntry {
    /// SHA-256 of the token, hex-encoded.
    pub token_hash: String,
    pub profile_id: ProfileId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// In-process session table.
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    /// Create a store whose sessions live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Mint a session for `profile_id`. Returns the plaintext token together
    /// with the stored entry.
    pub async fn create(&self, profile_id: ProfileId) -> (String, SessionEntry) {
        let token = generate_token();
        let now = Utc::now();
        let entry = SessionEntry {
            token_hash: hash_token(&token),
            profile_id,
            created_at: now,
            expires_at: expiry_after(now, self.ttl),
        };

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| now < s.expires_at);
        sessions.insert(entry.token_hash.clone(), entry.clone());
        drop(sessions);

        info!(%profile_id, "session created");
        (token, entry)
    }

    /// Resolve a plaintext token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidSession`] if the token is unknown.
    /// - [`AuthError::SessionExpired`] if the session has passed its expiry;
    ///   the entry is removed.
    pub async fn lookup(&self, token: &str) -> Result<SessionEntry, AuthError> {
        let token_hash = hash_token(token);
        let entry = self
            .sessions
            .read()
            .await
            .get(&token_hash)
            .cloned()
            .ok_or(AuthError::InvalidSession)?;

        if Utc::now() >= entry.expires_at {
            self.sessions.write().await.remove(&token_hash);
            return Err(AuthError::SessionExpired {
                expired_at: entry.expires_at.to_rfc3339(),
            });
        }

        Ok(entry)
    }

    /// Drop a session. Returns `false` if the token was not live.
    pub async fn revoke(&self, token: &str) -> bool {
        let token_hash = hash_token(token);
        let removed = self.sessions.write().await.remove(&token_hash).is_some();
        if removed {
            info!(
                token_hash_prefix = &token_hash[..8],
                "session revoked"
            );
        }
        removed
    }

    /// Number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Generate a new plaintext session token.
#[must_use]
pub fn generate_token() -> String {
    format!("{TOKEN_PREFIX}{}", Uuid::new_v4().as_simple())
}

/// Hash a plaintext token with SHA-256, returning the hex digest.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn token_format() {
        let token = generate_token();
        assert!(token.starts_with(TOKEN_PREFIX));
        assert_eq!(token.len(), TOKEN_PREFIX.len() + 32);
        assert_ne!(token, generate_token());
    }

    #[test]
    fn hash_is_stable_hex() {
        let hash = hash_token("dv_abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token("dv_abc"));
        assert_ne!(hash, hash_token("dv_abd"));
    }

    #[tokio::test]
    async fn create_and_lookup() {
        let store = SessionStore::new(Duration::hours(1));
        let profile = Uuid::new_v4();
        let (token, entry) = store.create(profile).await;

        assert_ne!(entry.token_hash, token);
        let found = store.lookup(&token).await.unwrap();
        assert_eq!(found.profile_id, profile);
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let store = SessionStore::new(Duration::hours(1));
        let err = store.lookup("dv_nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidSession));
    }

    #[tokio::test]
    async fn expired_session_is_removed() {
        let store = SessionStore::new(Duration::seconds(-1));
        let (token, _) = store.create(Uuid::new_v4()).await;

        let err = store.lookup(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionExpired { .. }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn create_sweeps_expired_sessions() {
        let store = SessionStore::new(Duration::seconds(-1));
        for _ in 0..100 {
            store.create(Uuid::new_v4()).await;
        }
        // Each new session sweeps the ones before it; only the last remains.
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn huge_ttl_does_not_overflow() {
        let store = SessionStore::new(Duration::seconds(10_000_000_000_000));
        let (token, entry) = store.create(Uuid::new_v4()).await;
        assert_eq!(entry.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(store.lookup(&token).await.is_ok());
    }

    #[tokio::test]
    async fn revoke_is_one_shot() {
        let store = SessionStore::new(Duration::hours(1));
        let (token, _) = store.create(Uuid::new_v4()).await;

        assert!(store.revoke(&token).await);
        assert!(!store.revoke(&token).await);
        assert!(store.lookup(&token).await.is_err());
    }
}
