//! Invite codes and access grants.
//!
//! An owner generates an invite code bound to one of their documents and
//! hands it to someone else. The recipient redeems it against that document,
//! which creates a [`SharedAccess`] row. Each owner has at most one active
//! code; generating a new one replaces the old. Codes expire.
//!
//! The document's `shared` flag is recomputed from the grant table after
//! every grant and revoke, never set directly.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use rand::rngs::OsRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SharingError, StoreError};
use crate::models::{
    Document, DocumentId, InviteCode, ProfileId, SharedAccess, expiry_after,
};
use crate::repository::Repository;

/// Length of an invite code.
pub const INVITE_CODE_LEN: usize = 8;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_CODE_ATTEMPTS: usize = 5;

/// Generate a random invite code: [`INVITE_CODE_LEN`] characters of `A-Z0-9`.
#[must_use]
pub fn random_invite_code() -> String {
    let mut rng = OsRng;
    (0..INVITE_CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// Invite-code and grant operations.
pub struct SharingService {
    repo: Arc<dyn Repository>,
    invite_ttl: Duration,
}

impl SharingService {
    /// Create the service. Codes live for `invite_ttl`.
    #[must_use]
    pub fn new(repo: Arc<dyn Repository>, invite_ttl: Duration) -> Self {
        Self { repo, invite_ttl }
    }

    /// Issue a fresh code for `document_id`, replacing `owner`'s previous one.
    ///
    /// # Errors
    ///
    /// - [`SharingError::NotFound`] if the document or profile is missing.
    /// - [`SharingError::Forbidden`] if `owner` does not own the document.
    /// - [`SharingError::Store`] if the repository fails or no unused code
    ///   could be found.
    pub async fn generate_invite_code(
        &self,
        owner: ProfileId,
        document_id: DocumentId,
    ) -> Result<InviteCode, SharingError> {
        let doc = self.document(document_id).await?;
        if doc.owner_id != owner {
            return Err(SharingError::Forbidden {
                reason: "only the owner can share a document".to_owned(),
            });
        }
        let profile = self
            .repo
            .get_profile(owner)
            .await?
            .ok_or_else(|| SharingError::NotFound {
                what: "profile".to_owned(),
            })?;

        let mut last_err = None;
        for _ in 0..MAX_CODE_ATTEMPTS {
            let now = Utc::now();
            let invite = InviteCode {
                code: random_invite_code(),
                owner_id: owner,
                owner_name: profile.name.clone(),
                document_id,
                created_at: now,
                expires_at: expiry_after(now, self.invite_ttl),
            };
            match self.repo.replace_invite_code(&invite).await {
                Ok(()) => {
                    info!(%owner, %document_id, expires_at = %invite.expires_at, "invite code generated");
                    return Ok(invite);
                }
                Err(e @ StoreError::Conflict { .. }) => {
                    debug!("invite code collision, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .unwrap_or_else(|| StoreError::Conflict {
                reason: "could not allocate an invite code".to_owned(),
            })
            .into())
    }

    /// `owner`'s current code, if any. Expired codes are still returned so
    /// the caller can show when they lapsed.
    ///
    /// # Errors
    ///
    /// Returns [`SharingError::Store`] if the repository fails.
    pub async fn current_invite_code(
        &self,
        owner: ProfileId,
    ) -> Result<Option<InviteCode>, SharingError> {
        Ok(self.repo.get_invite_code_for_owner(owner).await?)
    }

    /// Redeem `code` so `grantee` can read `document_id`.
    ///
    /// # Errors
    ///
    /// - [`SharingError::InvalidInviteCode`] if the code is blank, unknown,
    ///   or bound to a different document.
    /// - [`SharingError::InviteCodeExpired`] if the code has lapsed.
    /// - [`SharingError::NotFound`] if the document or grantee is missing.
    /// - [`SharingError::InvalidRequest`] if `grantee` owns the document.
    /// - [`SharingError::AlreadyShared`] if the grant already exists.
    pub async fn share_access(
        &self,
        grantee: ProfileId,
        document_id: DocumentId,
        code: &str,
    ) -> Result<SharedAccess, SharingError> {
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(SharingError::InvalidInviteCode);
        }
        let invite = self
            .repo
            .find_invite_code(&code)
            .await?
            .ok_or(SharingError::InvalidInviteCode)?;

        let now = Utc::now();
        if invite.is_expired(now) {
            return Err(SharingError::InviteCodeExpired {
                expired_at: invite.expires_at.to_rfc3339(),
            });
        }
        if invite.document_id != document_id {
            warn!(%document_id, "invite code redeemed against another document");
            return Err(SharingError::InvalidInviteCode);
        }

        let doc = self.document(document_id).await?;
        if doc.owner_id != invite.owner_id {
            return Err(SharingError::InvalidInviteCode);
        }
        if doc.owner_id == grantee {
            return Err(SharingError::InvalidRequest {
                reason: "you already own this document".to_owned(),
            });
        }
        if self.repo.find_share(document_id, grantee).await?.is_some() {
            return Err(SharingError::AlreadyShared);
        }

        let profile = self
            .repo
            .get_profile(grantee)
            .await?
            .ok_or_else(|| SharingError::NotFound {
                what: "profile".to_owned(),
            })?;

        let share = SharedAccess {
            id: Uuid::new_v4(),
            document_id,
            user_id: grantee,
            user_name: profile.name,
            shared_by_id: doc.owner_id,
            access_granted_date: now,
        };
        let share = match self.repo.insert_share(&share).await {
            Ok(share) => share,
            Err(StoreError::Conflict { .. }) => return Err(SharingError::AlreadyShared),
            Err(e) => return Err(e.into()),
        };
        self.repo.refresh_shared_flag(document_id).await?;

        info!(%document_id, %grantee, owner = %doc.owner_id, "access granted");
        Ok(share)
    }

    /// Remove `user_id`'s access to `document_id`. Allowed for the document
    /// owner and for the grantee themself.
    ///
    /// # Errors
    ///
    /// - [`SharingError::NotFound`] if the document or grant is missing.
    /// - [`SharingError::Forbidden`] if `actor` is neither owner nor grantee.
    pub async fn revoke_access(
        &self,
        actor: ProfileId,
        user_id: ProfileId,
        document_id: DocumentId,
    ) -> Result<(), SharingError> {
        let doc = self.document(document_id).await?;
        if actor != doc.owner_id && actor != user_id {
            return Err(SharingError::Forbidden {
                reason: "only the owner or the grantee can revoke access".to_owned(),
            });
        }
        if !self.repo.delete_share(document_id, user_id).await? {
            return Err(SharingError::NotFound {
                what: "access grant".to_owned(),
            });
        }
        let shared = self.repo.refresh_shared_flag(document_id).await?;

        info!(%document_id, %user_id, %actor, shared, "access revoked");
        Ok(())
    }

    /// Grants on a document, oldest first. Owner only.
    ///
    /// # Errors
    ///
    /// - [`SharingError::NotFound`] if the document is missing.
    /// - [`SharingError::Forbidden`] if `owner` does not own it.
    pub async fn list_access(
        &self,
        owner: ProfileId,
        document_id: DocumentId,
    ) -> Result<Vec<SharedAccess>, SharingError> {
        let doc = self.document(document_id).await?;
        if doc.owner_id != owner {
            return Err(SharingError::Forbidden {
                reason: "only the owner can list access".to_owned(),
            });
        }
        Ok(self.repo.list_shares_for_document(document_id).await?)
    }

    /// Documents other users have shared with `user`.
    ///
    /// # Errors
    ///
    /// Returns [`SharingError::Store`] if the repository fails.
    pub async fn shared_with_me(&self, user: ProfileId) -> Result<Vec<Document>, SharingError> {
        Ok(self.repo.list_documents_shared_with(user).await?)
    }

    async fn document(&self, id: DocumentId) -> Result<Document, SharingError> {
        self.repo
            .get_document(id)
            .await?
            .ok_or_else(|| SharingError::NotFound {
                what: format!("document '{id}'"),
            })
    }
}

impl std::fmt::Debug for SharingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharingService")
            .field("invite_ttl", &self.invite_ttl)
            .finish_non_exhaustive()
    }
}
