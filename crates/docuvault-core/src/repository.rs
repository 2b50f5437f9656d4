//! Repository abstraction over the relational store.
//!
//! [`Repository`] is the seam between the services in this crate and a
//! concrete database. The server provides a PostgreSQL implementation; tests
//! and development use [`crate::memory::MemoryRepository`].
//!
//! Implementations enforce row-level invariants only (uniqueness, cascades).
//! Ownership checks, invite validation and the `shared` flag policy live in
//! the services.

use crate::error::StoreError;
use crate::models::{
    Document, DocumentEdit, DocumentId, DocumentUpdate, InviteCode, Profile, ProfileId,
    ProfileUpdate, Registration, SharedAccess,
};

/// Persistent storage for profiles, documents, grants, invite codes and
/// edit history.
#[async_trait::async_trait]
pub trait Repository: Send + Sync + 'static {
    // ── Profiles ─────────────────────────────────────────────────────

    /// Insert a profile, or update name/email/age of the profile that already
    /// owns `registration.phone`.
    async fn upsert_profile(&self, registration: &Registration) -> Result<Profile, StoreError>;

    /// Fetch a profile by ID.
    async fn get_profile(&self, id: ProfileId) -> Result<Option<Profile>, StoreError>;

    /// Fetch a profile by its (unique) phone number.
    async fn find_profile_by_phone(&self, phone: &str) -> Result<Option<Profile>, StoreError>;

    /// Apply a partial update. Fails with [`StoreError::NotFound`] if the
    /// profile does not exist.
    async fn update_profile(
        &self,
        id: ProfileId,
        update: &ProfileUpdate,
    ) -> Result<Profile, StoreError>;

    // ── Documents ────────────────────────────────────────────────────

    /// Insert a new document row.
    async fn insert_document(&self, document: &Document) -> Result<Document, StoreError>;

    /// Fetch a document by ID.
    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>, StoreError>;

    /// List documents owned by a profile, newest upload first.
    async fn list_documents_by_owner(&self, owner: ProfileId)
    -> Result<Vec<Document>, StoreError>;

    /// Apply a partial update and bump `updated_at`.
    async fn update_document(
        &self,
        id: DocumentId,
        update: &DocumentUpdate,
    ) -> Result<Document, StoreError>;

    /// Recompute the `shared` flag from the grant table and persist it.
    /// Returns the new value.
    async fn refresh_shared_flag(&self, id: DocumentId) -> Result<bool, StoreError>;

    /// Delete a document together with its grants, invite codes and edit
    /// history. Returns `false` if the document did not exist.
    async fn delete_document(&self, id: DocumentId) -> Result<bool, StoreError>;

    // ── Grants ───────────────────────────────────────────────────────

    /// Insert a grant. Fails with [`StoreError::Conflict`] if the
    /// `(document_id, user_id)` pair already exists.
    async fn insert_share(&self, share: &SharedAccess) -> Result<SharedAccess, StoreError>;

    /// Fetch the grant for a `(document, grantee)` pair.
    async fn find_share(
        &self,
        document_id: DocumentId,
        user_id: ProfileId,
    ) -> Result<Option<SharedAccess>, StoreError>;

    /// Delete the grant for a `(document, grantee)` pair. Returns `false` if
    /// no such grant existed.
    async fn delete_share(
        &self,
        document_id: DocumentId,
        user_id: ProfileId,
    ) -> Result<bool, StoreError>;

    /// List grants on a document, oldest first.
    async fn list_shares_for_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<SharedAccess>, StoreError>;

    /// List documents a profile has been granted access to.
    async fn list_documents_shared_with(
        &self,
        user_id: ProfileId,
    ) -> Result<Vec<Document>, StoreError>;

    // ── Invite codes ─────────────────────────────────────────────────

    /// Store the owner's invite code, replacing any previous one. Fails with
    /// [`StoreError::Conflict`] if another owner's code uses the same string.
    async fn replace_invite_code(&self, invite: &InviteCode) -> Result<(), StoreError>;

    /// Fetch the owner's current invite code.
    async fn get_invite_code_for_owner(
        &self,
        owner: ProfileId,
    ) -> Result<Option<InviteCode>, StoreError>;

    /// Look up an invite code by its string.
    async fn find_invite_code(&self, code: &str) -> Result<Option<InviteCode>, StoreError>;

    // ── Edit history ─────────────────────────────────────────────────

    /// Append an edit log entry.
    async fn insert_edit(&self, edit: &DocumentEdit) -> Result<(), StoreError>;

    /// List a document's edits, oldest first.
    async fn list_edits(&self, document_id: DocumentId) -> Result<Vec<DocumentEdit>, StoreError>;
}
