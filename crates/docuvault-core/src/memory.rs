//! In-memory [`Repository`] implementation.
//!
//! All tables live in one struct behind a single `RwLock`, so every method
//! sees a consistent snapshot and multi-row operations (cascading delete,
//! flag refresh) are atomic. Nothing is persisted. Used by unit tests, server
//! integration tests, and `DOCUVAULT_DATABASE=memory`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Document, DocumentEdit, DocumentId, DocumentUpdate, InviteCode, Profile, ProfileId,
    ProfileUpdate, Registration, SharedAccess,
};
use crate::repository::Repository;

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<ProfileId, Profile>,
    documents: HashMap<DocumentId, Document>,
    /// Insertion-ordered grants.
    shares: Vec<SharedAccess>,
    /// Keyed by owner: one active code per user.
    invites: HashMap<ProfileId, InviteCode>,
    edits: Vec<DocumentEdit>,
}

/// A repository that keeps every table in process memory.
///
/// Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of grants across all documents.
    pub async fn share_count(&self) -> usize {
        self.tables.read().await.shares.len()
    }
}

fn newest_first(mut docs: Vec<Document>) -> Vec<Document> {
    docs.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
    docs
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    async fn upsert_profile(&self, registration: &Registration) -> Result<Profile, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        if let Some(existing) = tables
            .profiles
            .values_mut()
            .find(|p| p.phone == registration.phone)
        {
            existing.name.clone_from(&registration.name);
            existing.email.clone_from(&registration.email);
            existing.age = registration.age;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let profile = Profile {
            id: Uuid::new_v4(),
            name: registration.name.clone(),
            phone: registration.phone.clone(),
            email: registration.email.clone(),
            age: registration.age,
            created_at: now,
            updated_at: now,
        };
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn get_profile(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn find_profile_by_phone(&self, phone: &str) -> Result<Option<Profile>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.profiles.values().find(|p| p.phone == phone).cloned())
    }

    async fn update_profile(
        &self,
        id: ProfileId,
        update: &ProfileUpdate,
    ) -> Result<Profile, StoreError> {
        let mut tables = self.tables.write().await;
        let profile = tables
            .profiles
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "profile",
                id: id.to_string(),
            })?;

        if let Some(name) = &update.name {
            profile.name.clone_from(name);
        }
        update.email.clone().apply_to(&mut profile.email);
        update.age.clone().apply_to(&mut profile.age);
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn insert_document(&self, document: &Document) -> Result<Document, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.profiles.contains_key(&document.owner_id) {
            return Err(StoreError::NotFound {
                entity: "profile",
                id: document.owner_id.to_string(),
            });
        }
        if tables.documents.contains_key(&document.id) {
            return Err(StoreError::Conflict {
                reason: format!("document '{}' already exists", document.id),
            });
        }
        tables.documents.insert(document.id, document.clone());
        Ok(document.clone())
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        Ok(self.tables.read().await.documents.get(&id).cloned())
    }

    async fn list_documents_by_owner(
        &self,
        owner: ProfileId,
    ) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.read().await;
        let docs = tables
            .documents
            .values()
            .filter(|d| d.owner_id == owner)
            .cloned()
            .collect();
        Ok(newest_first(docs))
    }

    async fn update_document(
        &self,
        id: DocumentId,
        update: &DocumentUpdate,
    ) -> Result<Document, StoreError> {
        let mut tables = self.tables.write().await;
        let doc = tables
            .documents
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "document",
                id: id.to_string(),
            })?;
        update.apply_to(doc);
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }

    async fn refresh_shared_flag(&self, id: DocumentId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let shared = tables.shares.iter().any(|s| s.document_id == id);
        let doc = tables
            .documents
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "document",
                id: id.to_string(),
            })?;
        doc.shared = shared;
        Ok(shared)
    }

    async fn delete_document(&self, id: DocumentId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.documents.remove(&id).is_none() {
            return Ok(false);
        }
        tables.shares.retain(|s| s.document_id != id);
        tables.invites.retain(|_, code| code.document_id != id);
        tables.edits.retain(|e| e.document_id != id);
        Ok(true)
    }

    async fn insert_share(&self, share: &SharedAccess) -> Result<SharedAccess, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.documents.contains_key(&share.document_id) {
            return Err(StoreError::NotFound {
                entity: "document",
                id: share.document_id.to_string(),
            });
        }
        if tables
            .shares
            .iter()
            .any(|s| s.document_id == share.document_id && s.user_id == share.user_id)
        {
            return Err(StoreError::Conflict {
                reason: format!(
                    "document '{}' is already shared with '{}'",
                    share.document_id, share.user_id
                ),
            });
        }
        tables.shares.push(share.clone());
        Ok(share.clone())
    }

    async fn find_share(
        &self,
        document_id: DocumentId,
        user_id: ProfileId,
    ) -> Result<Option<SharedAccess>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .shares
            .iter()
            .find(|s| s.document_id == document_id && s.user_id == user_id)
            .cloned())
    }

    async fn delete_share(
        &self,
        document_id: DocumentId,
        user_id: ProfileId,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.shares.len();
        tables
            .shares
            .retain(|s| !(s.document_id == document_id && s.user_id == user_id));
        Ok(tables.shares.len() != before)
    }

    async fn list_shares_for_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<SharedAccess>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .shares
            .iter()
            .filter(|s| s.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn list_documents_shared_with(
        &self,
        user_id: ProfileId,
    ) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.read().await;
        let docs = tables
            .shares
            .iter()
            .filter(|s| s.user_id == user_id)
            .filter_map(|s| tables.documents.get(&s.document_id).cloned())
            .collect();
        Ok(newest_first(docs))
    }

    async fn replace_invite_code(&self, invite: &InviteCode) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .invites
            .values()
            .any(|c| c.code == invite.code && c.owner_id != invite.owner_id)
        {
            return Err(StoreError::Conflict {
                reason: "invite code already in use".to_owned(),
            });
        }
        tables.invites.insert(invite.owner_id, invite.clone());
        Ok(())
    }

    async fn get_invite_code_for_owner(
        &self,
        owner: ProfileId,
    ) -> Result<Option<InviteCode>, StoreError> {
        Ok(self.tables.read().await.invites.get(&owner).cloned())
    }

    async fn find_invite_code(&self, code: &str) -> Result<Option<InviteCode>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.invites.values().find(|c| c.code == code).cloned())
    }

    async fn insert_edit(&self, edit: &DocumentEdit) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.documents.contains_key(&edit.document_id) {
            return Err(StoreError::NotFound {
                entity: "document",
                id: edit.document_id.to_string(),
            });
        }
        tables.edits.push(edit.clone());
        Ok(())
    }

    async fn list_edits(&self, document_id: DocumentId) -> Result<Vec<DocumentEdit>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .edits
            .iter()
            .filter(|e| e.document_id == document_id)
            .cloned()
            .collect())
    }
}
