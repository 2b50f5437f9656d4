//! Document upload, read, edit and delete.
//!
//! Visibility: a document is visible to its owner and to every grantee.
//! Edits, deletes and the edit log are owner-only. Callers that cannot see a
//! document get [`DocumentError::NotFound`], grantees attempting an
//! owner-only operation get [`DocumentError::Forbidden`].
//!
//! Uploading is two steps (object write, then row insert) and is not atomic.
//! If the insert fails the object is deleted best-effort; if deleting a row
//! succeeds but deleting its object fails, the object is left behind and
//! logged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use docuvault_storage::ObjectStore;
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DocumentError, StoreError};
use crate::extract::{ExtractedInfo, extract_document_info};
use crate::models::{
    Document, DocumentDetails, DocumentEdit, DocumentId, DocumentUpdate, ProfileId,
};
use crate::repository::Repository;
use crate::upload::{PublicUrls, UploadFile, upload_file_to_storage, validate_file};

/// Edit type recorded for field updates.
pub const EDIT_TYPE_UPDATE: &str = "update";

/// How the caller relates to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Owner,
    Grantee,
}

/// Document operations over a repository and an object store.
pub struct DocumentService {
    repo: Arc<dyn Repository>,
    store: Arc<dyn ObjectStore>,
    urls: PublicUrls,
}

impl DocumentService {
    /// Create the service.
    #[must_use]
    pub fn new(repo: Arc<dyn Repository>, store: Arc<dyn ObjectStore>, urls: PublicUrls) -> Self {
        Self { repo, store, urls }
    }

    /// Public URL mapping used for stored files.
    #[must_use]
    pub const fn urls(&self) -> &PublicUrls {
        &self.urls
    }

    /// Validate, store and record a new document owned by `owner_id`.
    ///
    /// Explicit `details` win per field; missing fields come from
    /// [`extract_document_info`]. The name defaults to `"{type} Insurance"`.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::Unauthenticated`] if `owner_id` has no profile.
    /// - [`DocumentError::Validation`] if the file is rejected.
    /// - [`DocumentError::Storage`] if the object write fails.
    /// - [`DocumentError::Store`] if the row insert fails.
    pub async fn upload(
        &self,
        owner_id: ProfileId,
        file: UploadFile,
        details: DocumentDetails,
    ) -> Result<Document, DocumentError> {
        if self.repo.get_profile(owner_id).await?.is_none() {
            return Err(DocumentError::Unauthenticated);
        }
        validate_file(&file)?;

        let stored =
            upload_file_to_storage(self.store.as_ref(), &self.urls, &file, owner_id).await?;

        let now = Utc::now();
        let extracted = extract_document_info(&file.name, now);
        let document = merge_details(owner_id, &file, stored.url, details, extracted, now);

        match self.repo.insert_document(&document).await {
            Ok(doc) => {
                info!(
                    document_id = %doc.id,
                    owner_id = %owner_id,
                    doc_type = %doc.doc_type,
                    file_size = doc.file_size,
                    "document uploaded"
                );
                Ok(doc)
            }
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&stored.key).await {
                    warn!(key = %stored.key, error = %cleanup, "orphaned object after failed insert");
                }
                Err(e.into())
            }
        }
    }

    /// Guess metadata for a file name without uploading anything.
    #[must_use]
    pub fn extract(&self, file_name: &str) -> ExtractedInfo {
        extract_document_info(file_name, Utc::now())
    }

    /// Documents owned by `owner_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Store`] if the repository fails.
    pub async fn list_mine(&self, owner_id: ProfileId) -> Result<Vec<Document>, DocumentError> {
        Ok(self.repo.list_documents_by_owner(owner_id).await?)
    }

    /// Fetch a document visible to `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] if it does not exist or `actor`
    /// is neither owner nor grantee.
    pub async fn get(&self, actor: ProfileId, id: DocumentId) -> Result<Document, DocumentError> {
        let (doc, _) = self.load_visible(actor, id).await?;
        Ok(doc)
    }

    /// Apply a partial update. Owner only.
    ///
    /// An edit log entry with before/after values of the changed fields is
    /// appended; failing to append it is logged and does not fail the update.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::InvalidRequest`] if the update carries no field or
    ///   blanks a required one.
    /// - [`DocumentError::NotFound`] / [`DocumentError::Forbidden`] per the
    ///   visibility rules.
    pub async fn update(
        &self,
        actor: ProfileId,
        id: DocumentId,
        update: DocumentUpdate,
    ) -> Result<Document, DocumentError> {
        if update.is_empty() {
            return Err(DocumentError::InvalidRequest {
                reason: "no fields to update".to_owned(),
            });
        }
        for (field, value) in [("name", &update.name), ("provider", &update.provider)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(DocumentError::InvalidRequest {
                    reason: format!("{field} must not be blank"),
                });
            }
        }

        let (before, _) = self.load_owned(actor, id, "only the owner can edit").await?;
        let after = self
            .repo
            .update_document(id, &update)
            .await
            .map_err(|e| not_found_as(id, e))?;

        let edit = DocumentEdit {
            id: Uuid::new_v4(),
            document_id: id,
            editor_id: actor,
            edit_type: EDIT_TYPE_UPDATE.to_owned(),
            previous_value: changed_fields(&update, &before),
            new_value: changed_fields(&update, &after),
            edited_at: after.updated_at,
        };
        if let Err(e) = self.repo.insert_edit(&edit).await {
            warn!(document_id = %id, error = %e, "could not record document edit");
        }

        info!(document_id = %id, editor_id = %actor, "document updated");
        Ok(after)
    }

    /// Delete a document, its grants, invite codes and edit log, then its
    /// stored object. Owner only.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::NotFound`] / [`DocumentError::Forbidden`] per the
    ///   visibility rules. A second delete is `NotFound`.
    /// - [`DocumentError::Store`] if the repository fails.
    pub async fn delete(&self, actor: ProfileId, id: DocumentId) -> Result<(), DocumentError> {
        let (doc, _) = self.load_owned(actor, id, "only the owner can delete").await?;

        if !self.repo.delete_document(id).await? {
            return Err(DocumentError::NotFound { id });
        }

        match self.urls.key_from_url(&doc.file_url) {
            Some(key) => {
                if let Err(e) = self.store.delete(&key).await {
                    warn!(document_id = %id, %key, error = %e, "could not delete stored object");
                }
            }
            None => warn!(document_id = %id, url = %doc.file_url, "file url is not a local object"),
        }

        info!(document_id = %id, owner_id = %actor, "document deleted");
        Ok(())
    }

    /// Edit history of a document, oldest first. Owner only.
    ///
    /// # Errors
    ///
    /// [`DocumentError::NotFound`] / [`DocumentError::Forbidden`] per the
    /// visibility rules.
    pub async fn edits(
        &self,
        actor: ProfileId,
        id: DocumentId,
    ) -> Result<Vec<DocumentEdit>, DocumentError> {
        self.load_owned(actor, id, "only the owner can view the edit history")
            .await?;
        Ok(self.repo.list_edits(id).await?)
    }

    /// Read the stored binary of a visible document.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::NotFound`] if the document is not visible or its
    ///   object is missing.
    /// - [`DocumentError::Storage`] if the object store fails.
    pub async fn download(
        &self,
        actor: ProfileId,
        id: DocumentId,
    ) -> Result<(Document, Vec<u8>), DocumentError> {
        let (doc, _) = self.load_visible(actor, id).await?;
        let key = self
            .urls
            .key_from_url(&doc.file_url)
            .ok_or(DocumentError::NotFound { id })?;
        let bytes = self
            .store
            .get(&key)
            .await?
            .ok_or(DocumentError::NotFound { id })?;
        Ok((doc, bytes))
    }

    async fn load_visible(
        &self,
        actor: ProfileId,
        id: DocumentId,
    ) -> Result<(Document, Access), DocumentError> {
        let doc = self
            .repo
            .get_document(id)
            .await?
            .ok_or(DocumentError::NotFound { id })?;
        if doc.owner_id == actor {
            return Ok((doc, Access::Owner));
        }
        if self.repo.find_share(id, actor).await?.is_some() {
            return Ok((doc, Access::Grantee));
        }
        Err(DocumentError::NotFound { id })
    }

    async fn load_owned(
        &self,
        actor: ProfileId,
        id: DocumentId,
        reason: &str,
    ) -> Result<(Document, Access), DocumentError> {
        match self.load_visible(actor, id).await? {
            (doc, Access::Owner) => Ok((doc, Access::Owner)),
            (_, Access::Grantee) => Err(DocumentError::Forbidden {
                reason: reason.to_owned(),
            }),
        }
    }
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("urls", &self.urls)
            .finish_non_exhaustive()
    }
}

fn not_found_as(id: DocumentId, e: StoreError) -> DocumentError {
    match e {
        StoreError::NotFound { .. } => DocumentError::NotFound { id },
        other => other.into(),
    }
}

fn merge_details(
    owner_id: ProfileId,
    file: &UploadFile,
    file_url: String,
    details: DocumentDetails,
    extracted: ExtractedInfo,
    now: DateTime<Utc>,
) -> Document {
    let doc_type = details.doc_type.unwrap_or(extracted.doc_type);
    let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    Document {
        id: Uuid::new_v4(),
        owner_id,
        name: non_blank(details.name).unwrap_or_else(|| format!("{doc_type} Insurance")),
        doc_type,
        policy_number: Some(non_blank(details.policy_number).unwrap_or(extracted.policy_number)),
        provider: non_blank(details.provider).unwrap_or(extracted.provider),
        premium: Some(non_blank(details.premium).unwrap_or(extracted.premium)),
        coverage: non_blank(details.coverage),
        start_date: details.start_date,
        due_date: Some(details.due_date.unwrap_or(extracted.due_date)),
        upload_date: now,
        file_url,
        file_type: file.effective_content_type(),
        file_size: file.size(),
        shared: false,
        created_at: now,
        updated_at: now,
    }
}

/// JSON object holding `doc`'s values for the fields `update` touches.
fn changed_fields(update: &DocumentUpdate, doc: &Document) -> Value {
    let Ok(Value::Object(touched)) = serde_json::to_value(update) else {
        return Value::Null;
    };
    let Ok(Value::Object(all)) = serde_json::to_value(doc) else {
        return Value::Null;
    };
    let picked: Map<String, Value> = touched
        .keys()
        .filter_map(|k| all.get(k).map(|v| (k.clone(), v.clone())))
        .collect();
    Value::Object(picked)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use docuvault_storage::MemoryObjectStore;
    use serde_json::json;

    use super::*;
    use crate::memory::MemoryRepository;
    use crate::models::{InsuranceType, Patch, Registration, SharedAccess};

    struct Fixture {
        repo: Arc<MemoryRepository>,
        store: Arc<MemoryObjectStore>,
        service: DocumentService,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        let store = Arc::new(MemoryObjectStore::new());
        let service = DocumentService::new(
            repo.clone(),
            store.clone(),
            PublicUrls::new("http://localhost/storage/documents"),
        );
        Fixture {
            repo,
            store,
            service,
        }
    }

    async fn user(repo: &MemoryRepository, phone: &str) -> ProfileId {
        repo.upsert_profile(&Registration {
            name: format!("user {phone}"),
            phone: phone.to_owned(),
            email: None,
            age: None,
        })
        .await
        .unwrap()
        .id
    }

    fn pdf(name: &str) -> UploadFile {
        UploadFile {
            name: name.to_owned(),
            content_type: Some("application/pdf".to_owned()),
            bytes: b"%PDF-1.7".to_vec(),
        }
    }

    #[tokio::test]
    async fn upload_uses_extracted_defaults() {
        let fx = fixture();
        let owner = user(&fx.repo, "1").await;

        let doc = fx
            .service
            .upload(owner, pdf("auto_policy.pdf"), DocumentDetails::default())
            .await
            .unwrap();

        let listed = fx.service.list_mine(owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], doc);
        assert_eq!(doc.owner_id, owner);
        assert_eq!(doc.doc_type, InsuranceType::Auto);
        assert_eq!(doc.name, "Auto Insurance");
        assert_eq!(doc.provider, "Geico");
        assert_eq!(doc.premium.as_deref(), Some("$125/month"));
        assert_eq!(doc.file_type, "application/pdf");
        assert_eq!(doc.file_size, 8);
        assert!(!doc.shared);
        assert_eq!(fx.store.len().await, 1);
    }

    #[tokio::test]
    async fn explicit_details_win_per_field() {
        let fx = fixture();
        let owner = user(&fx.repo, "1").await;
        let due = NaiveDate::from_ymd_opt(2026, 6, 30).unwrap();

        let doc = fx
            .service
            .upload(
                owner,
                pdf("health-card.pdf"),
                DocumentDetails {
                    name: Some("Family plan".to_owned()),
                    provider: Some("Aetna".to_owned()),
                    due_date: Some(due),
                    ..DocumentDetails::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(doc.name, "Family plan");
        assert_eq!(doc.provider, "Aetna");
        assert_eq!(doc.due_date, Some(due));
        assert_eq!(doc.doc_type, InsuranceType::Health);
        assert_eq!(doc.premium.as_deref(), Some("$250/month"));
    }

    #[tokio::test]
    async fn upload_rejects_unknown_owner_and_bad_files() {
        let fx = fixture();
        let err = fx
            .service
            .upload(Uuid::new_v4(), pdf("a.pdf"), DocumentDetails::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Unauthenticated));

        let owner = user(&fx.repo, "1").await;
        let err = fx
            .service
            .upload(owner, pdf("a.docx"), DocumentDetails::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Validation(_)));
        assert!(fx.store.is_empty().await);
    }

    #[tokio::test]
    async fn update_is_owner_only_and_audited() {
        let fx = fixture();
        let owner = user(&fx.repo, "1").await;
        let guest = user(&fx.repo, "2").await;
        let stranger = user(&fx.repo, "3").await;
        let doc = fx
            .service
            .upload(owner, pdf("life.pdf"), DocumentDetails::default())
            .await
            .unwrap();
        fx.repo
            .insert_share(&SharedAccess {
                id: Uuid::new_v4(),
                document_id: doc.id,
                user_id: guest,
                user_name: "guest".to_owned(),
                shared_by_id: owner,
                access_granted_date: Utc::now(),
            })
            .await
            .unwrap();

        let update = DocumentUpdate {
            provider: Some("Prudential".to_owned()),
            premium: Patch::Null,
            ..DocumentUpdate::default()
        };

        let err = fx.service.update(guest, doc.id, update.clone()).await.unwrap_err();
        assert!(matches!(err, DocumentError::Forbidden { .. }));
        let err = fx
            .service
            .update(stranger, doc.id, update.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::NotFound { .. }));

        let updated = fx.service.update(owner, doc.id, update).await.unwrap();
        assert_eq!(updated.provider, "Prudential");
        assert_eq!(updated.premium, None);
        assert_eq!(updated.name, doc.name);

        let edits = fx.service.edits(owner, doc.id).await.unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(
            edits[0].previous_value,
            json!({"provider": "MetLife", "premium": "$75/month"})
        );
        assert_eq!(edits[0].new_value, json!({"provider": "Prudential", "premium": null}));
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let fx = fixture();
        let owner = user(&fx.repo, "1").await;
        let doc = fx
            .service
            .upload(owner, pdf("home.pdf"), DocumentDetails::default())
            .await
            .unwrap();
        let err = fx
            .service
            .update(owner, doc.id, DocumentUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn delete_removes_row_grants_and_object() {
        let fx = fixture();
        let owner = user(&fx.repo, "1").await;
        let guest = user(&fx.repo, "2").await;
        let doc = fx
            .service
            .upload(owner, pdf("home.pdf"), DocumentDetails::default())
            .await
            .unwrap();
        fx.repo
            .insert_share(&SharedAccess {
                id: Uuid::new_v4(),
                document_id: doc.id,
                user_id: guest,
                user_name: "guest".to_owned(),
                shared_by_id: owner,
                access_granted_date: Utc::now(),
            })
            .await
            .unwrap();

        let err = fx.service.delete(guest, doc.id).await.unwrap_err();
        assert!(matches!(err, DocumentError::Forbidden { .. }));

        fx.service.delete(owner, doc.id).await.unwrap();
        assert!(fx.service.list_mine(owner).await.unwrap().is_empty());
        assert!(fx.repo.list_shares_for_document(doc.id).await.unwrap().is_empty());
        assert!(fx.store.is_empty().await);

        let err = fx.service.delete(owner, doc.id).await.unwrap_err();
        assert!(matches!(err, DocumentError::NotFound { .. }));
        assert_eq!(fx.repo.share_count().await, 0);
    }

    #[tokio::test]
    async fn grantee_can_read_and_download() {
        let fx = fixture();
        let owner = user(&fx.repo, "1").await;
        let guest = user(&fx.repo, "2").await;
        let doc = fx
            .service
            .upload(owner, pdf("auto.pdf"), DocumentDetails::default())
            .await
            .unwrap();

        assert!(matches!(
            fx.service.get(guest, doc.id).await,
            Err(DocumentError::NotFound { .. })
        ));
        fx.repo
            .insert_share(&SharedAccess {
                id: Uuid::new_v4(),
                document_id: doc.id,
                user_id: guest,
                user_name: "guest".to_owned(),
                shared_by_id: owner,
                access_granted_date: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(fx.service.get(guest, doc.id).await.unwrap().id, doc.id);
        let (_, bytes) = fx.service.download(guest, doc.id).await.unwrap();
        assert_eq!(bytes, b"%PDF-1.7");
    }
}
