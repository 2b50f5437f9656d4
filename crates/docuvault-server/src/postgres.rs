//! `PostgreSQL` implementation of the repository.
//!
//! Every method runs parameterized statements through a shared `PgPool`.
//! The schema is created on connect with `IF NOT EXISTS`. Unique violations
//! (SQLSTATE `23505`) surface as [`StoreError::Conflict`].
//!
//! Feature-gated behind `postgres`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use docuvault_core::error::StoreError;
use docuvault_core::models::{
    Document, DocumentEdit, DocumentId, DocumentUpdate, InsuranceType, InviteCode, Patch, Profile,
    ProfileId, ProfileUpdate, Registration, SharedAccess,
};
use docuvault_core::repository::Repository;

const SCHEMA: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS profiles (
        id          UUID PRIMARY KEY,
        name        TEXT NOT NULL,
        phone       TEXT NOT NULL UNIQUE,
        email       TEXT,
        age         INTEGER,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    r"CREATE TABLE IF NOT EXISTS documents (
        id              UUID PRIMARY KEY,
        owner_id        UUID NOT NULL REFERENCES profiles(id),
        name            TEXT NOT NULL,
        type            TEXT NOT NULL,
        provider        TEXT NOT NULL,
        policy_number   TEXT,
        premium_amount  TEXT,
        coverage_amount TEXT,
        start_date      DATE,
        end_date        DATE,
        file_url        TEXT NOT NULL,
        file_type       TEXT NOT NULL,
        file_size       BIGINT NOT NULL,
        upload_date     TIMESTAMPTZ NOT NULL,
        shared          BOOLEAN NOT NULL DEFAULT FALSE,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents (owner_id, upload_date DESC)",
    r"CREATE TABLE IF NOT EXISTS shared_documents (
        id              UUID PRIMARY KEY,
        document_id     UUID NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        shared_with_id  UUID NOT NULL REFERENCES profiles(id),
        shared_with_name TEXT NOT NULL,
        shared_by_id    UUID NOT NULL REFERENCES profiles(id),
        shared_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (document_id, shared_with_id)
    )",
    r"CREATE TABLE IF NOT EXISTS document_edits (
        id              UUID PRIMARY KEY,
        document_id     UUID NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        editor_id       UUID NOT NULL REFERENCES profiles(id),
        edit_type       TEXT NOT NULL,
        previous_value  JSONB NOT NULL,
        new_value       JSONB NOT NULL,
        edited_at       TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    r"CREATE TABLE IF NOT EXISTS invite_codes (
        owner_id    UUID PRIMARY KEY REFERENCES profiles(id),
        code        TEXT NOT NULL UNIQUE,
        owner_name  TEXT NOT NULL,
        document_id UUID NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        created_at  TIMESTAMPTZ NOT NULL,
        expires_at  TIMESTAMPTZ NOT NULL
    )",
];

/// Repository over a `PostgreSQL` connection pool.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl std::fmt::Debug for PgRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgRepository")
            .field("pool", &"[PgPool]")
            .finish_non_exhaustive()
    }
}

impl PgRepository {
    /// Connect and create the schema if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the connection or a schema
    /// statement fails.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend {
                reason: format!("connect failed: {e}"),
            })?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| StoreError::Backend {
                    reason: format!("migration failed: {e}"),
                })?;
        }

        Ok(Self { pool })
    }
}

fn has_code(err: &sqlx::Error, code: &str) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(code))
}

fn db_err(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StoreError::Conflict {
                reason: "resource already exists".to_owned(),
            }
        }
        _ => StoreError::Backend {
            reason: format!("database error: {err}"),
        },
    }
}

fn not_found(entity: &'static str, id: Uuid) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    name: String,
    phone: String,
    email: Option<String>,
    age: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            age: row.age.and_then(|a| u32::try_from(a).ok()),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    #[sqlx(rename = "type")]
    doc_type: String,
    provider: String,
    policy_number: Option<String>,
    premium_amount: Option<String>,
    coverage_amount: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    file_url: String,
    file_type: String,
    file_size: i64,
    upload_date: DateTime<Utc>,
    shared: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            doc_type: row.doc_type.parse().unwrap_or(InsuranceType::Other),
            policy_number: row.policy_number,
            provider: row.provider,
            premium: row.premium_amount,
            coverage: row.coverage_amount,
            start_date: row.start_date,
            due_date: row.end_date,
            upload_date: row.upload_date,
            file_url: row.file_url,
            file_type: row.file_type,
            file_size: u64::try_from(row.file_size).unwrap_or(0),
            shared: row.shared,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ShareRow {
    id: Uuid,
    document_id: Uuid,
    shared_with_id: Uuid,
    shared_with_name: String,
    shared_by_id: Uuid,
    shared_at: DateTime<Utc>,
}

impl From<ShareRow> for SharedAccess {
    fn from(row: ShareRow) -> Self {
        Self {
            id: row.id,
            document_id: row.document_id,
            user_id: row.shared_with_id,
            user_name: row.shared_with_name,
            shared_by_id: row.shared_by_id,
            access_granted_date: row.shared_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct InviteRow {
    code: String,
    owner_id: Uuid,
    owner_name: String,
    document_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<InviteRow> for InviteCode {
    fn from(row: InviteRow) -> Self {
        Self {
            code: row.code,
            owner_id: row.owner_id,
            owner_name: row.owner_name,
            document_id: row.document_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EditRow {
    id: Uuid,
    document_id: Uuid,
    editor_id: Uuid,
    edit_type: String,
    previous_value: serde_json::Value,
    new_value: serde_json::Value,
    edited_at: DateTime<Utc>,
}

impl From<EditRow> for DocumentEdit {
    fn from(row: EditRow) -> Self {
        Self {
            id: row.id,
            document_id: row.document_id,
            editor_id: row.editor_id,
            edit_type: row.edit_type,
            previous_value: row.previous_value,
            new_value: row.new_value,
            edited_at: row.edited_at,
        }
    }
}

fn age_param(age: Option<u32>) -> Option<i32> {
    age.and_then(|a| i32::try_from(a).ok())
}

/// `(set, value)` pair for a `CASE WHEN $n THEN $m ELSE col END` update.
fn patch_param<T: Clone>(patch: &Patch<T>) -> (bool, Option<T>) {
    match patch {
        Patch::Absent => (false, None),
        Patch::Null => (true, None),
        Patch::Value(v) => (true, Some(v.clone())),
    }
}

#[async_trait::async_trait]
impl Repository for PgRepository {
    // ── Profiles ─────────────────────────────────────────────────────

    async fn upsert_profile(&self, registration: &Registration) -> Result<Profile, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r"INSERT INTO profiles (id, name, phone, email, age)
              VALUES ($1, $2, $3, $4, $5)
              ON CONFLICT (phone) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                age = EXCLUDED.age,
                updated_at = now()
              RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&registration.name)
        .bind(&registration.phone)
        .bind(&registration.email)
        .bind(age_param(registration.age))
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    async fn get_profile(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_profile_by_phone(&self, phone: &str) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE phone = $1")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn update_profile(
        &self,
        id: ProfileId,
        update: &ProfileUpdate,
    ) -> Result<Profile, StoreError> {
        let (set_email, email) = patch_param(&update.email);
        let (set_age, age) = patch_param(&update.age);

        sqlx::query_as::<_, ProfileRow>(
            r"UPDATE profiles SET
                name = COALESCE($2, name),
                email = CASE WHEN $3 THEN $4 ELSE email END,
                age = CASE WHEN $5 THEN $6 ELSE age END,
                updated_at = now()
              WHERE id = $1
              RETURNING *",
        )
        .bind(id)
        .bind(&update.name)
        .bind(set_email)
        .bind(email)
        .bind(set_age)
        .bind(age_param(age))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .map(Into::into)
        .ok_or_else(|| not_found("profile", id))
    }

    // ── Documents ────────────────────────────────────────────────────

    async fn insert_document(&self, document: &Document) -> Result<Document, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r"INSERT INTO documents (
                id, owner_id, name, type, provider, policy_number, premium_amount,
                coverage_amount, start_date, end_date, file_url, file_type, file_size,
                upload_date, shared, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
              RETURNING *",
        )
        .bind(document.id)
        .bind(document.owner_id)
        .bind(&document.name)
        .bind(document.doc_type.to_string())
        .bind(&document.provider)
        .bind(&document.policy_number)
        .bind(&document.premium)
        .bind(&document.coverage)
        .bind(document.start_date)
        .bind(document.due_date)
        .bind(&document.file_url)
        .bind(&document.file_type)
        .bind(i64::try_from(document.file_size).unwrap_or(i64::MAX))
        .bind(document.upload_date)
        .bind(document.shared)
        .bind(document.created_at)
        .bind(document.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if has_code(&e, "23503") {
                not_found("profile", document.owner_id)
            } else {
                db_err(e)
            }
        })?;

        Ok(row.into())
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn list_documents_by_owner(
        &self,
        owner: ProfileId,
    ) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM documents WHERE owner_id = $1 ORDER BY upload_date DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_document(
        &self,
        id: DocumentId,
        update: &DocumentUpdate,
    ) -> Result<Document, StoreError> {
        let (set_policy, policy) = patch_param(&update.policy_number);
        let (set_premium, premium) = patch_param(&update.premium);
        let (set_due, due) = patch_param(&update.due_date);

        sqlx::query_as::<_, DocumentRow>(
            r"UPDATE documents SET
                name = COALESCE($2, name),
                type = COALESCE($3, type),
                provider = COALESCE($4, provider),
                policy_number = CASE WHEN $5 THEN $6 ELSE policy_number END,
                premium_amount = CASE WHEN $7 THEN $8 ELSE premium_amount END,
                end_date = CASE WHEN $9 THEN $10 ELSE end_date END,
                updated_at = now()
              WHERE id = $1
              RETURNING *",
        )
        .bind(id)
        .bind(&update.name)
        .bind(update.doc_type.map(|t| t.to_string()))
        .bind(&update.provider)
        .bind(set_policy)
        .bind(policy)
        .bind(set_premium)
        .bind(premium)
        .bind(set_due)
        .bind(due)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .map(Into::into)
        .ok_or_else(|| not_found("document", id))
    }

    async fn refresh_shared_flag(&self, id: DocumentId) -> Result<bool, StoreError> {
        let shared: Option<bool> = sqlx::query_scalar(
            r"UPDATE documents SET shared = EXISTS (
                SELECT 1 FROM shared_documents WHERE document_id = $1)
              WHERE id = $1
              RETURNING shared",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        shared.ok_or_else(|| not_found("document", id))
    }

    async fn delete_document(&self, id: DocumentId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for statement in [
            "DELETE FROM shared_documents WHERE document_id = $1",
            "DELETE FROM invite_codes WHERE document_id = $1",
            "DELETE FROM document_edits WHERE document_id = $1",
        ] {
            sqlx::query(statement)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    // ── Grants ───────────────────────────────────────────────────────

    async fn insert_share(&self, share: &SharedAccess) -> Result<SharedAccess, StoreError> {
        let row = sqlx::query_as::<_, ShareRow>(
            r"INSERT INTO shared_documents
                (id, document_id, shared_with_id, shared_with_name, shared_by_id, shared_at)
              VALUES ($1, $2, $3, $4, $5, $6)
              RETURNING *",
        )
        .bind(share.id)
        .bind(share.document_id)
        .bind(share.user_id)
        .bind(&share.user_name)
        .bind(share.shared_by_id)
        .bind(share.access_granted_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if has_code(&e, "23503") {
                not_found("document", share.document_id)
            } else {
                db_err(e)
            }
        })?;

        Ok(row.into())
    }

    async fn find_share(
        &self,
        document_id: DocumentId,
        user_id: ProfileId,
    ) -> Result<Option<SharedAccess>, StoreError> {
        let row = sqlx::query_as::<_, ShareRow>(
            "SELECT * FROM shared_documents WHERE document_id = $1 AND shared_with_id = $2",
        )
        .bind(document_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn delete_share(
        &self,
        document_id: DocumentId,
        user_id: ProfileId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM shared_documents WHERE document_id = $1 AND shared_with_id = $2",
        )
        .bind(document_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_shares_for_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<SharedAccess>, StoreError> {
        let rows = sqlx::query_as::<_, ShareRow>(
            "SELECT * FROM shared_documents WHERE document_id = $1 ORDER BY shared_at",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_documents_shared_with(
        &self,
        user_id: ProfileId,
    ) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r"SELECT d.* FROM documents d
              JOIN shared_documents s ON s.document_id = d.id
              WHERE s.shared_with_id = $1
              ORDER BY d.upload_date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ── Invite codes ─────────────────────────────────────────────────

    async fn replace_invite_code(&self, invite: &InviteCode) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO invite_codes (owner_id, code, owner_name, document_id, created_at, expires_at)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (owner_id) DO UPDATE SET
                code = EXCLUDED.code,
                owner_name = EXCLUDED.owner_name,
                document_id = EXCLUDED.document_id,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at",
        )
        .bind(invite.owner_id)
        .bind(&invite.code)
        .bind(&invite.owner_name)
        .bind(invite.document_id)
        .bind(invite.created_at)
        .bind(invite.expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_invite_code_for_owner(
        &self,
        owner: ProfileId,
    ) -> Result<Option<InviteCode>, StoreError> {
        let row = sqlx::query_as::<_, InviteRow>("SELECT * FROM invite_codes WHERE owner_id = $1")
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_invite_code(&self, code: &str) -> Result<Option<InviteCode>, StoreError> {
        let row = sqlx::query_as::<_, InviteRow>("SELECT * FROM invite_codes WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    // ── Edit history ─────────────────────────────────────────────────

    async fn insert_edit(&self, edit: &DocumentEdit) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO document_edits
                (id, document_id, editor_id, edit_type, previous_value, new_value, edited_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(edit.id)
        .bind(edit.document_id)
        .bind(edit.editor_id)
        .bind(&edit.edit_type)
        .bind(&edit.previous_value)
        .bind(&edit.new_value)
        .bind(edit.edited_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_edits(&self, document_id: DocumentId) -> Result<Vec<DocumentEdit>, StoreError> {
        let rows = sqlx::query_as::<_, EditRow>(
            "SELECT * FROM document_edits WHERE document_id = $1 ORDER BY edited_at",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
