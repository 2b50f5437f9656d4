//! Domain models.
//!
//! Profiles, documents, access grants, invite codes and the document edit
//! log. All IDs are UUIDs. Dates without a time component (`due_date`,
//! `start_date`) are `NaiveDate` and serialize as `YYYY-MM-DD`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Identifier of a [`Profile`].
pub type ProfileId = Uuid;

/// Identifier of a [`Document`].
pub type DocumentId = Uuid;

// ── Partial updates ──────────────────────────────────────────────────

/// A field in a partial update that distinguishes "not sent" from "sent as
/// null".
///
/// Deserializes `null` as [`Patch::Null`] and a value as [`Patch::Value`];
/// use `#[serde(default)]` so a missing key becomes [`Patch::Absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    /// Leave the stored value untouched.
    Absent,
    /// Clear the stored value.
    Null,
    /// Replace the stored value.
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Patch<T> {
    /// Whether the field was not sent at all.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Apply this patch to an optional stored value.
    pub fn apply_to(self, target: &mut Option<T>) {
        match self {
            Self::Absent => {}
            Self::Null => *target = None,
            Self::Value(v) => *target = Some(v),
        }
    }

    /// Borrow the inner value.
    #[must_use]
    pub const fn as_ref(&self) -> Patch<&T> {
        match self {
            Self::Absent => Patch::Absent,
            Self::Null => Patch::Null,
            Self::Value(v) => Patch::Value(v),
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Value)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_some(v),
            Self::Absent | Self::Null => serializer.serialize_none(),
        }
    }
}

// ── Profiles ─────────────────────────────────────────────────────────

/// A registered user's identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub age: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration details staged until the OTP is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
}

/// Partial profile edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub email: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub age: Patch<u32>,
}

impl ProfileUpdate {
    /// Whether the update carries no field at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_absent() && self.age.is_absent()
    }
}

// ── Documents ────────────────────────────────────────────────────────

/// Insurance policy category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InsuranceType {
    Health,
    Auto,
    Life,
    Home,
    General,
    Other,
}

impl std::fmt::Display for InsuranceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Health => write!(f, "Health"),
            Self::Auto => write!(f, "Auto"),
            Self::Life => write!(f, "Life"),
            Self::Home => write!(f, "Home"),
            Self::General => write!(f, "General"),
            Self::Other => write!(f, "Other"),
        }
    }
}

impl std::str::FromStr for InsuranceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "health" => Ok(Self::Health),
            "auto" => Ok(Self::Auto),
            "life" => Ok(Self::Life),
            "home" => Ok(Self::Home),
            "general" => Ok(Self::General),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown insurance type: {other}")),
        }
    }
}

/// One insurance-policy file plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub owner_id: ProfileId,
    pub name: String,
    #[serde(rename = "type")]
    pub doc_type: InsuranceType,
    pub policy_number: Option<String>,
    pub provider: String,
    /// Free text, e.g. `$150/month`.
    pub premium: Option<String>,
    pub coverage: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub upload_date: DateTime<Utc>,
    pub file_url: String,
    pub file_type: String,
    pub file_size: u64,
    /// True iff at least one [`SharedAccess`] row exists for this document.
    pub shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata supplied explicitly with an upload. Every field is optional;
/// missing ones are filled from filename extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub doc_type: Option<InsuranceType>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub policy_number: Option<String>,
    #[serde(default)]
    pub premium: Option<String>,
    #[serde(default)]
    pub coverage: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Partial document edit. Only these fields are editable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<InsuranceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub policy_number: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub premium: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub due_date: Patch<NaiveDate>,
}

impl DocumentUpdate {
    /// Whether the update carries no field at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.doc_type.is_none()
            && self.provider.is_none()
            && self.policy_number.is_absent()
            && self.premium.is_absent()
            && self.due_date.is_absent()
    }

    /// Apply the update to a document in place. Does not touch `updated_at`.
    pub fn apply_to(&self, doc: &mut Document) {
        if let Some(name) = &self.name {
            doc.name.clone_from(name);
        }
        if let Some(doc_type) = self.doc_type {
            doc.doc_type = doc_type;
        }
        if let Some(provider) = &self.provider {
            doc.provider.clone_from(provider);
        }
        self.policy_number.clone().apply_to(&mut doc.policy_number);
        self.premium.clone().apply_to(&mut doc.premium);
        self.due_date.clone().apply_to(&mut doc.due_date);
    }
}

// ── Sharing ──────────────────────────────────────────────────────────

/// A grant of read access on one document to one grantee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedAccess {
    pub id: Uuid,
    pub document_id: DocumentId,
    /// The grantee.
    pub user_id: ProfileId,
    /// Grantee name at grant time.
    pub user_name: String,
    /// The document owner who issued the invite code.
    pub shared_by_id: ProfileId,
    pub access_granted_date: DateTime<Utc>,
}

/// A short code an owner hands out so another user can redeem access to
/// one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteCode {
    pub code: String,
    pub owner_id: ProfileId,
    pub owner_name: String,
    pub document_id: DocumentId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl InviteCode {
    /// Whether the code is no longer redeemable at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// `now + ttl`, saturating at the ends of the representable range.
#[must_use]
pub fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(if ttl < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

// ── Audit ────────────────────────────────────────────────────────────

/// One entry in a document's edit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEdit {
    pub id: Uuid,
    pub document_id: DocumentId,
    pub editor_id: ProfileId,
    pub edit_type: String,
    pub previous_value: serde_json::Value,
    pub new_value: serde_json::Value,
    pub edited_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn expiry_saturates_instead_of_overflowing() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, Duration::seconds(60)), now + Duration::seconds(60));
        assert_eq!(expiry_after(now, Duration::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(expiry_after(now, Duration::MIN), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn patch_distinguishes_absent_null_and_value() {
        let update: DocumentUpdate = serde_json::from_str(r#"{"premium": null}"#).unwrap();
        assert_eq!(update.premium, Patch::Null);
        assert!(update.policy_number.is_absent());

        let update: DocumentUpdate =
            serde_json::from_str(r#"{"due_date": "2025-03-01", "type": "Life"}"#).unwrap();
        assert_eq!(
            update.due_date,
            Patch::Value(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
        );
        assert_eq!(update.doc_type, Some(InsuranceType::Life));
    }

    #[test]
    fn update_serializes_only_sent_fields() {
        let update = DocumentUpdate {
            provider: Some("Geico".to_owned()),
            premium: Patch::Null,
            ..DocumentUpdate::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"provider": "Geico", "premium": null}));
    }

    #[test]
    fn insurance_type_parses_case_insensitively() {
        assert_eq!("HEALTH".parse::<InsuranceType>().unwrap(), InsuranceType::Health);
        assert!("boat".parse::<InsuranceType>().is_err());
        assert_eq!(InsuranceType::Home.to_string(), "Home");
    }

    #[test]
    fn patch_apply_clears_and_sets() {
        let mut stored = Some("old".to_owned());
        Patch::Absent.apply_to(&mut stored);
        assert_eq!(stored.as_deref(), Some("old"));
        Patch::Value("new".to_owned()).apply_to(&mut stored);
        assert_eq!(stored.as_deref(), Some("new"));
        Patch::Null.apply_to(&mut stored);
        assert_eq!(stored, None);
    }
}
