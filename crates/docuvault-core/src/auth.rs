//! Phone + OTP registration and login.
//!
//! Flow per phone number:
//!
//! ```text
//! unauthenticated ──send_otp / register──▶ otp_pending ──verify_otp──▶ authenticated
//!        ▲                                      │
//!        └──────── cancel / wrong OTP / TTL ────┘
//! ```
//!
//! No SMS is sent. The challenge is the fixed [`DEMO_OTP`], compared in
//! constant time. `register` stages the profile details; the profile row is
//! only written once the OTP is confirmed. A `verify_otp` without staged
//! details is a login and needs an existing profile.
//!
//! Phone numbers are masked in logs. OTPs and session tokens are never
//! logged.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{AuthError, StoreError, ValidationError};
use crate::models::{Patch, Profile, ProfileId, ProfileUpdate, Registration, expiry_after};
use crate::repository::Repository;
use crate::session::SessionStore;

/// The only OTP the service accepts.
pub const DEMO_OTP: &str = "123456";

/// A phone number waiting for its OTP.
#[derive(Debug, Clone)]
struct PendingOtp {
    /// Staged details when this is a registration, `None` for a login.
    registration: Option<Registration>,
    expires_at: DateTime<Utc>,
}

/// Where a phone number is in the OTP flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    OtpPending,
}

/// Whether a verification created a profile or logged into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    Registered,
    LoggedIn,
}

/// Result of a successful OTP verification.
#[derive(Debug, Clone, Serialize)]
pub struct AuthOutcome {
    pub kind: AuthKind,
    pub profile: Profile,
    /// Plaintext session token. Returned once.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Registration, OTP verification, sessions and profile edits.
pub struct AuthService {
    repo: Arc<dyn Repository>,
    sessions: SessionStore,
    pending: RwLock<HashMap<String, PendingOtp>>,
    otp_ttl: Duration,
}

impl AuthService {
    /// Create the service.
    #[must_use]
    pub fn new(repo: Arc<dyn Repository>, session_ttl: Duration, otp_ttl: Duration) -> Self {
        Self {
            repo,
            sessions: SessionStore::new(session_ttl),
            pending: RwLock::new(HashMap::new()),
            otp_ttl,
        }
    }

    /// Start a login for `phone`. Always succeeds for a non-blank phone.
    ///
    /// A registration already staged for the phone is kept.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmptyPhone`] if `phone` is blank.
    pub async fn send_otp(&self, phone: &str) -> Result<(), AuthError> {
        let phone = normalize_phone(phone)?;
        let expires_at = expiry_after(Utc::now(), self.otp_ttl);

        let mut pending = self.pending.write().await;
        sweep_expired(&mut pending);
        let registration = pending.get(&phone).and_then(|p| p.registration.clone());
        pending.insert(
            phone.clone(),
            PendingOtp {
                registration,
                expires_at,
            },
        );

        info!(phone = %mask_phone(&phone), "otp challenge issued");
        Ok(())
    }

    /// Stage registration details and issue the OTP challenge.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingField`] if name or phone is blank.
    /// - [`AuthError::Validation`] if the email or age is malformed.
    pub async fn register(&self, registration: Registration) -> Result<(), AuthError> {
        let registration = validate_registration(registration)?;
        let phone = registration.phone.clone();

        let expires_at = expiry_after(Utc::now(), self.otp_ttl);

        let mut pending = self.pending.write().await;
        sweep_expired(&mut pending);
        pending.insert(
            phone.clone(),
            PendingOtp {
                registration: Some(registration),
                expires_at,
            },
        );
        drop(pending);

        info!(phone = %mask_phone(&phone), "registration staged");
        Ok(())
    }

    /// Confirm the OTP for `phone`.
    ///
    /// With a staged registration, upserts the profile keyed by phone;
    /// otherwise logs into the existing profile. A wrong OTP clears the
    /// pending state.
    ///
    /// # Errors
    ///
    /// - [`AuthError::EmptyPhone`] if `phone` is blank.
    /// - [`AuthError::InvalidOtp`] if the OTP does not match.
    /// - [`AuthError::ProfileNotFound`] on login for an unknown phone.
    /// - [`AuthError::Store`] if the repository fails.
    pub async fn verify_otp(&self, phone: &str, otp: &str) -> Result<AuthOutcome, AuthError> {
        let phone = normalize_phone(phone)?;

        let staged = self
            .pending
            .write()
            .await
            .remove(&phone)
            .filter(|p| !p.is_expired());

        if !otp_matches(otp) {
            warn!(phone = %mask_phone(&phone), "otp verification failed");
            return Err(AuthError::InvalidOtp);
        }

        let (kind, profile) = match staged.and_then(|p| p.registration) {
            Some(registration) => {
                let profile = self.repo.upsert_profile(&registration).await?;
                info!(profile_id = %profile.id, "profile registered");
                (AuthKind::Registered, profile)
            }
            None => {
                let profile = self
                    .repo
                    .find_profile_by_phone(&phone)
                    .await?
                    .ok_or(AuthError::ProfileNotFound)?;
                info!(profile_id = %profile.id, "profile logged in");
                (AuthKind::LoggedIn, profile)
            }
        };

        let (token, session) = self.sessions.create(profile.id).await;
        Ok(AuthOutcome {
            kind,
            profile,
            token,
            expires_at: session.expires_at,
        })
    }

    /// Abandon a pending challenge. Returns `false` if nothing was pending.
    pub async fn cancel(&self, phone: &str) -> bool {
        let Ok(phone) = normalize_phone(phone) else {
            return false;
        };
        let removed = self.pending.write().await.remove(&phone);
        removed.is_some_and(|p| !p.is_expired())
    }

    /// Current position of `phone` in the OTP flow.
    pub async fn state(&self, phone: &str) -> AuthState {
        let Ok(phone) = normalize_phone(phone) else {
            return AuthState::Unauthenticated;
        };
        match self.pending.read().await.get(&phone) {
            Some(p) if !p.is_expired() => AuthState::OtpPending,
            _ => AuthState::Unauthenticated,
        }
    }

    /// Revoke a session token. Returns `false` if it was not live.
    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.revoke(token).await
    }

    /// Resolve a bearer token to its profile.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidSession`] if the token is unknown or its profile
    ///   no longer exists.
    /// - [`AuthError::SessionExpired`] if the session has expired.
    /// - [`AuthError::Store`] if the repository fails.
    pub async fn authenticate(&self, token: &str) -> Result<Profile, AuthError> {
        let session = self.sessions.lookup(token).await?;
        self.repo
            .get_profile(session.profile_id)
            .await?
            .ok_or(AuthError::InvalidSession)
    }

    /// Fetch a profile by ID.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ProfileNotFound`] if it does not exist.
    pub async fn get_profile(&self, id: ProfileId) -> Result<Profile, AuthError> {
        self.repo
            .get_profile(id)
            .await?
            .ok_or(AuthError::ProfileNotFound)
    }

    /// Edit name, email or age of a profile. Phone is immutable.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Validation`] if the update is empty or a field is
    ///   malformed.
    /// - [`AuthError::ProfileNotFound`] if the profile does not exist.
    pub async fn update_profile(
        &self,
        id: ProfileId,
        mut update: ProfileUpdate,
    ) -> Result<Profile, AuthError> {
        if update.is_empty() {
            return Err(ValidationError::InvalidField {
                field: "profile",
                reason: "no fields to update".to_owned(),
            }
            .into());
        }
        if let Some(name) = update.name.as_mut() {
            *name = name.trim().to_owned();
            if name.is_empty() {
                return Err(ValidationError::InvalidField {
                    field: "name",
                    reason: "must not be blank".to_owned(),
                }
                .into());
            }
        }
        if let Patch::Value(email) = update.email.as_ref() {
            validate_email(email)?;
        }
        if let Patch::Value(age) = update.age.as_ref() {
            validate_age(*age)?;
        }

        match self.repo.update_profile(id, &update).await {
            Ok(profile) => {
                info!(profile_id = %id, "profile updated");
                Ok(profile)
            }
            Err(StoreError::NotFound { .. }) => Err(AuthError::ProfileNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Session store, for inspection.
    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("otp_ttl", &self.otp_ttl)
            .finish_non_exhaustive()
    }
}

impl PendingOtp {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Drop every lapsed challenge so unverified phones cannot pile up.
fn sweep_expired(pending: &mut HashMap<String, PendingOtp>) {
    let now = Utc::now();
    pending.retain(|_, p| now < p.expires_at);
}

fn otp_matches(otp: &str) -> bool {
    otp.trim().as_bytes().ct_eq(DEMO_OTP.as_bytes()).into()
}

fn normalize_phone(phone: &str) -> Result<String, AuthError> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(AuthError::EmptyPhone);
    }
    Ok(phone.to_owned())
}

fn validate_registration(registration: Registration) -> Result<Registration, AuthError> {
    let name = registration.name.trim().to_owned();
    if name.is_empty() {
        return Err(AuthError::MissingField { field: "name" });
    }
    let phone = registration.phone.trim().to_owned();
    if phone.is_empty() {
        return Err(AuthError::MissingField { field: "phone" });
    }
    let email = registration
        .email
        .map(|e| e.trim().to_owned())
        .filter(|e| !e.is_empty());
    if let Some(email) = &email {
        validate_email(email)?;
    }
    if let Some(age) = registration.age {
        validate_age(age)?;
    }
    Ok(Registration {
        name,
        phone,
        email,
        age: registration.age,
    })
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidField {
            field: "email",
            reason: "must look like name@example.com".to_owned(),
        })
    }
}

fn validate_age(age: u32) -> Result<(), ValidationError> {
    if (1..=150).contains(&age) {
        Ok(())
    } else {
        Err(ValidationError::InvalidField {
            field: "age",
            reason: "must be between 1 and 150".to_owned(),
        })
    }
}

/// Keep the last four digits of a phone number for logs.
fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    let keep = chars.len().min(4);
    let tail: String = chars[chars.len() - keep..].iter().collect();
    format!("***{tail}")
}
