//! HTTP route handlers for `DocuVault`.
//!
//! Routes are organized by subsystem:
//! - `auth`: OTP challenge, registration, verification, logout
//! - `profile`: Current profile read and edit
//! - `documents`: Upload, listing, edits, deletes, downloads
//! - `sharing`: Invite codes, access grants, shared-with-me
//! - `storage`: Public reads from the documents bucket
//! - `health`: Liveness

pub mod auth;
pub mod documents;
pub mod health;
pub mod profile;
pub mod sharing;
pub mod storage;
