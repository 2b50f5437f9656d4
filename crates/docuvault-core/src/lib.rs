//! Core library for `DocuVault`.
//!
//! Holds the data-flow contract of the application: phone/OTP registration
//! and sessions, document upload with filename-based metadata extraction,
//! owner-only edits and deletes, and invite-code sharing. Persistence goes
//! through the [`repository::Repository`] trait and binaries through
//! `docuvault_storage::ObjectStore`, so the same services run against the
//! in-memory implementations in tests and against real backends in the
//! server.

pub mod auth;
pub mod documents;
pub mod error;
pub mod extract;
pub mod memory;
pub mod models;
pub mod repository;
pub mod session;
pub mod sharing;
pub mod upload;
