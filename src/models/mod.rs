//! Core data models for the checkout service.
//!
//! Persisted entities map to database tables via `sqlx::FromRow`; provider
//! payloads and request bodies serialize as JSON via `serde`.

pub mod checkout;
pub mod job_posting;
pub mod metadata;
pub mod subscription;
