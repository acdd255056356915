//! HTTP request handlers.
//!
//! - [`uploads`]: multipart upload ingestion and storage
//!
//! Handlers return [`crate::errors::Error`], which converts to the matching HTTP status code
//! with a plain-text, user-safe message.

pub mod uploads;

/// Liveness probe.
pub async fn healthz() -> &'static str {
    "ok"
}
