//! Declared-length precheck.
//!
//! This is a fast path only. A client can lie about or omit `Content-Length`, so the streaming
//! ceiling in [`super::copier`] remains the enforcement point.

use axum::http::{HeaderMap, header::CONTENT_LENGTH};

use super::{UploadDescriptor, describe_bytes};
use crate::errors::{Error, Result, SizeCheck};

/// The request body length as claimed by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredLength {
    Known(u64),
    Absent,
    /// The header was present but not a non-negative integer. Holds the raw value for logging.
    Unparsable(String),
}

impl DeclaredLength {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(value) = headers.get(CONTENT_LENGTH) else {
            return DeclaredLength::Absent;
        };

        let raw = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match raw.trim().parse::<u64>() {
            Ok(length) => DeclaredLength::Known(length),
            Err(_) => {
                tracing::warn!(content_length = %raw, "Invalid Content-Length, skipping size precheck");
                DeclaredLength::Unparsable(raw)
            }
        }
    }

    pub fn known(&self) -> Option<u64> {
        match self {
            DeclaredLength::Known(length) => Some(*length),
            DeclaredLength::Absent | DeclaredLength::Unparsable(_) => None,
        }
    }
}

/// Reject an upload whose declared length, less `framing_overhead`, already exceeds the ceiling.
///
/// An absent or unparsable length skips the check entirely.
pub fn precheck(descriptor: &UploadDescriptor, framing_overhead: u64) -> Result<()> {
    let Some(declared) = descriptor.declared_length().known() else {
        tracing::debug!(field = descriptor.field_name(), "No usable Content-Length, relying on streaming ceiling");
        return Ok(());
    };

    let payload = declared.saturating_sub(framing_overhead);
    if payload > descriptor.limit() {
        tracing::warn!(
            field = descriptor.field_name(),
            declared_length = declared,
            limit = descriptor.limit(),
            "Declared length exceeds upload limit, rejecting before parse"
        );
        return Err(Error::PayloadTooLarge {
            phase: SizeCheck::Precheck,
            message: format!(
                "Uploaded file was too large: {} according to Content-Length (current limit is {})",
                describe_bytes(payload),
                describe_bytes(descriptor.limit())
            ),
        });
    }

    Ok(())
}
