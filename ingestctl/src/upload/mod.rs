//! Bounded multipart upload ingestion.
//!
//! An upload moves through four stages:
//!
//! 1. [`guard`]: a cheap precheck of the client-declared `Content-Length` against the ceiling,
//!    performed before the body is touched.
//! 2. [`copier`]: the multipart body is parsed and the named field is streamed into a buffer
//!    reserved once at the ceiling, enforcing the ceiling on every chunk.
//! 3. [`artifact`]: the resulting bytes plus the part's filename and declared content type.
//! 4. [`writer`]: on demand, the artifact is written to disk with create-exclusive semantics.
//!
//! [`file::UploadedFile`] ties the stages together and is the handle handed to callers.
//!
//! The declared length is untrusted. It can only make the precheck reject early; it never sizes
//! a buffer and never relaxes the streaming ceiling.

pub mod artifact;
pub mod copier;
pub mod file;
pub mod guard;
pub mod writer;

pub use artifact::ArtifactBuffer;
pub use file::{UploadHandle, UploadedFile, new_upload};
pub use guard::DeclaredLength;
pub use writer::Destination;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// Default ceiling when the caller does not pass a limit.
pub const DEFAULT_UPLOAD_LIMIT: u64 = 32 * MIB;

/// Limits applied to a single upload.
///
/// Built from [`crate::config::FileLimitsConfig`] per call, so each upload can carry its own
/// ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSettings {
    /// Streaming ceiling in bytes.
    pub limit: u64,
    /// Per-field cap for form fields other than the one being ingested.
    pub memory_cap: u64,
    /// Bytes copied per step.
    pub chunk_size: u64,
    /// Allowance subtracted from the declared length before the precheck.
    pub framing_overhead: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        crate::config::FileLimitsConfig::default().upload_settings(None)
    }
}

/// Everything known about an upload before its body is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    declared_length: DeclaredLength,
    field_name: String,
    limit: u64,
    memory_cap: u64,
}

impl UploadDescriptor {
    pub fn new(declared_length: DeclaredLength, field_name: impl Into<String>, settings: &UploadSettings) -> Self {
        Self {
            declared_length,
            field_name: field_name.into(),
            limit: settings.limit,
            memory_cap: settings.memory_cap,
        }
    }

    pub fn declared_length(&self) -> &DeclaredLength {
        &self.declared_length
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn memory_cap(&self) -> u64 {
        self.memory_cap
    }
}

/// Render a byte count for humans, e.g. `10 MiB` or `1.50 KiB`.
pub fn describe_bytes(bytes: u64) -> String {
    let (unit, name) = match bytes {
        b if b >= GIB => (GIB, "GiB"),
        b if b >= MIB => (MIB, "MiB"),
        b if b >= KIB => (KIB, "KiB"),
        _ => return format!("{bytes} bytes"),
    };
    if bytes % unit == 0 {
        format!("{} {name}", bytes / unit)
    } else {
        format!("{:.2} {name}", bytes as f64 / unit as f64)
    }
}
