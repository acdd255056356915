//! The upload handle exposed to request handlers and embedding runtimes.

use std::fmt;
use std::path::{Path, PathBuf};

use axum::http::HeaderMap;
use bytes::Bytes;
use futures::Stream;

use super::artifact::ArtifactBuffer;
use super::writer::{self, Destination};
use super::{DeclaredLength, UploadDescriptor, UploadSettings, copier, guard};
use crate::config::FileLimitsConfig;
use crate::errors::{Error, Result};

/// Capabilities of a received upload.
///
/// `save` and `save_in` are boolean projections of the fallible `try_save` / `try_save_in`;
/// failures are logged with their full detail.
#[allow(async_fn_in_trait)]
pub trait UploadHandle {
    fn filename(&self) -> &str;
    fn size(&self) -> u64;
    fn mime_type(&self) -> &str;
    async fn try_save(&self, target_filename: Option<&str>) -> Result<PathBuf>;
    async fn try_save_in(&self, target_directory: &str) -> Result<PathBuf>;

    async fn save(&self, target_filename: Option<&str>) -> bool {
        self.try_save(target_filename).await.is_ok()
    }

    async fn save_in(&self, target_directory: &str) -> bool {
        self.try_save_in(target_directory).await.is_ok()
    }
}

/// A form field received into memory, bound to the base directory its saves resolve against.
///
/// Request-scoped: dropping the handle releases the buffer whether or not it was saved.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    artifact: ArtifactBuffer,
    base_dir: PathBuf,
}

impl UploadedFile {
    /// Receive the form field `field_name` from a multipart request body.
    ///
    /// Runs the declared-length precheck, then streams the field under `settings.limit`. The
    /// filesystem is not touched.
    pub async fn receive<S, O, E>(
        headers: &HeaderMap,
        body: S,
        base_dir: impl Into<PathBuf>,
        field_name: &str,
        settings: &UploadSettings,
    ) -> Result<Self>
    where
        S: Stream<Item = std::result::Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        if field_name.is_empty() {
            return Err(Error::BadRequest {
                message: "form field name expected".to_string(),
            });
        }

        let descriptor = UploadDescriptor::new(DeclaredLength::from_headers(headers), field_name, settings);
        guard::precheck(&descriptor, settings.framing_overhead)?;
        let artifact = copier::ingest(headers, body, &descriptor, settings.chunk_size).await?;

        tracing::info!(
            field = field_name,
            filename = artifact.filename(),
            bytes = artifact.size(),
            "Upload received"
        );

        Ok(Self {
            artifact,
            base_dir: base_dir.into(),
        })
    }

    pub fn artifact(&self) -> &ArtifactBuffer {
        &self.artifact
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve `destination` under the base directory and write the artifact there.
    pub async fn save_to(&self, destination: &Destination) -> Result<PathBuf> {
        let result = self.write(destination).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, filename = self.artifact.filename(), "Failed to save upload");
        }
        result
    }

    async fn write(&self, destination: &Destination) -> Result<PathBuf> {
        let path = destination.resolve(&self.base_dir, self.artifact.filename())?;
        writer::persist(&self.artifact, &path).await?;
        Ok(path)
    }
}

impl UploadHandle for UploadedFile {
    fn filename(&self) -> &str {
        self.artifact.filename()
    }

    fn size(&self) -> u64 {
        self.artifact.size()
    }

    fn mime_type(&self) -> &str {
        self.artifact.mime_type()
    }

    /// Save under the base directory, as `target_filename` if given, else under the client's name.
    async fn try_save(&self, target_filename: Option<&str>) -> Result<PathBuf> {
        let destination = match target_filename {
            Some(name) => Destination::Renamed(name.to_string()),
            None => Destination::OwnName,
        };
        self.save_to(&destination).await
    }

    /// Save under the client's name inside `target_directory` (absolute, or relative to the base
    /// directory).
    async fn try_save_in(&self, target_directory: &str) -> Result<PathBuf> {
        self.save_to(&Destination::InDirectory(PathBuf::from(target_directory))).await
    }
}

impl fmt::Display for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Uploaded file")
    }
}

/// Constructor in the shape embedding runtimes expect: a handle and an empty message on success,
/// no handle and a descriptive message on failure.
///
/// `limit_mib` overrides the configured ceiling for this upload only.
pub async fn new_upload<S, O, E>(
    headers: &HeaderMap,
    body: S,
    base_dir: impl Into<PathBuf>,
    field_name: &str,
    limit_mib: Option<u64>,
    limits: &FileLimitsConfig,
) -> (Option<UploadedFile>, String)
where
    S: Stream<Item = std::result::Result<O, E>> + Send + 'static,
    O: Into<Bytes> + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let settings = limits.upload_settings(limit_mib);
    match UploadedFile::receive(headers, body, base_dir, field_name, &settings).await {
        Ok(file) => (Some(file), String::new()),
        Err(e) => {
            tracing::error!(field = field_name, error = %e, "Upload failed");
            (None, e.to_string())
        }
    }
}
