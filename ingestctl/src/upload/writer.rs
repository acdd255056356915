//! Create-exclusive persistence of upload artifacts.
//!
//! A save never overwrites. Two concurrent saves to the same path are decided by the
//! filesystem's exclusive create; the loser sees [`Error::DestinationExists`]. A save that fails
//! or is dropped after creating its file removes that file, so a path either holds the
//! complete artifact or nothing written by us.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::artifact::ArtifactBuffer;
use crate::errors::{Error, Result};

/// Where a save should land, relative to the base ("script") directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// `base/<artifact filename>`
    OwnName,
    /// `base/<name>`; an empty name falls back to [`Destination::OwnName`].
    Renamed(String),
    /// `<dir>/<artifact filename>` if `dir` is absolute, else `base/<dir>/<artifact filename>`.
    InDirectory(PathBuf),
}

impl Destination {
    pub fn resolve(&self, base_dir: &Path, artifact_filename: &str) -> Result<PathBuf> {
        match self {
            Destination::OwnName => Ok(base_dir.join(client_file_name(artifact_filename)?)),
            Destination::Renamed(name) if name.is_empty() => Destination::OwnName.resolve(base_dir, artifact_filename),
            Destination::Renamed(name) => Ok(base_dir.join(contained_path(name)?)),
            Destination::InDirectory(dir) => {
                let name = client_file_name(artifact_filename)?;
                if dir.is_absolute() {
                    Ok(dir.join(name))
                } else {
                    Ok(base_dir.join(dir).join(name))
                }
            }
        }
    }
}

/// Keep only the plain components of an override name, so it always lands under the base
/// directory. A leading root or drive prefix is dropped; `..` is refused.
fn contained_path(target: &str) -> Result<PathBuf> {
    let mut contained = PathBuf::new();
    for component in Path::new(target).components() {
        match component {
            Component::Normal(part) => contained.push(part),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::InvalidDestination {
                    message: format!("target filename {target:?} may not contain '..'"),
                });
            }
        }
    }
    if contained.as_os_str().is_empty() {
        return Err(Error::InvalidDestination {
            message: format!("target filename {target:?} does not name a file"),
        });
    }
    Ok(contained)
}

/// Reduce a client-supplied filename to its final component.
///
/// Browsers and scripted clients may send full paths (with either separator); only the last
/// segment is ever used, so the name cannot climb out of the target directory.
fn client_file_name(filename: &str) -> Result<&str> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(Error::InvalidDestination {
            message: format!("uploaded filename {filename:?} cannot be used as a file name"),
        }),
    }
}

/// Write `artifact` to `path`, failing if anything already exists there.
pub async fn persist(artifact: &ArtifactBuffer, path: &Path) -> Result<()> {
    // Fast path for the common conflict; the exclusive create below is what actually decides.
    match tokio::fs::try_exists(path).await {
        Ok(true) => {
            tracing::error!(path = %path.display(), "Destination already exists");
            return Err(Error::DestinationExists { path: path.to_path_buf() });
        }
        Ok(false) => {}
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Could not check destination, relying on exclusive create");
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o644);

    let file = match options.open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            tracing::error!(path = %path.display(), "Destination created concurrently");
            return Err(Error::DestinationExists { path: path.to_path_buf() });
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Error when creating upload destination");
            return Err(Error::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    // Removes the file unless defused below, including when this future is dropped mid-write.
    let partial = scopeguard::guard(path.to_path_buf(), |partial| {
        tracing::warn!(path = %partial.display(), "Removing partially written upload");
        if let Err(e) = std::fs::remove_file(&partial) {
            tracing::error!(path = %partial.display(), error = %e, "Failed to remove partial upload");
        }
    });

    if let Err(e) = write_contents(file, artifact.bytes()).await {
        tracing::error!(path = %path.display(), error = %e, "Error when writing upload");
        drop(partial);
        return Err(Error::Io {
            path: path.to_path_buf(),
            source: e,
        });
    }
    scopeguard::ScopeGuard::into_inner(partial);

    tracing::info!(path = %path.display(), bytes = artifact.size(), "Upload saved");
    Ok(())
}

async fn write_contents(mut file: File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}
