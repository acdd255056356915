//! In-memory upload artifacts.

use bytes::Bytes;
use std::collections::TryReserveError;

/// Fixed-capacity byte arena with a write cursor.
///
/// Capacity is reserved once at the ceiling; writes that would pass it are refused, so the
/// allocation is never grown.
#[derive(Debug)]
pub(crate) struct BoundedBuffer {
    data: Vec<u8>,
    limit: usize,
}

/// Returned when a write would take the buffer past its ceiling. Carries the total the write
/// would have produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Overflow {
    pub attempted: u64,
}

impl BoundedBuffer {
    pub(crate) fn with_limit(limit: usize) -> Result<Self, TryReserveError> {
        let mut data = Vec::new();
        data.try_reserve_exact(limit)?;
        Ok(Self { data, limit })
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn try_extend(&mut self, piece: &[u8]) -> Result<(), Overflow> {
        let attempted = self.data.len() + piece.len();
        if attempted > self.limit {
            return Err(Overflow {
                attempted: attempted as u64,
            });
        }
        self.data.extend_from_slice(piece);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub(crate) fn into_artifact(self, filename: String, content_type: String) -> ArtifactBuffer {
        ArtifactBuffer {
            bytes: Bytes::from(self.data),
            filename,
            content_type,
        }
    }
}

/// A fully received form field: its bytes and the metadata the client sent with it.
///
/// `size()` always equals the number of bytes observed on the wire, which never exceeds the
/// ceiling the artifact was received under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBuffer {
    bytes: Bytes,
    filename: String,
    content_type: String,
}

impl ArtifactBuffer {
    /// Original client-supplied filename, empty if the part carried none.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// First `Content-Type` header of the form part, empty if absent.
    pub fn mime_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
