//! Streaming a named multipart field into a size-capped buffer.

use axum::http::{HeaderMap, header::CONTENT_TYPE};
use bytes::Bytes;
use futures::Stream;
use multer::{Constraints, Multipart, SizeLimit};

use super::artifact::{ArtifactBuffer, BoundedBuffer};
use super::{UploadDescriptor, describe_bytes};
use crate::errors::{Error, Result, SizeCheck};

/// Parse `body` as multipart form data and copy the field named in `descriptor` into memory.
///
/// The buffer is reserved once at the descriptor's limit. Each frame from the parser is copied
/// in pieces of at most `chunk_size` bytes, and the copy aborts as soon as the running total
/// would pass the limit. Nothing here touches the filesystem.
pub async fn ingest<S, O, E>(headers: &HeaderMap, body: S, descriptor: &UploadDescriptor, chunk_size: u64) -> Result<ArtifactBuffer>
where
    S: Stream<Item = std::result::Result<O, E>> + Send + 'static,
    O: Into<Bytes> + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let boundary = boundary_from_headers(headers)?;
    let field_name = descriptor.field_name();

    // Fields we are not ingesting may not use more than the memory cap while being skipped.
    let constraints = Constraints::new().size_limit(
        SizeLimit::new()
            .per_field(descriptor.memory_cap())
            .for_field(field_name.to_string(), u64::MAX),
    );
    let mut multipart = Multipart::with_constraints(body, boundary, constraints);

    let mut field = loop {
        let Some(mut field) = multipart.next_field().await.map_err(|e| map_multer_error(e, descriptor))? else {
            tracing::debug!(field = field_name, "Form field not present in multipart body");
            return Err(Error::FormFieldMissing {
                field: field_name.to_string(),
            });
        };
        if field.name() == Some(field_name) {
            break field;
        }
        while field.chunk().await.map_err(|e| map_multer_error(e, descriptor))?.is_some() {}
    };

    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .headers()
        .get(CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default();

    let limit = usize::try_from(descriptor.limit()).map_err(|_| Error::Internal {
        operation: format!("reserve an upload buffer of {}", describe_bytes(descriptor.limit())),
    })?;
    let mut buffer = BoundedBuffer::with_limit(limit).map_err(|e| Error::Internal {
        operation: format!("reserve an upload buffer of {}: {}", describe_bytes(descriptor.limit()), e),
    })?;
    let piece_size = usize::try_from(chunk_size).unwrap_or(usize::MAX).max(1);

    tracing::debug!(
        field = field_name,
        filename = %filename,
        limit = descriptor.limit(),
        "Starting upload stream copy"
    );

    let mut chunk_number = 0u64;
    while let Some(frame) = field.chunk().await.map_err(|e| map_multer_error(e, descriptor))? {
        for piece in frame.chunks(piece_size) {
            chunk_number += 1;
            if let Err(overflow) = buffer.try_extend(piece) {
                tracing::warn!(
                    field = field_name,
                    total_written = overflow.attempted,
                    limit = descriptor.limit(),
                    "Upload size limit exceeded, aborting"
                );
                return Err(Error::PayloadTooLarge {
                    phase: SizeCheck::Streaming,
                    message: format!(
                        "Uploaded file was too large: more than {} received (limit is {})",
                        describe_bytes(overflow.attempted),
                        describe_bytes(descriptor.limit())
                    ),
                });
            }
        }
    }

    tracing::debug!(
        field = field_name,
        total_chunks = chunk_number,
        total_bytes = buffer.len(),
        "Completed upload stream copy"
    );

    Ok(buffer.into_artifact(filename, content_type))
}

fn boundary_from_headers(headers: &HeaderMap) -> Result<String> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::MultipartParse {
            message: "missing Content-Type header".to_string(),
        })?;

    multer::parse_boundary(content_type).map_err(|e| Error::MultipartParse { message: e.to_string() })
}

fn map_multer_error(error: multer::Error, descriptor: &UploadDescriptor) -> Error {
    match error {
        multer::Error::StreamReadFailed(source) => {
            tracing::warn!(field = descriptor.field_name(), error = %source, "Upload stream failed mid-transfer");
            Error::StreamRead {
                message: source.to_string(),
            }
        }
        truncated @ (multer::Error::IncompleteStream | multer::Error::IncompleteFieldData { .. }) => {
            tracing::warn!(field = descriptor.field_name(), "Upload stream ended before the multipart body was complete");
            Error::StreamRead {
                message: truncated.to_string(),
            }
        }
        multer::Error::FieldSizeExceeded { limit, field_name } => Error::PayloadTooLarge {
            phase: SizeCheck::Streaming,
            message: format!(
                "Form field '{}' was too large (limit is {})",
                field_name.unwrap_or_default(),
                describe_bytes(limit)
            ),
        },
        multer::Error::StreamSizeExceeded { limit } => Error::PayloadTooLarge {
            phase: SizeCheck::Streaming,
            message: format!("Request body was too large (limit is {})", describe_bytes(limit)),
        },
        other => Error::MultipartParse { message: other.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{BOUNDARY, MultipartBody, body_stream, failing_stream, multipart_headers};
    use crate::upload::{DeclaredLength, KIB, MIB, UploadSettings};

    fn descriptor(field: &str, limit: u64, memory_cap: u64) -> UploadDescriptor {
        let settings = UploadSettings {
            limit,
            memory_cap,
            chunk_size: memory_cap,
            framing_overhead: 20,
        };
        UploadDescriptor::new(DeclaredLength::Absent, field, &settings)
    }

    #[tokio::test]
    async fn test_ingest_exact_bytes_and_metadata() {
        let content: Vec<u8> = (0..=255u8).cycle().take(100 * KIB as usize).collect();
        let body = MultipartBody::new()
            .text("purpose", "archive")
            .file("file", "data.bin", Some("application/octet-stream"), &content)
            .build();

        let artifact = ingest(&multipart_headers(None), body_stream(body, 4096), &descriptor("file", MIB, MIB), 1024)
            .await
            .unwrap();

        assert_eq!(artifact.size(), 100 * KIB);
        assert_eq!(artifact.bytes(), content.as_slice());
        assert_eq!(artifact.filename(), "data.bin");
        assert_eq!(artifact.mime_type(), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_ingest_exactly_at_limit() {
        let content = vec![b'x'; 4096];
        let body = MultipartBody::new().file("file", "a.txt", None, &content).build();

        let artifact = ingest(&multipart_headers(None), body_stream(body, 1000), &descriptor("file", 4096, 4096), 512)
            .await
            .unwrap();

        assert_eq!(artifact.size(), 4096);
        assert_eq!(artifact.mime_type(), "");
    }

    #[tokio::test]
    async fn test_ingest_rejects_one_byte_over_limit() {
        let content = vec![b'x'; 4097];
        let body = MultipartBody::new().file("file", "a.txt", None, &content).build();

        let err = ingest(&multipart_headers(None), body_stream(body, 1000), &descriptor("file", 4096, 4096), 512)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::PayloadTooLarge {
                phase: SizeCheck::Streaming,
                ..
            }
        ));
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn test_ingest_zero_byte_field() {
        let body = MultipartBody::new().file("file", "empty.txt", Some("text/plain"), b"").build();

        let artifact = ingest(&multipart_headers(None), body_stream(body, 64), &descriptor("file", MIB, MIB), MIB)
            .await
            .unwrap();

        assert_eq!(artifact.size(), 0);
        assert_eq!(artifact.filename(), "empty.txt");
    }

    #[tokio::test]
    async fn test_ingest_missing_field() {
        let body = MultipartBody::new().text("purpose", "archive").build();

        let err = ingest(&multipart_headers(None), body_stream(body, 64), &descriptor("file", MIB, MIB), MIB)
            .await
            .unwrap_err();

        match err {
            Error::FormFieldMissing { field } => assert_eq!(field, "file"),
            other => panic!("Expected FormFieldMissing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ingest_skips_fields_before_target() {
        let body = MultipartBody::new()
            .file("other", "other.txt", Some("text/plain"), &[b'o'; 2048])
            .file("file", "wanted.txt", Some("text/plain"), b"wanted")
            .build();

        let artifact = ingest(&multipart_headers(None), body_stream(body, 256), &descriptor("file", MIB, 4 * KIB), MIB)
            .await
            .unwrap();

        assert_eq!(artifact.bytes(), b"wanted");
        assert_eq!(artifact.filename(), "wanted.txt");
    }

    #[tokio::test]
    async fn test_ingest_bounds_unrelated_fields_by_memory_cap() {
        let body = MultipartBody::new()
            .file("other", "big.bin", None, &[0u8; 8192])
            .file("file", "small.txt", None, b"small")
            .build();

        let err = ingest(&multipart_headers(None), body_stream(body, 1024), &descriptor("file", MIB, 1024), 1024)
            .await
            .unwrap_err();

        assert!(err.is_too_large());
        assert!(err.to_string().contains("other"));
    }

    #[tokio::test]
    async fn test_ingest_stream_error_aborts() {
        let content = vec![b'z'; 64 * KIB as usize];
        let body = MultipartBody::new().file("file", "partial.bin", None, &content).build();
        let cut = body.len() / 2;

        let err = ingest(&multipart_headers(None), failing_stream(body, cut, 4096), &descriptor("file", MIB, MIB), MIB)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::StreamRead { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_ingest_truncated_body_is_stream_error() {
        let body = MultipartBody::new().file("file", "cut.bin", None, &[1u8; 4096]).build();
        let truncated = body[..body.len() - 100].to_vec();

        let err = ingest(&multipart_headers(None), body_stream(truncated, 512), &descriptor("file", MIB, MIB), MIB)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::StreamRead { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_ingest_requires_multipart_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());

        let err = ingest(&headers, body_stream(b"{}".to_vec(), 64), &descriptor("file", MIB, MIB), MIB)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MultipartParse { .. }));

        let err = ingest(&HeaderMap::new(), body_stream(b"{}".to_vec(), 64), &descriptor("file", MIB, MIB), MIB)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MultipartParse { .. }));
    }

    #[tokio::test]
    async fn test_ingest_malformed_body() {
        let body = format!("--{BOUNDARY}\r\nthis is not a header block").into_bytes();

        let err = ingest(&multipart_headers(None), body_stream(body, 64), &descriptor("file", MIB, MIB), MIB)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MultipartParse { .. } | Error::StreamRead { .. }), "got {err:?}");
    }
}
