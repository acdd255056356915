use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error as ThisError;

/// Where a too-large upload was caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCheck {
    /// The declared `Content-Length` already exceeded the ceiling.
    Precheck,
    /// The bytes actually streamed exceeded the ceiling.
    Streaming,
}

#[derive(ThisError, Debug)]
pub enum Error {
    /// Upload exceeds the configured ceiling
    #[error("{message}")]
    PayloadTooLarge { phase: SizeCheck, message: String },

    /// The body is not valid multipart form data
    #[error("Failed to parse multipart data: {message}")]
    MultipartParse { message: String },

    /// The requested form field was not present in the body
    #[error("Missing required form field: '{field}'")]
    FormFieldMissing { field: String },

    /// Reading the body failed mid-stream (client disconnect, transport deadline)
    #[error("Failed to read upload stream: {message}")]
    StreamRead { message: String },

    /// Refusing to overwrite an existing file
    #[error("File exists: {}", path.display())]
    DestinationExists { path: PathBuf },

    /// The save target cannot be turned into a file path
    #[error("Invalid destination: {message}")]
    InvalidDestination { message: String },

    /// Filesystem failure while persisting an upload
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid request data, rejected before any I/O
    #[error("{message}")]
    BadRequest { message: String },

    /// Configuration failed validation
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::MultipartParse { .. }
            | Error::FormFieldMissing { .. }
            | Error::StreamRead { .. }
            | Error::InvalidDestination { .. }
            | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::DestinationExists { .. } => StatusCode::CONFLICT,
            Error::Io { .. } | Error::Config { .. } | Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking server paths or I/O details
    pub fn user_message(&self) -> String {
        match self {
            Error::DestinationExists { path } => match path.file_name() {
                Some(name) => format!("File exists: {}", name.to_string_lossy()),
                None => "File exists".to_string(),
            },
            Error::Io { .. } => "Failed to store uploaded file".to_string(),
            Error::Config { .. } | Error::Internal { .. } => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// True for both too-large variants.
    pub fn is_too_large(&self) -> bool {
        matches!(self, Error::PayloadTooLarge { .. })
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Io { .. } | Error::Config { .. } | Error::Internal { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::PayloadTooLarge { .. } | Error::StreamRead { .. } => {
                tracing::warn!("Upload rejected: {}", self);
            }
            Error::DestinationExists { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
            Error::MultipartParse { .. } | Error::FormFieldMissing { .. } | Error::InvalidDestination { .. } | Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, self.user_message()).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
