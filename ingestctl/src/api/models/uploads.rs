use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for storing an upload
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadQuery {
    /// Upload ceiling in MiB for this request. Can only lower the configured `max_file_size`.
    pub limit_mib: Option<u64>,
    /// Store under this filename, relative to the script directory, instead of the
    /// client-supplied one
    pub save_as: Option<String>,
    /// Store in this directory, relative to the script directory, under the client-supplied
    /// filename
    pub save_in: Option<String>,
}

/// Query parameters for inspecting an upload without storing it
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InspectQuery {
    /// Upload ceiling in MiB for this request. Can only lower the configured `max_file_size`.
    pub limit_mib: Option<u64>,
}

/// Metadata of a received upload
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// Filename supplied by the client (may be empty)
    pub filename: String,
    /// Exact number of bytes received
    pub size: u64,
    /// Content type declared for the form part (may be empty)
    pub mime_type: String,
    /// Name of the stored file, when the upload was saved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_as: Option<String>,
}
