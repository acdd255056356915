//! OpenAPI documentation for the upload API.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    paths(api::handlers::uploads::upload_file, api::handlers::uploads::inspect_upload),
    components(schemas(api::models::uploads::UploadResponse)),
    tags(
        (name = "uploads", description = "Bounded multipart upload ingestion"),
    ),
    info(
        title = "ingestctl",
        description = "Receives multipart uploads into size-capped memory buffers and stores them without overwriting existing files."
    )
)]
pub struct ApiDoc;
