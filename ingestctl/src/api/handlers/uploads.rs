use crate::AppState;
use crate::api::models::uploads::{InspectQuery, UploadQuery, UploadResponse};
use crate::errors::{Error, Result};
use crate::upload::{Destination, UploadHandle, UploadedFile};
use axum::{
    Json,
    extract::{Path, Query, Request, State},
    http::StatusCode,
};
use std::path::{Component, PathBuf};

impl UploadResponse {
    fn from_upload(file: &UploadedFile, saved_as: Option<String>) -> Self {
        Self {
            filename: file.filename().to_string(),
            size: file.size(),
            mime_type: file.mime_type().to_string(),
            saved_as,
        }
    }
}

async fn receive(state: &AppState, field: &str, limit_mib: Option<u64>, request: Request) -> Result<UploadedFile> {
    let settings = state.config.limits.files.capped_upload_settings(limit_mib);
    let (parts, body) = request.into_parts();
    UploadedFile::receive(
        &parts.headers,
        body.into_data_stream(),
        state.config.script_dir.clone(),
        field,
        &settings,
    )
    .await
}

/// Query-supplied save targets must be relative and plain: no root, drive prefix or `..`.
fn relative_target(param: &str, value: &str) -> Result<PathBuf> {
    let path = PathBuf::from(value);
    if path.components().all(|c| matches!(c, Component::Normal(_))) {
        Ok(path)
    } else {
        Err(Error::BadRequest {
            message: format!("'{param}' must be a relative path without '..'"),
        })
    }
}

#[utoipa::path(
    post,
    path = "/uploads/{field}",
    tag = "uploads",
    summary = "Upload file",
    description = "Receive the multipart form field `field` and store it under the script directory. \
Existing files are never overwritten. `save_as` and `save_in` must be relative to the script directory.",
    request_body(
        content_type = "multipart/form-data",
        description = "Multipart form containing the named field"
    ),
    params(
        ("field" = String, Path, description = "Name of the form field holding the file"),
        UploadQuery
    ),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Invalid request, missing field or interrupted upload"),
        (status = 409, description = "Destination already exists"),
        (status = 413, description = "Payload too large"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Path(field): Path<String>,
    Query(query): Query<UploadQuery>,
    request: Request,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let destination = match (query.save_as, query.save_in) {
        (Some(_), Some(_)) => {
            return Err(Error::BadRequest {
                message: "Only one of 'save_as' and 'save_in' may be given".to_string(),
            });
        }
        (Some(name), None) => {
            relative_target("save_as", &name)?;
            Destination::Renamed(name)
        }
        (None, Some(dir)) => Destination::InDirectory(relative_target("save_in", &dir)?),
        (None, None) => Destination::OwnName,
    };

    let file = receive(&state, &field, query.limit_mib, request).await?;
    let base_dir = file.base_dir();
    if !destination.resolve(base_dir, file.filename())?.starts_with(base_dir) {
        return Err(Error::BadRequest {
            message: "Save target must be inside the script directory".to_string(),
        });
    }
    let path = file.save_to(&destination).await?;
    let saved_as = path.file_name().map(|name| name.to_string_lossy().into_owned());

    Ok((StatusCode::CREATED, Json(UploadResponse::from_upload(&file, saved_as))))
}

#[utoipa::path(
    post,
    path = "/uploads/{field}/inspect",
    tag = "uploads",
    summary = "Inspect upload",
    description = "Receive the multipart form field `field` and report its metadata without storing it.",
    request_body(
        content_type = "multipart/form-data",
        description = "Multipart form containing the named field"
    ),
    params(
        ("field" = String, Path, description = "Name of the form field holding the file"),
        InspectQuery
    ),
    responses(
        (status = 200, description = "Upload metadata", body = UploadResponse),
        (status = 400, description = "Invalid request, missing field or interrupted upload"),
        (status = 413, description = "Payload too large"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn inspect_upload(
    State(state): State<AppState>,
    Path(field): Path<String>,
    Query(query): Query<InspectQuery>,
    request: Request,
) -> Result<Json<UploadResponse>> {
    let file = receive(&state, &field, query.limit_mib, request).await?;
    Ok(Json(UploadResponse::from_upload(&file, None)))
}
