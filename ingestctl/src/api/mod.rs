//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Uploads** (`/uploads/{field}`): receive a named multipart field and store it under the
//!   script directory
//! - **Inspection** (`/uploads/{field}/inspect`): receive a field and report its metadata without
//!   storing it
//! - **Health** (`/healthz`)
//!
//! The OpenAPI document is served at `/api-docs/openapi.json`.

pub mod handlers;
pub mod models;
