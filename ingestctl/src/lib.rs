//! # ingestctl: bounded multipart upload ingestion
//!
//! `ingestctl` turns an untrusted, streaming multipart request body into a size-capped in-memory
//! artifact, and persists that artifact to disk without ever overwriting existing data.
//!
//! ## Overview
//!
//! Upload handling is the one place where network input directly drives memory allocation and
//! filesystem mutation. The [`upload`] module keeps both bounded:
//!
//! - The client-declared `Content-Length` is only used for an early rejection. It never sizes a
//!   buffer and never loosens the limit.
//! - The named form field is streamed into a buffer reserved once at the ceiling. The ceiling is
//!   checked on every chunk, so a missing or misreported length cannot get past it.
//! - A failure anywhere during receipt (too large, malformed body, client disconnect) drops the
//!   partial buffer and leaves the filesystem untouched.
//! - Saving uses create-exclusive semantics. Concurrent saves to one path have exactly one winner,
//!   and a failed write removes its partial file.
//!
//! ## Architecture
//!
//! The library API is [`upload::UploadedFile`] (plus the paired-result constructor
//! [`upload::new_upload`] for embedding runtimes). The binary wraps it in a small
//! [Axum](https://github.com/tokio-rs/axum) service so the pipeline can be driven over HTTP:
//!
//! - `POST /uploads/{field}` receives and stores a field under the configured script directory
//! - `POST /uploads/{field}/inspect` receives a field and reports its metadata
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use ingestctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = ingestctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     ingestctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config)?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod config;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod upload;

#[cfg(test)]
pub mod test_utils;

use axum::{
    Json, Router,
    routing::{get, post},
};
pub use config::Config;
use openapi::ApiDoc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, warn};
use utoipa::OpenApi;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Config,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(api::handlers::healthz))
        .route("/uploads/{field}", post(api::handlers::uploads::upload_file))
        .route("/uploads/{field}/inspect", post(api::handlers::uploads::inspect_upload))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// The HTTP application.
///
/// 1. **Create**: [`Application::new`] validates configuration and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until the
///    shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting ingestctl with configuration: {:#?}", config);
        config.validate()?;

        if !config.script_dir.is_dir() {
            warn!(
                script_dir = %config.script_dir.display(),
                "Script directory does not exist; saves will fail until it is created"
            );
        }

        let router = build_router(AppState { config: config.clone() });
        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "ingestctl listening on http://{}, saving uploads under {}",
            bind_addr,
            self.config.script_dir.display()
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}
