//! # relpack HTTP Server Implementation
//!
//! File: cli/src/commands/serve/server_logic.rs
//!
//! ## Overview
//!
//! Axum router for the staging API:
//!
//! | Route                        | Purpose                                   |
//! |------------------------------|-------------------------------------------|
//! | `POST /api/v1/pack/images`   | Run one staging session, return its result |
//! | `GET /health`                | Liveness check                            |
//!
//! A staging session blocks for the whole copy/pull/compress sequence, so the
//! handler runs it on `spawn_blocking`. Errors are mapped to status codes by
//! their `RelpackError` kind and returned as `{"error": "..."}`:
//!
//! | Error                         | Status |
//! |-------------------------------|--------|
//! | `Validation`                  | 400    |
//! | `NoDirectoryFound`            | 404    |
//! | `StagingInProgress`           | 409    |
//! | `ImagePull`, `DockerApi`      | 502    |
//! | anything else                 | 500    |
//!
use crate::core::config::ReleaseConfig;
use crate::core::error::{find_relpack_error, RelpackError, Result};
use crate::core::staging::{ImagePuller, StagedRelease, Stager, StagingRequest};
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn, Level};

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub release: ReleaseConfig,
    pub puller: Arc<dyn ImagePuller>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackImagesRequest {
    pub images: Vec<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PackImagesResponse {
    pub label: String,
    pub source: String,
    pub archive: String,
    pub files: u64,
    pub bytes: u64,
    pub work_dir_removed: bool,
}

impl From<StagedRelease> for PackImagesResponse {
    fn from(staged: StagedRelease) -> Self {
        Self {
            label: staged.label,
            source: staged.session.source.display().to_string(),
            archive: staged.session.archive_path.display().to_string(),
            files: staged.summary.files,
            bytes: staged.summary.bytes,
            work_dir_removed: staged.work_dir_removed,
        }
    }
}

/// `anyhow::Error` carried to the response, with its status derived from the
/// `RelpackError` in its chain.
pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed ({}): {:#}", status, self.0);
        } else {
            warn!("Request rejected ({}): {:#}", status, self.0);
        }
        (status, Json(json!({ "error": format!("{:#}", self.0) }))).into_response()
    }
}

fn status_for(err: &anyhow::Error) -> StatusCode {
    match find_relpack_error(err) {
        Some(RelpackError::Validation(_)) => StatusCode::BAD_REQUEST,
        Some(RelpackError::NoDirectoryFound { .. }) => StatusCode::NOT_FOUND,
        Some(RelpackError::StagingInProgress { .. }) => StatusCode::CONFLICT,
        Some(RelpackError::ImagePull { .. } | RelpackError::DockerApi { .. }) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// # Run HTTP Server (`run_server`)
///
/// Binds `addr` and serves the staging API until a shutdown signal arrives.
/// In-flight sessions are allowed to finish before the call returns.
pub async fn run_server(addr: SocketAddr, state: AppState) -> Result<()> {
    let root = state.release.root_path();
    let app = create_app(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind TCP listener to address {}", addr))?;
    info!(
        "Staging API listening on {} for release root {}",
        addr,
        root.display()
    );
    println!("relpack serving on http://{} (Ctrl+C to stop)", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server shutdown complete.");
    Ok(())
}

/// # Create Axum Application (`create_app`)
pub fn create_app(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::default().include_headers(false))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/api/v1/pack/images", post(pack_images))
        .route("/health", get(health))
        .layer(trace_layer)
        .with_state(state)
}

async fn pack_images(
    State(state): State<AppState>,
    Json(body): Json<PackImagesRequest>,
) -> std::result::Result<Json<PackImagesResponse>, ApiError> {
    info!("Pack request for {} image(s)", body.images.len());
    let stager = Stager::new(state.release, state.puller);
    let request = StagingRequest {
        images: body.images,
        label: body.label,
    };
    let staged = tokio::task::spawn_blocking(move || stager.stage(&request))
        .await
        .context("Staging task failed to complete")??;
    Ok(Json(staged.into()))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown..."),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
            Err(e) => {
                error!(
                    "Failed to install SIGTERM handler: {}. Shutdown on SIGTERM might not work.",
                    e
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
