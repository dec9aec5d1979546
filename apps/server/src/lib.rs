//! HTTP front-end for the clipsight pipeline.
//!
//! Exposes a health check and a single multipart `analyze` endpoint that
//! accepts either an uploaded file or a URL.

mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use clipsight_core::Analyzer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use handlers::*;

pub const DEFAULT_MAX_UPLOAD_MB: usize = 512;

/// API server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
}

impl AppState {
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
        }
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server and run until Ctrl-C
pub async fn start_server(
    addr: &str,
    state: AppState,
    max_upload_bytes: usize,
) -> Result<(), std::io::Error> {
    let app = build_router(state, max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await
}
