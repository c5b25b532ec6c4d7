// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::predict::{upload_predict_handler, url_predict_handler};
use crate::acquisition::{ImageAcquirer, ImageFetcher};
use crate::config::{ServiceConfig, ServiceVariant, StartupError};
use crate::publish::{ArtifactPublisher, CloudinaryPublisher};
use crate::render::AnnotationRenderer;
use crate::version;
use crate::vision::ModelRuntime;

/// Multipart framing allowance on top of the image size limit
const BODY_LIMIT_OVERHEAD: usize = 64 * 1024;

/// Shared per-process state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub variant: ServiceVariant,
    pub model: ModelRuntime,
    pub acquirer: Arc<ImageAcquirer>,
    pub renderer: Arc<AnnotationRenderer>,
    pub publisher: Option<Arc<dyn ArtifactPublisher>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Build the request collaborators from validated configuration
    pub fn from_config(config: &ServiceConfig, model: ModelRuntime) -> Result<Self, StartupError> {
        let fetcher = ImageFetcher::new(
            Duration::from_secs(config.fetch_timeout_secs),
            config.fetch_policy,
            config.max_upload_bytes,
        )
        .map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
        let acquirer = ImageAcquirer::new(config.temp_dir.clone(), config.max_upload_bytes, fetcher);

        let publisher: Option<Arc<dyn ArtifactPublisher>> = if config.variant.publishes() {
            let cloudinary = config
                .cloudinary
                .clone()
                .ok_or(StartupError::MissingCredentials)?;
            let publisher = CloudinaryPublisher::new(cloudinary)
                .map_err(|_| StartupError::MissingCredentials)?;
            Some(Arc::new(publisher))
        } else {
            None
        };

        let renderer = AnnotationRenderer::with_font_search(config.box_style, config.font_path.as_deref());
        info!(
            "Annotation renderer: {:?} boxes, label font loaded: {}",
            renderer.style(),
            renderer.has_font()
        );

        Ok(Self {
            variant: config.variant,
            model,
            acquirer: Arc::new(acquirer),
            renderer: Arc::new(renderer),
            publisher,
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}

/// Body of GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub variant: &'static str,
    pub model: String,
    pub version: &'static str,
}

/// Router for the configured variant
pub fn create_router(state: AppState) -> Router {
    let predict = if state.variant.takes_url() {
        post(url_predict_handler)
    } else {
        post(upload_predict_handler)
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/predict", predict)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes + BODY_LIMIT_OVERHEAD))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn start_server(config: &ServiceConfig, state: AppState) -> anyhow::Result<()> {
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        "🚀 {} listening on http://{} (variant: {})",
        version::get_version_string(),
        listener.local_addr()?,
        config.variant
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining requests");
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        variant: state.variant.as_str(),
        model: state.model.name(),
        version: version::VERSION,
    })
}
