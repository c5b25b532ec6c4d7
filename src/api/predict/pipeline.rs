// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-request prediction pipeline
//!
//! `Acquiring -> Inferring -> Interpreting -> [Rendering -> Publishing] -> Responding`.
//! Every temp artifact is owned by a [`TempArtifact`] guard, so the source and
//! annotated files are gone once the pipeline returns, on success or failure.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use super::response::{PredictResponse, PublishedDetectionResponse};
use crate::acquisition::{AcquisitionError, TempArtifact};
use crate::analysis::{classification_from, detection_from, Detection};
use crate::api::errors::PredictError;
use crate::api::http_server::AppState;
use crate::config::FetchPolicy;
use crate::publish::PublishError;
use crate::render::{AnnotationRenderer, RenderError};
use crate::vision::{InferenceError, ModelKind, ModelRuntime, RawOutput};

/// Run an uploaded image through the model
pub async fn predict_from_upload(
    state: &AppState,
    request_id: Uuid,
    bytes: Vec<u8>,
    filename: Option<String>,
) -> Result<PredictResponse, PredictError> {
    let span = info_span!("predict", request_id = %request_id, variant = %state.variant);
    async move {
        let source = state
            .acquirer
            .from_upload(request_id, bytes, filename.as_deref())
            .await
            .map_err(PredictError::Acquisition)?;
        finish(state, request_id, source).await
    }
    .instrument(span)
    .await
}

/// Fetch `image_url` and run it through the model
pub async fn predict_from_url(
    state: &AppState,
    request_id: Uuid,
    image_url: &str,
) -> Result<PredictResponse, PredictError> {
    let span = info_span!("predict", request_id = %request_id, variant = %state.variant);
    async move {
        let policy = state.acquirer.fetcher().policy();
        let source = state
            .acquirer
            .from_url(request_id, image_url)
            .await
            .map_err(|e| classify_acquisition_error(e, policy))?;
        finish(state, request_id, source).await
    }
    .instrument(span)
    .await
}

/// Strict fetch failures become a client error; everything else stays internal
fn classify_acquisition_error(err: AcquisitionError, policy: FetchPolicy) -> PredictError {
    if policy == FetchPolicy::Strict && err.is_fetch_failure() {
        PredictError::SourceUnavailable(err)
    } else {
        PredictError::Acquisition(err)
    }
}

async fn finish(
    state: &AppState,
    request_id: Uuid,
    source: TempArtifact,
) -> Result<PredictResponse, PredictError> {
    let started = Instant::now();
    let outcome = run_model(state, request_id, &source).await;
    source.remove();

    if outcome.is_ok() {
        info!("Prediction complete in {}ms", started.elapsed().as_millis());
    }
    outcome
}

async fn run_model(
    state: &AppState,
    request_id: Uuid,
    source: &TempArtifact,
) -> Result<PredictResponse, PredictError> {
    let raw = infer(state.model.clone(), source.path_buf()).await?;

    match state.model.kind() {
        ModelKind::Classifier => {
            let result = classification_from(raw)?;
            debug!(
                "Predicted class {} ({:.4})",
                result.predicted_class, result.confidence
            );
            Ok(PredictResponse::Classification(result.into()))
        }
        ModelKind::Detector => {
            let mut result = detection_from(raw)?;
            debug!("Detected {} lesions", result.count);

            let publisher = match (&state.publisher, state.variant.publishes()) {
                (Some(publisher), true) => publisher.clone(),
                (None, true) => return Err(PublishError::MissingCredentials.into()),
                _ => return Ok(PredictResponse::DetectionSummary((&result).into())),
            };

            let annotated = render(
                state.renderer.clone(),
                source.path_buf(),
                result.detections.clone(),
                state.acquirer.temp_dir().to_path_buf(),
                request_id,
            )
            .await?;

            let uploaded = publisher.upload(annotated.path()).await;
            annotated.remove();
            let url = uploaded?;

            result.annotated_image_url = Some(url.clone());
            Ok(PredictResponse::PublishedDetection(
                PublishedDetectionResponse::new(result, url),
            ))
        }
    }
}

async fn infer(model: ModelRuntime, path: PathBuf) -> Result<RawOutput, InferenceError> {
    tokio::task::spawn_blocking(move || model.infer(&path))
        .await
        .map_err(|e| InferenceError::Task(e.to_string()))?
}

async fn render(
    renderer: Arc<AnnotationRenderer>,
    source: PathBuf,
    detections: Vec<Detection>,
    temp_dir: PathBuf,
    request_id: Uuid,
) -> Result<TempArtifact, RenderError> {
    tokio::task::spawn_blocking(move || {
        renderer.render_file(&source, &detections, &temp_dir, request_id)
    })
    .await
    .map_err(|e| RenderError::Task(e.to_string()))?
}
