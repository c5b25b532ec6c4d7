// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction endpoint handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use axum_extra::extract::Multipart;
use tracing::debug;
use uuid::Uuid;

use super::pipeline::{predict_from_upload, predict_from_url};
use super::request::UrlPredictRequest;
use super::response::PredictResponse;
use crate::acquisition::AcquisitionError;
use crate::api::errors::PredictError;
use crate::api::http_server::AppState;

/// Multipart field holding the uploaded image
pub const UPLOAD_FIELD: &str = "file";

/// POST /predict for `upload-classify`
///
/// # Request
/// - multipart form with the image in field `file`
///
/// # Response
/// - `{"class": int, "confidence": float}`
///
/// # Errors
/// - 422: no `file` field
/// - 500: `{"detail": "Prediction failed: <cause>"}`
pub async fn upload_predict_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, PredictError> {
    let request_id = Uuid::new_v4();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PredictError::Acquisition(AcquisitionError::Multipart(e.to_string())))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| PredictError::Acquisition(AcquisitionError::Multipart(e.to_string())))?;

        debug!(
            "Upload received: {} bytes, filename {:?} (request {})",
            bytes.len(),
            filename,
            request_id
        );

        let response = predict_from_upload(&state, request_id, bytes.to_vec(), filename).await?;
        return Ok(Json(response));
    }

    Err(PredictError::Acquisition(AcquisitionError::MissingFile))
}

/// POST /predict for the URL variants
///
/// # Request
/// - `{"image_url": string}`
///
/// # Response
/// - `url-classify`: `{"class", "confidence"}`
/// - `url-detect`: `{"acne_count", "condition"}`
/// - `url-detect-publish`: adds `avg_confidence`, `boxes` and `predicted_url`
///
/// # Errors
/// - 400: strict-policy fetch failure or unparseable JSON body
/// - 422: body without `image_url`
/// - 500: `{"detail": "Prediction failed: <cause>"}`
pub async fn url_predict_handler(
    State(state): State<AppState>,
    payload: Result<Json<UrlPredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, PredictError> {
    let Json(request) = payload?;
    let request_id = Uuid::new_v4();
    debug!("URL prediction for {} (request {})", request.image_url, request_id);

    let response = predict_from_url(&state, request_id, &request.image_url).await?;
    Ok(Json(response))
}
