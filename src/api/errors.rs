// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::acquisition::AcquisitionError;
use crate::publish::PublishError;
use crate::render::RenderError;
use crate::vision::InferenceError;

/// Message returned when a strict-policy URL fetch fails
pub const FETCH_FAILED_DETAIL: &str = "Failed to fetch image from URL";

/// Error body shared by every failure response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    pub detail: String,
}

/// A failed `/predict` request, tagged by the stage that failed
#[derive(Debug, Error)]
pub enum PredictError {
    /// Strict-policy fetch failure, reported to the client as a bad request
    #[error("{0}")]
    SourceUnavailable(AcquisitionError),

    #[error("{0}")]
    Acquisition(AcquisitionError),

    #[error("{0}")]
    Inference(#[from] InferenceError),

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("{0}")]
    Publish(#[from] PublishError),

    /// Request body could not be parsed into the expected JSON shape
    #[error("{}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),
}

impl PredictError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PredictError::SourceUnavailable(_) => StatusCode::BAD_REQUEST,
            PredictError::InvalidBody(rejection) => rejection.status(),
            PredictError::Acquisition(AcquisitionError::MissingFile) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing `detail` string
    pub fn detail(&self) -> String {
        match self {
            PredictError::SourceUnavailable(_) => FETCH_FAILED_DETAIL.to_string(),
            PredictError::Acquisition(AcquisitionError::MissingFile) => self.to_string(),
            PredictError::InvalidBody(rejection) => {
                format!("Invalid request body: {}", rejection.body_text())
            }
            other => format!("Prediction failed: {}", other),
        }
    }

    /// Short stage name for logs
    pub fn stage(&self) -> &'static str {
        match self {
            PredictError::SourceUnavailable(_) | PredictError::Acquisition(_) => "acquisition",
            PredictError::Inference(_) => "inference",
            PredictError::Render(_) => "render",
            PredictError::Publish(_) => "publish",
            PredictError::InvalidBody(_) => "request",
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(stage = self.stage(), "Prediction failed: {}", self);
        } else {
            warn!(stage = self.stage(), "Prediction rejected: {}", self);
        }

        (status, Json(ErrorDetail { detail: self.detail() })).into_response()
    }
}
