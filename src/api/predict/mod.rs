// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction endpoint module
//!
//! Provides POST /predict in the shape selected by the service variant.

pub mod handler;
pub mod pipeline;
pub mod request;
pub mod response;

pub use handler::{upload_predict_handler, url_predict_handler};
pub use pipeline::{predict_from_upload, predict_from_url};
pub use request::UrlPredictRequest;
pub use response::{
    ClassificationResponse, DetectionSummaryResponse, PredictResponse, PublishedDetectionResponse,
};
