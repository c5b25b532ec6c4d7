// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod http_server;
pub mod predict;

pub use errors::{ErrorDetail, PredictError, FETCH_FAILED_DETAIL};
pub use http_server::{create_router, start_server, AppState, HealthResponse};
pub use predict::{
    predict_from_upload, predict_from_url, upload_predict_handler, url_predict_handler,
    ClassificationResponse, DetectionSummaryResponse, PredictResponse, PublishedDetectionResponse,
    UrlPredictRequest,
};
