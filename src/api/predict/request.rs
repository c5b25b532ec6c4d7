// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction request types

use serde::{Deserialize, Serialize};

/// JSON body accepted by the URL variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlPredictRequest {
    /// HTTP(S) location of the image to analyse
    pub image_url: String,
}
