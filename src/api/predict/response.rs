// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction response types

use serde::Serialize;

use crate::analysis::{ClassificationResult, Detection, DetectionResult, SeverityLabel};

/// Classifier response: `{"class", "confidence"}`
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResponse {
    #[serde(rename = "class")]
    pub class: usize,
    pub confidence: f32,
}

impl From<ClassificationResult> for ClassificationResponse {
    fn from(result: ClassificationResult) -> Self {
        Self {
            class: result.predicted_class,
            confidence: result.confidence,
        }
    }
}

/// Detector response without publishing: `{"acne_count", "condition"}`
#[derive(Debug, Clone, Serialize)]
pub struct DetectionSummaryResponse {
    pub acne_count: usize,
    pub condition: SeverityLabel,
}

impl From<&DetectionResult> for DetectionSummaryResponse {
    fn from(result: &DetectionResult) -> Self {
        Self {
            acne_count: result.count,
            condition: result.severity(),
        }
    }
}

/// Detector response with the published annotated image
#[derive(Debug, Clone, Serialize)]
pub struct PublishedDetectionResponse {
    pub acne_count: usize,
    pub condition: SeverityLabel,
    pub avg_confidence: f32,
    pub boxes: Vec<Detection>,
    pub predicted_url: String,
}

impl PublishedDetectionResponse {
    pub fn new(result: DetectionResult, predicted_url: String) -> Self {
        Self {
            acne_count: result.count,
            condition: result.severity(),
            avg_confidence: result.average_confidence,
            boxes: result.detections,
            predicted_url,
        }
    }
}

/// Any `/predict` success body
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PredictResponse {
    Classification(ClassificationResponse),
    DetectionSummary(DetectionSummaryResponse),
    PublishedDetection(PublishedDetectionResponse),
}
