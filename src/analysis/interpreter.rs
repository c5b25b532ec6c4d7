// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Turns raw model output into classification / detection results

use serde::Serialize;

use super::severity::SeverityLabel;
use crate::vision::{InferenceError, RawBox, RawOutput};

/// Classifier verdict
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    pub predicted_class: usize,
    pub confidence: f32,
}

/// One detected lesion in source pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl From<RawBox> for Detection {
    fn from(raw: RawBox) -> Self {
        Self {
            x1: raw.x1,
            y1: raw.y1,
            x2: raw.x2,
            y2: raw.y2,
            confidence: raw.confidence,
        }
    }
}

/// Detector verdict for one image
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub count: usize,
    pub average_confidence: f32,
    pub detections: Vec<Detection>,
    /// Public URL of the annotated image, once published
    pub annotated_image_url: Option<String>,
}

impl DetectionResult {
    pub fn severity(&self) -> SeverityLabel {
        SeverityLabel::from_count(self.count)
    }
}

/// Argmax over a probability vector; the first index wins ties
pub fn interpret_probabilities(probabilities: &[f32]) -> Result<ClassificationResult, InferenceError> {
    let (predicted_class, confidence) = probabilities
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
            Some((_, best_p)) if p <= best_p => best,
            _ => Some((i, p)),
        })
        .ok_or(InferenceError::EmptyProbabilities)?;

    Ok(ClassificationResult {
        predicted_class,
        confidence,
    })
}

/// Count boxes and average their confidence (0.0 when there are none)
pub fn interpret_boxes(boxes: Vec<RawBox>) -> DetectionResult {
    let detections: Vec<Detection> = boxes.into_iter().map(Detection::from).collect();
    let count = detections.len();
    let average_confidence = if count == 0 {
        0.0
    } else {
        detections.iter().map(|d| d.confidence).sum::<f32>() / count as f32
    };

    DetectionResult {
        count,
        average_confidence,
        detections,
        annotated_image_url: None,
    }
}

/// Expect classifier output
pub fn classification_from(raw: RawOutput) -> Result<ClassificationResult, InferenceError> {
    match raw {
        RawOutput::Probabilities(p) => interpret_probabilities(&p),
        RawOutput::Boxes(_) => Err(InferenceError::UnexpectedOutput(
            "expected class probabilities, model returned boxes".to_string(),
        )),
    }
}

/// Expect detector output
pub fn detection_from(raw: RawOutput) -> Result<DetectionResult, InferenceError> {
    match raw {
        RawOutput::Boxes(boxes) => Ok(interpret_boxes(boxes)),
        RawOutput::Probabilities(_) => Err(InferenceError::UnexpectedOutput(
            "expected boxes, model returned class probabilities".to_string(),
        )),
    }
}
