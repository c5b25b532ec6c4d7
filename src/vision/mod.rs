// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision model runtime for acne classification and detection
//!
//! This module provides:
//! - Image loading and format sniffing
//! - Model preprocessing (224x224 classifier input, 640x640 letterbox detector input)
//! - ONNX classifier and YOLO-style detector sessions
//! - The process-wide model handle loaded once at startup
//!
//! Both models run on CPU through ONNX Runtime.

pub mod classifier;
pub mod detector;
pub mod image_utils;
pub mod model_manager;
pub mod preprocessing;

use std::fmt;
use std::path::Path;

use thiserror::Error;

pub use classifier::OnnxClassifier;
pub use detector::{DetectorParams, OnnxDetector};
pub use image_utils::{decode_image_bytes, detect_format, format_to_extension, load_image_file, ImageError, ImageInfo};
pub use model_manager::{load_model_runtime, ModelRuntime};

/// Which family of model is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Classifier,
    Detector,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Classifier => f.write_str("classifier"),
            ModelKind::Detector => f.write_str("detector"),
        }
    }
}

/// A detector box in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl RawBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &RawBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Untouched model output, before interpretation
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    /// Classifier probability vector over the label set
    Probabilities(Vec<f32>),
    /// Detector boxes after thresholding and NMS
    Boxes(Vec<RawBox>),
}

/// Errors raised while running a model on one image
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("{0}")]
    Image(#[from] ImageError),

    #[error("Failed to build input tensor: {0}")]
    Tensor(String),

    #[error("Model run failed: {0}")]
    Session(String),

    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),

    #[error("Model returned an empty probability vector")]
    EmptyProbabilities,

    #[error("Inference task failed: {0}")]
    Task(String),
}

/// A loaded model that turns an image file into raw output
///
/// Implementations must be safe to call from several requests at once.
#[cfg_attr(test, mockall::automock)]
pub trait InferenceModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Short model name reported by `/health`
    fn name(&self) -> String;

    fn infer(&self, image_path: &Path) -> Result<RawOutput, InferenceError>;
}
