// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Result interpretation and severity classification

pub mod interpreter;
pub mod severity;

pub use interpreter::{
    classification_from, detection_from, interpret_boxes, interpret_probabilities,
    ClassificationResult, Detection, DetectionResult,
};
pub use severity::{severity, SeverityLabel};
