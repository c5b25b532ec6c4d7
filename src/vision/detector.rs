// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX acne detector (YOLO-style export)
//!
//! The model takes a letterboxed NCHW [1, 3, 640, 640] tensor and outputs a
//! [1, 4 + num_classes, num_anchors] prediction tensor (`cx, cy, w, h` followed by
//! per-class scores). The transposed [1, num_anchors, 4 + num_classes] layout is also
//! accepted.

use anyhow::{Context, Result};
use ndarray::{Array4, ArrayViewD, Ix3};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::image_utils::load_image_file;
use super::preprocessing::{preprocess_for_detector, Letterbox};
use super::{InferenceError, InferenceModel, ModelKind, RawBox, RawOutput};

/// Post-processing parameters for the detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorParams {
    /// Minimum class score for a box to be kept
    pub confidence_threshold: f32,
    /// IoU above which overlapping boxes of the same class are suppressed
    pub iou_threshold: f32,
    /// Upper bound on boxes returned per image
    pub max_detections: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

/// ONNX object detector
#[derive(Clone)]
pub struct OnnxDetector {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    /// Model input name
    input_name: String,
    /// Model name (file stem)
    model_name: String,
    params: DetectorParams,
}

impl std::fmt::Debug for OnnxDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxDetector")
            .field("input_name", &self.input_name)
            .field("model_name", &self.model_name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl OnnxDetector {
    /// Load the detector from an ONNX file
    ///
    /// # Errors
    /// Returns error if the file does not exist or ONNX Runtime cannot load it
    pub fn new<P: AsRef<Path>>(model_path: P, params: DetectorParams) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Detector model not found: {}", model_path.display());
        }

        info!("Loading detector model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load detector model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        let model_name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "detector".to_string());

        info!(
            "✅ Detector model loaded successfully (CPU-only, conf={}, iou={})",
            params.confidence_threshold, params.iou_threshold
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            model_name,
            params,
        })
    }

    /// Run the detector on a letterboxed tensor and return boxes in source coordinates
    pub fn detect(
        &self,
        input: Array4<f32>,
        letterbox: &Letterbox,
    ) -> Result<Vec<RawBox>, InferenceError> {
        let input_value =
            Value::from_array(input).map_err(|e| InferenceError::Tensor(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::Session("detector session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| InferenceError::Session(e.to_string()))?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| InferenceError::UnexpectedOutput(e.to_string()))?;

        debug!("Detector output shape: {:?}", output_tensor.shape());

        decode_predictions(output_tensor.view(), letterbox, &self.params)
    }
}

impl InferenceModel for OnnxDetector {
    fn kind(&self) -> ModelKind {
        ModelKind::Detector
    }

    fn name(&self) -> String {
        self.model_name.clone()
    }

    fn infer(&self, image_path: &Path) -> Result<RawOutput, InferenceError> {
        let (image, info) = load_image_file(image_path)?;
        debug!(
            "Detecting on {}x{} {:?} image ({} bytes)",
            info.width, info.height, info.format, info.size_bytes
        );

        let (tensor, letterbox) = preprocess_for_detector(&image);
        let boxes = self.detect(tensor, &letterbox)?;
        Ok(RawOutput::Boxes(boxes))
    }
}

/// Decode a YOLO prediction tensor into thresholded, suppressed boxes
///
/// Accepts [1, 4 + nc, n] or [1, n, 4 + nc]; the smaller trailing axis is taken
/// as the attribute axis.
pub fn decode_predictions(
    output: ArrayViewD<f32>,
    letterbox: &Letterbox,
    params: &DetectorParams,
) -> Result<Vec<RawBox>, InferenceError> {
    let output = output
        .into_dimensionality::<Ix3>()
        .map_err(|_| InferenceError::UnexpectedOutput("expected a rank-3 tensor".to_string()))?;

    let (_, d1, d2) = output.dim();
    let attrs_first = d1 <= d2;
    let (num_attrs, num_anchors) = if attrs_first { (d1, d2) } else { (d2, d1) };

    if num_attrs < 5 {
        return Err(InferenceError::UnexpectedOutput(format!(
            "prediction tensor has {} attributes, need at least 5",
            num_attrs
        )));
    }

    let at = |attr: usize, anchor: usize| -> f32 {
        if attrs_first {
            output[[0, attr, anchor]]
        } else {
            output[[0, anchor, attr]]
        }
    };

    let mut candidates = Vec::new();
    for anchor in 0..num_anchors {
        let (class_id, score) = (4..num_attrs)
            .map(|attr| (attr - 4, at(attr, anchor)))
            .fold((0usize, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if score < params.confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        let (x1, y1) = letterbox.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_source(cx + w / 2.0, cy + h / 2.0);

        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        candidates.push(RawBox {
            x1,
            y1,
            x2,
            y2,
            confidence: score.clamp(0.0, 1.0),
            class_id,
        });
    }

    let kept = non_max_suppression(candidates, params.iou_threshold, params.max_detections);
    debug!("Detector kept {} boxes", kept.len());
    Ok(kept)
}

/// Greedy per-class non-maximum suppression, highest confidence first
pub fn non_max_suppression(mut boxes: Vec<RawBox>, iou_threshold: f32, max_detections: usize) -> Vec<RawBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawBox> = Vec::new();
    for candidate in boxes {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
