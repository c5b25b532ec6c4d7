// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX acne classifier
//!
//! Wraps a single-input image classifier exported to ONNX. The model takes an NHWC
//! [1, 224, 224, 3] tensor scaled to [0, 1] and outputs a probability vector.

use anyhow::{Context, Result};
use ndarray::Array4;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::image_utils::load_image_file;
use super::preprocessing::preprocess_for_classifier;
use super::{InferenceError, InferenceModel, ModelKind, RawOutput};

/// ONNX image classifier
#[derive(Clone)]
pub struct OnnxClassifier {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    /// Model input name
    input_name: String,
    /// Model name (file stem)
    model_name: String,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("input_name", &self.input_name)
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

impl OnnxClassifier {
    /// Load the classifier from an ONNX file
    ///
    /// # Errors
    /// Returns error if the file does not exist or ONNX Runtime cannot load it
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Classifier model not found: {}", model_path.display());
        }

        info!("Loading classifier model from {}", model_path.display());

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
                "Failed to load classifier model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "input_1".to_string());

        if let Some(input) = session.inputs.first() {
            debug!("Classifier input {}: {:?}", input_name, input.input_type);
        }

        let model_name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "classifier".to_string());

        info!("✅ Classifier model loaded successfully (CPU-only)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            model_name,
        })
    }

    /// Run the classifier on a preprocessed tensor and return the probability vector
    pub fn classify(&self, input: Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let input_value =
            Value::from_array(input).map_err(|e| InferenceError::Tensor(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::Session("classifier session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| InferenceError::Session(e.to_string()))?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| InferenceError::UnexpectedOutput(e.to_string()))?;

        debug!("Classifier output shape: {:?}", output_tensor.shape());

        // [1, num_classes] or [num_classes]; take the first row either way
        let num_classes = output_tensor.shape().last().copied().unwrap_or(0);
        let probabilities: Vec<f32> = output_tensor.iter().take(num_classes).copied().collect();

        if probabilities.is_empty() {
            return Err(InferenceError::EmptyProbabilities);
        }

        Ok(probabilities)
    }
}

impl InferenceModel for OnnxClassifier {
    fn kind(&self) -> ModelKind {
        ModelKind::Classifier
    }

    fn name(&self) -> String {
        self.model_name.clone()
    }

    fn infer(&self, image_path: &Path) -> Result<RawOutput, InferenceError> {
        let (image, info) = load_image_file(image_path)?;
        debug!(
            "Classifying {}x{} {:?} image ({} bytes)",
            info.width, info.height, info.format, info.size_bytes
        );

        let tensor = preprocess_for_classifier(&image);
        let probabilities = self.classify(tensor)?;
        Ok(RawOutput::Probabilities(probabilities))
    }
}
