// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-wide model runtime, loaded once at startup

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::{DetectorParams, InferenceModel, ModelKind, OnnxClassifier, OnnxDetector};
use crate::config::StartupError;

/// Shared, read-only handle to the loaded model
///
/// Cloned into every request; nothing mutates the model after startup.
pub type ModelRuntime = Arc<dyn InferenceModel>;

/// Load the model for a variant
///
/// A missing file is a fatal startup error rather than a request-level failure.
pub fn load_model_runtime(
    kind: ModelKind,
    model_path: &Path,
    params: DetectorParams,
) -> Result<ModelRuntime, StartupError> {
    if !model_path.exists() {
        return Err(StartupError::ModelNotFound(model_path.display().to_string()));
    }

    let runtime: ModelRuntime = match kind {
        ModelKind::Classifier => Arc::new(
            OnnxClassifier::new(model_path).map_err(|e| StartupError::ModelLoad(format!("{:#}", e)))?,
        ),
        ModelKind::Detector => Arc::new(
            OnnxDetector::new(model_path, params)
                .map_err(|e| StartupError::ModelLoad(format!("{:#}", e)))?,
        ),
    };

    info!("✅ {} model '{}' ready", runtime.kind(), runtime.name());
    Ok(runtime)
}
