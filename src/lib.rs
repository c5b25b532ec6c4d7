// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod acquisition;
pub mod analysis;
pub mod api;
pub mod cli;
pub mod config;
pub mod publish;
pub mod render;
pub mod version;
pub mod vision;

pub use acquisition::{AcquisitionError, ImageAcquirer, ImageFetcher, TempArtifact};
pub use analysis::{ClassificationResult, Detection, DetectionResult, SeverityLabel};
pub use api::{create_router, start_server, AppState, PredictError};
pub use config::{FetchPolicy, ServiceConfig, ServiceVariant, StartupError};
pub use publish::{ArtifactPublisher, CloudinaryPublisher, PublishError};
pub use render::{AnnotationRenderer, BoxStyle, RenderError};
pub use vision::{load_model_runtime, InferenceError, InferenceModel, ModelKind, ModelRuntime, RawBox, RawOutput};
