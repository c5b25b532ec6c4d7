// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Annotated image rendering

pub mod annotate;

use thiserror::Error;

pub use annotate::{label_position, AnnotationRenderer, BoxStyle};

use crate::vision::ImageError;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to load source image: {0}")]
    Image(#[from] ImageError),

    #[error("Failed to encode annotated image: {0}")]
    Encode(String),

    #[error("Failed to create annotated file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Render task failed: {0}")]
    Task(String),
}
