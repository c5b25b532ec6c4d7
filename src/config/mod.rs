// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration and startup errors

pub mod service;

use thiserror::Error;

pub use service::{CloudinaryConfig, FetchPolicy, ServiceConfig, ServiceVariant, SignatureAlgorithm};

/// Errors that prevent the service from starting
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Model not found at {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET are required for url-detect-publish")]
    MissingCredentials,
}
