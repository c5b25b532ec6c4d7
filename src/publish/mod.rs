// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Publishing annotated images to remote media hosting

pub mod cloudinary;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub use cloudinary::{sign_params, with_delivery_transformation, CloudinaryPublisher};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("upload failed: {0}")]
    Network(String),

    #[error("upload timed out: {0}")]
    Timeout(String),

    #[error("upload rejected with HTTP {0}: {1}")]
    Status(u16, String),

    #[error("unexpected upload response: {0}")]
    MalformedResponse(String),

    #[error("failed to read annotated image: {0}")]
    Io(#[from] std::io::Error),

    #[error("publishing credentials are not configured")]
    MissingCredentials,
}

/// Uploads a local file and returns a publicly resolvable URL
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<String, PublishError>;
}
