// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image acquisition: uploaded bytes or a fetched URL, materialized as a temp file

pub mod fetcher;
pub mod temp;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub use fetcher::ImageFetcher;
pub use temp::TempArtifact;

use crate::vision::{detect_format, format_to_extension};

/// Errors raised while obtaining the source image
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("No file was uploaded in field 'file'")]
    MissingFile,

    #[error("Uploaded file is empty")]
    EmptyPayload,

    #[error("Image is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Invalid multipart body: {0}")]
    Multipart(String),

    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("fetch failed: HTTP {0}")]
    FetchStatus(u16),

    #[error("fetch failed: timed out ({0})")]
    Timeout(String),

    #[error("Failed to write temp file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Acquisition task failed: {0}")]
    Task(String),
}

impl AcquisitionError {
    /// Whether the error means the source URL could not be fetched
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            AcquisitionError::InvalidUrl(_)
                | AcquisitionError::FetchFailed(_)
                | AcquisitionError::FetchStatus(_)
                | AcquisitionError::Timeout(_)
        )
    }
}

/// Materializes request images as temp files
#[derive(Debug, Clone)]
pub struct ImageAcquirer {
    temp_dir: PathBuf,
    max_bytes: usize,
    fetcher: ImageFetcher,
}

impl ImageAcquirer {
    pub fn new(temp_dir: PathBuf, max_bytes: usize, fetcher: ImageFetcher) -> Self {
        Self {
            temp_dir,
            max_bytes,
            fetcher,
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn fetcher(&self) -> &ImageFetcher {
        &self.fetcher
    }

    /// Write an uploaded payload to a fresh temp file
    ///
    /// The client filename only contributes an extension hint.
    pub async fn from_upload(
        &self,
        request_id: Uuid,
        bytes: Vec<u8>,
        filename: Option<&str>,
    ) -> Result<TempArtifact, AcquisitionError> {
        if bytes.is_empty() {
            return Err(AcquisitionError::EmptyPayload);
        }
        if bytes.len() > self.max_bytes {
            return Err(AcquisitionError::TooLarge(bytes.len(), self.max_bytes));
        }

        let extension = pick_extension(&bytes, filename);
        self.persist(request_id, bytes, extension).await
    }

    /// Fetch `url` and write the body to a fresh temp file
    pub async fn from_url(&self, request_id: Uuid, url: &str) -> Result<TempArtifact, AcquisitionError> {
        let bytes = self.fetcher.fetch(url).await?;
        let extension = pick_extension(&bytes, None);
        self.persist(request_id, bytes, extension).await
    }

    async fn persist(
        &self,
        request_id: Uuid,
        bytes: Vec<u8>,
        extension: String,
    ) -> Result<TempArtifact, AcquisitionError> {
        let dir = self.temp_dir.clone();
        let artifact = tokio::task::spawn_blocking(move || {
            TempArtifact::with_bytes(&dir, request_id, "input", &extension, &bytes)
        })
        .await
        .map_err(|e| AcquisitionError::Task(e.to_string()))??;

        debug!("Source image stored at {}", artifact.path().display());
        Ok(artifact)
    }
}

/// Extension from magic bytes, then the client filename, then a neutral default
fn pick_extension(bytes: &[u8], filename: Option<&str>) -> String {
    if let Ok(format) = detect_format(bytes) {
        return format_to_extension(format).to_string();
    }

    filename
        .and_then(|name| Path::new(name).extension())
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "img".to_string())
}
