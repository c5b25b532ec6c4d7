// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request-scoped temporary files
//!
//! Every file is named `<request-id>-<role>-<random>.<ext>` inside the configured temp
//! directory and is removed when the artifact is dropped, whichever way the request ends.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use uuid::Uuid;

/// A transient file owned by one request
#[derive(Debug)]
pub struct TempArtifact {
    file: NamedTempFile,
}

impl TempArtifact {
    /// Create an empty, uniquely named file
    pub fn create(dir: &Path, request_id: Uuid, role: &str, extension: &str) -> std::io::Result<Self> {
        let prefix = format!("{}-{}-", request_id, role);
        let suffix = format!(".{}", extension);
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .rand_bytes(6)
            .tempfile_in(dir)?;
        debug!("Created temp artifact {}", file.path().display());
        Ok(Self { file })
    }

    /// Create a file holding `bytes`
    pub fn with_bytes(
        dir: &Path,
        request_id: Uuid,
        role: &str,
        extension: &str,
        bytes: &[u8],
    ) -> std::io::Result<Self> {
        let mut artifact = Self::create(dir, request_id, role, extension)?;
        artifact.file.write_all(bytes)?;
        artifact.file.flush()?;
        Ok(artifact)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn path_buf(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Delete now and report failures; dropping deletes silently
    pub fn remove(self) {
        let path = self.path_buf();
        match self.file.close() {
            Ok(()) => debug!("Removed temp artifact {}", path.display()),
            Err(e) => warn!("Failed to remove temp artifact {}: {}", path.display(), e),
        }
    }
}
