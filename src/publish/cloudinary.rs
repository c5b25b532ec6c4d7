// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Signed uploads to Cloudinary

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sha1::Sha1;
use tracing::{debug, info};

use super::{ArtifactPublisher, PublishError};
use crate::config::{CloudinaryConfig, SignatureAlgorithm};

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Delivery transformation applied to the returned URL
const DELIVERY_TRANSFORMATION: &str = "q_auto,f_auto";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Publishes annotated images through the Cloudinary upload API
pub struct CloudinaryPublisher {
    client: Client,
    config: CloudinaryConfig,
    api_base: String,
}

impl CloudinaryPublisher {
    pub fn new(config: CloudinaryConfig) -> Result<Self, PublishError> {
        Self::with_api_base(config, DEFAULT_API_BASE)
    }

    /// Point uploads at a different API root (used against local test servers)
    pub fn with_api_base(config: CloudinaryConfig, api_base: &str) -> Result<Self, PublishError> {
        if config.cloud_name.is_empty() || config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(PublishError::MissingCredentials);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PublishError::Network(e.to_string()))?;

        info!(
            "Cloudinary publisher ready (cloud: {}, folder: {}, signing: {})",
            config.cloud_name,
            config.folder,
            config.signature_algorithm.as_str()
        );

        Ok(Self {
            client,
            config,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/image/upload", self.api_base, self.config.cloud_name)
    }
}

#[async_trait]
impl ArtifactPublisher for CloudinaryPublisher {
    async fn upload(&self, path: &Path) -> Result<String, PublishError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "annotated.jpg".to_string());

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signed = [
            ("folder", self.config.folder.as_str()),
            ("timestamp", timestamp.as_str()),
        ];
        let signature = sign_params(&signed, &self.config.api_secret, self.config.signature_algorithm);

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")
            .map_err(|e| PublishError::Network(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("folder", self.config.folder.clone())
            .text("timestamp", timestamp)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", self.config.signature_algorithm.as_str());

        debug!("Uploading {} to Cloudinary", path.display());

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(PublishError::Status(status.as_u16(), message));
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| PublishError::MalformedResponse(e.to_string()))?;
        let secure_url = parsed
            .secure_url
            .ok_or_else(|| PublishError::MalformedResponse("missing secure_url".to_string()))?;

        info!(
            "Published annotated image {}",
            parsed.public_id.as_deref().unwrap_or("<unknown>")
        );
        Ok(with_delivery_transformation(&secure_url))
    }
}

/// Cloudinary request signature
///
/// Parameters are sorted by name, joined as `k=v` with `&`, suffixed with the API
/// secret and hashed with the account's signature algorithm.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str, algorithm: SignatureAlgorithm) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let payload = format!("{}{}", joined, api_secret);
    match algorithm {
        SignatureAlgorithm::Sha1 => hex::encode(Sha1::digest(payload.as_bytes())),
        SignatureAlgorithm::Sha256 => hex::encode(Sha256::digest(payload.as_bytes())),
    }
}

/// Insert the auto quality/format transformation after `/upload/`
pub fn with_delivery_transformation(secure_url: &str) -> String {
    match secure_url.split_once("/upload/") {
        Some((head, tail)) if !tail.starts_with(DELIVERY_TRANSFORMATION) => {
            format!("{}/upload/{}/{}", head, DELIVERY_TRANSFORMATION, tail)
        }
        _ => secure_url.to_string(),
    }
}

fn map_reqwest_error(e: reqwest::Error) -> PublishError {
    if e.is_timeout() {
        PublishError::Timeout(e.to_string())
    } else {
        PublishError::Network(e.to_string())
    }
}
