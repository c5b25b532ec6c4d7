// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration loaded from environment variables

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::StartupError;
use crate::render::BoxStyle;
use crate::vision::ModelKind;

/// Default upload/fetch body limit (10MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default folder for published annotated images
pub const DEFAULT_CLOUDINARY_FOLDER: &str = "acne-predictions";

/// Which `/predict` behaviour this process serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceVariant {
    /// Multipart upload, classifier model
    UploadClassify,
    /// JSON `image_url`, classifier model
    UrlClassify,
    /// JSON `image_url`, detector model, count + condition only
    UrlDetect,
    /// JSON `image_url`, detector model, annotated image published to Cloudinary
    UrlDetectPublish,
}

impl ServiceVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceVariant::UploadClassify => "upload-classify",
            ServiceVariant::UrlClassify => "url-classify",
            ServiceVariant::UrlDetect => "url-detect",
            ServiceVariant::UrlDetectPublish => "url-detect-publish",
        }
    }

    pub fn model_kind(&self) -> ModelKind {
        match self {
            ServiceVariant::UploadClassify | ServiceVariant::UrlClassify => ModelKind::Classifier,
            ServiceVariant::UrlDetect | ServiceVariant::UrlDetectPublish => ModelKind::Detector,
        }
    }

    /// Whether the source image arrives as a URL rather than an upload
    pub fn takes_url(&self) -> bool {
        !matches!(self, ServiceVariant::UploadClassify)
    }

    /// Whether annotated images are rendered and published
    pub fn publishes(&self) -> bool {
        matches!(self, ServiceVariant::UrlDetectPublish)
    }

    pub fn default_model_path(&self) -> PathBuf {
        match self.model_kind() {
            ModelKind::Classifier => PathBuf::from("model/acne_classification_model.onnx"),
            ModelKind::Detector => PathBuf::from("model/acne_detection_model.onnx"),
        }
    }

    /// The URL-classification service always rejected failed fetches up front;
    /// the detection services never checked the status.
    pub fn default_fetch_policy(&self) -> FetchPolicy {
        match self {
            ServiceVariant::UploadClassify | ServiceVariant::UrlClassify => FetchPolicy::Strict,
            ServiceVariant::UrlDetect | ServiceVariant::UrlDetectPublish => FetchPolicy::Lenient,
        }
    }
}

impl fmt::Display for ServiceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceVariant {
    type Err = StartupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upload-classify" => Ok(ServiceVariant::UploadClassify),
            "url-classify" => Ok(ServiceVariant::UrlClassify),
            "url-detect" => Ok(ServiceVariant::UrlDetect),
            "url-detect-publish" => Ok(ServiceVariant::UrlDetectPublish),
            other => Err(StartupError::InvalidConfig(format!(
                "unknown service variant '{}', expected one of: upload-classify, url-classify, url-detect, url-detect-publish",
                other
            ))),
        }
    }
}

/// How a non-2xx response to an image URL fetch is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Reject with "Failed to fetch image from URL" (HTTP 400)
    Strict,
    /// Keep the body and let inference fail on it
    Lenient,
}

impl FromStr for FetchPolicy {
    type Err = StartupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(FetchPolicy::Strict),
            "lenient" => Ok(FetchPolicy::Lenient),
            other => Err(StartupError::InvalidConfig(format!(
                "unknown fetch status policy '{}', expected strict or lenient",
                other
            ))),
        }
    }
}

/// Digest used to sign Cloudinary upload requests
///
/// Must match the account's signature algorithm setting; Cloudinary accounts
/// sign with SHA-1 unless SHA-256 has been enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
}

impl SignatureAlgorithm {
    /// Value of the `signature_algorithm` upload parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha256 => "sha256",
        }
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = StartupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sha1" => Ok(SignatureAlgorithm::Sha1),
            "sha256" => Ok(SignatureAlgorithm::Sha256),
            other => Err(StartupError::InvalidConfig(format!(
                "unknown signature algorithm '{}', expected sha1 or sha256",
                other
            ))),
        }
    }
}

/// Cloudinary credentials and upload settings
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Logical folder every upload lands in
    pub folder: String,
    /// Upload timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Request signing digest (default: sha1)
    pub signature_algorithm: SignatureAlgorithm,
}

impl fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("folder", &self.folder)
            .field("timeout_secs", &self.timeout_secs)
            .field("signature_algorithm", &self.signature_algorithm)
            .finish_non_exhaustive()
    }
}

/// Configuration for the prediction service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Which `/predict` variant to serve
    pub variant: ServiceVariant,
    /// Model file (ONNX)
    pub model_path: PathBuf,
    /// Listen host (default: 0.0.0.0)
    pub host: String,
    /// Listen port (default: 8000)
    pub port: u16,
    /// Directory for per-request temp artifacts
    pub temp_dir: PathBuf,
    /// Maximum accepted image size in bytes
    pub max_upload_bytes: usize,
    /// Timeout for fetching `image_url` in seconds (default: 15)
    pub fetch_timeout_secs: u64,
    /// Status handling for URL fetches
    pub fetch_policy: FetchPolicy,
    /// Detector score threshold (default: 0.25)
    pub confidence_threshold: f32,
    /// Detector NMS IoU threshold (default: 0.45)
    pub iou_threshold: f32,
    /// Annotation box style
    pub box_style: BoxStyle,
    /// Font for annotation labels; system fonts are searched when unset
    pub font_path: Option<PathBuf>,
    /// Publishing credentials (url-detect-publish only)
    pub cloudinary: Option<CloudinaryConfig>,
}

impl ServiceConfig {
    /// Defaults for a variant, before any environment overrides
    pub fn for_variant(variant: ServiceVariant) -> Self {
        Self {
            variant,
            model_path: variant.default_model_path(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            temp_dir: env::temp_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            fetch_timeout_secs: 15,
            fetch_policy: variant.default_fetch_policy(),
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            box_style: BoxStyle::Decorative,
            font_path: None,
            cloudinary: None,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let variant = match lookup("SERVICE_VARIANT") {
            Some(v) => v.parse()?,
            None => ServiceVariant::UploadClassify,
        };
        let mut config = Self::for_variant(variant);

        if let Some(path) = lookup("MODEL_PATH") {
            config.model_path = PathBuf::from(path);
        }
        if let Some(host) = lookup("API_HOST") {
            config.host = host;
        }
        config.port = parse_or(&lookup, "API_PORT", config.port)?;
        if let Some(dir) = lookup("TEMP_DIR") {
            config.temp_dir = PathBuf::from(dir);
        }
        config.max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", config.max_upload_bytes)?;
        config.fetch_timeout_secs =
            parse_or(&lookup, "FETCH_TIMEOUT_SECS", config.fetch_timeout_secs)?;
        if let Some(policy) = lookup("FETCH_STATUS_POLICY") {
            config.fetch_policy = policy.parse()?;
        }
        config.confidence_threshold = parse_or(
            &lookup,
            "DETECTION_CONFIDENCE_THRESHOLD",
            config.confidence_threshold,
        )?;
        config.iou_threshold = parse_or(&lookup, "DETECTION_IOU_THRESHOLD", config.iou_threshold)?;
        if let Some(style) = lookup("BOX_STYLE") {
            config.box_style = style.parse().map_err(StartupError::InvalidConfig)?;
        }
        config.font_path = lookup("ANNOTATION_FONT_PATH").map(PathBuf::from);

        let cloud_name = lookup("CLOUDINARY_CLOUD_NAME");
        let api_key = lookup("CLOUDINARY_API_KEY");
        let api_secret = lookup("CLOUDINARY_API_SECRET");
        if let (Some(cloud_name), Some(api_key), Some(api_secret)) = (cloud_name, api_key, api_secret) {
            config.cloudinary = Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
                folder: lookup("CLOUDINARY_FOLDER")
                    .unwrap_or_else(|| DEFAULT_CLOUDINARY_FOLDER.to_string()),
                timeout_secs: parse_or(&lookup, "PUBLISH_TIMEOUT_SECS", 30)?,
                signature_algorithm: parse_or(
                    &lookup,
                    "CLOUDINARY_SIGNATURE_ALGORITHM",
                    SignatureAlgorithm::Sha1,
                )?,
            });
        }

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), StartupError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(StartupError::InvalidConfig(format!(
                "DETECTION_CONFIDENCE_THRESHOLD must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(StartupError::InvalidConfig(format!(
                "DETECTION_IOU_THRESHOLD must be within [0, 1], got {}",
                self.iou_threshold
            )));
        }
        if self.max_upload_bytes == 0 {
            return Err(StartupError::InvalidConfig(
                "MAX_UPLOAD_BYTES must be greater than 0".to_string(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(StartupError::InvalidConfig(
                "FETCH_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        if self.variant.publishes() {
            match &self.cloudinary {
                None => return Err(StartupError::MissingCredentials),
                Some(c) if c.timeout_secs == 0 => {
                    return Err(StartupError::InvalidConfig(
                        "PUBLISH_TIMEOUT_SECS must be at least 1".to_string(),
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Socket address string to bind
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, StartupError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            StartupError::InvalidConfig(format!("{} has an invalid value: '{}'", key, raw))
        }),
        None => Ok(default),
    }
}
