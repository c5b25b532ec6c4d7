// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Shared fixtures for /predict tests: fake models, a fake publisher, an image
//! server on 127.0.0.1:0 and helpers for driving the router.

#![allow(dead_code)]

use acne_predict::{
    acquisition::{ImageAcquirer, ImageFetcher},
    api::{create_router, AppState},
    config::{FetchPolicy, ServiceVariant},
    publish::{ArtifactPublisher, PublishError},
    render::{AnnotationRenderer, BoxStyle},
    vision::{load_image_file, InferenceError, InferenceModel, ModelKind, ModelRuntime, RawBox, RawOutput},
};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Path as UrlPath,
    http::{header, Request, StatusCode},
    routing::get,
    Router,
};
use image::GenericImageView;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const MAX_BYTES: usize = 1024 * 1024;
pub const BOUNDARY: &str = "acne-predict-test-boundary";

/// Encode a solid-colour PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 120, 90]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Classifier whose verdict is derived from the image width: class `(width - 10) % classes`
pub struct WidthClassifier {
    pub classes: usize,
    pub seen: Mutex<Vec<PathBuf>>,
}

impl WidthClassifier {
    pub fn new(classes: usize) -> Arc<Self> {
        Arc::new(Self {
            classes,
            seen: Mutex::new(Vec::new()),
        })
    }
}

impl InferenceModel for WidthClassifier {
    fn kind(&self) -> ModelKind {
        ModelKind::Classifier
    }

    fn name(&self) -> String {
        "width_classifier".to_string()
    }

    fn infer(&self, image_path: &Path) -> Result<RawOutput, InferenceError> {
        self.seen.lock().unwrap().push(image_path.to_path_buf());
        let (image, _) = load_image_file(image_path)?;
        let class = (image.width() as usize).saturating_sub(10) % self.classes;
        let mut probabilities = vec![0.1 / self.classes as f32; self.classes];
        probabilities[class] = 0.9;
        Ok(RawOutput::Probabilities(probabilities))
    }
}

/// Detector returning `count` boxes for any decodable image
pub struct FixedDetector {
    pub count: usize,
    pub seen: Mutex<Vec<PathBuf>>,
}

impl FixedDetector {
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            count,
            seen: Mutex::new(Vec::new()),
        })
    }
}

impl InferenceModel for FixedDetector {
    fn kind(&self) -> ModelKind {
        ModelKind::Detector
    }

    fn name(&self) -> String {
        "fixed_detector".to_string()
    }

    fn infer(&self, image_path: &Path) -> Result<RawOutput, InferenceError> {
        self.seen.lock().unwrap().push(image_path.to_path_buf());
        let (image, _) = load_image_file(image_path)?;
        let (w, h) = image.dimensions();
        let boxes = (0..self.count)
            .map(|i| RawBox {
                x1: 1.0,
                y1: 1.0,
                x2: (w - 1) as f32,
                y2: (h - 1) as f32,
                confidence: if i % 2 == 0 { 0.5 } else { 1.0 },
                class_id: 0,
            })
            .collect();
        Ok(RawOutput::Boxes(boxes))
    }
}

/// Publisher that records what it was asked to upload
pub struct FakePublisher {
    pub fail: bool,
    /// (path, existed at upload time, leading bytes)
    pub uploads: Mutex<Vec<(PathBuf, bool, Vec<u8>)>>,
}

impl FakePublisher {
    pub fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            uploads: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ArtifactPublisher for FakePublisher {
    async fn upload(&self, path: &Path) -> Result<String, PublishError> {
        let bytes = std::fs::read(path).unwrap_or_default();
        let head = bytes.iter().take(3).copied().collect();
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_path_buf(), path.exists(), head));

        if self.fail {
            return Err(PublishError::Status(500, "storage unavailable".to_string()));
        }
        Ok("https://res.cloudinary.com/demo/image/upload/q_auto,f_auto/v1/acne-predictions/result.jpg".to_string())
    }
}

/// Assemble state the way `AppState::from_config` does, with injected collaborators
pub fn test_state(
    variant: ServiceVariant,
    model: ModelRuntime,
    temp_dir: &Path,
    policy: FetchPolicy,
    publisher: Option<Arc<dyn ArtifactPublisher>>,
) -> AppState {
    let fetcher = ImageFetcher::new(Duration::from_secs(2), policy, MAX_BYTES).unwrap();
    AppState {
        variant,
        model,
        acquirer: Arc::new(ImageAcquirer::new(temp_dir.to_path_buf(), MAX_BYTES, fetcher)),
        renderer: Arc::new(AnnotationRenderer::new(BoxStyle::Decorative, None)),
        publisher,
        max_upload_bytes: MAX_BYTES,
    }
}

/// Serve fixture images on an ephemeral port and return the base URL
pub async fn spawn_image_server() -> String {
    let router = Router::new()
        .route(
            "/face.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], png_bytes(64, 48)) }),
        )
        .route(
            "/faces/:width",
            get(|UrlPath(width): UrlPath<u32>| async move {
                ([(header::CONTENT_TYPE, "image/png")], png_bytes(width, 24))
            }),
        )
        .route(
            "/missing.png",
            get(|| async { (StatusCode::NOT_FOUND, "Not Found") }),
        )
        .route(
            "/big.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![0u8; MAX_BYTES + 1]) }),
        )
        .route(
            "/slow.png",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                png_bytes(8, 8)
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// POST a JSON body to /predict
pub async fn post_json(state: AppState, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(state, request).await
}

/// POST a multipart upload to /predict
pub async fn post_upload(
    state: AppState,
    field: &str,
    filename: &str,
    bytes: &[u8],
) -> (StatusCode, serde_json::Value) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"{n}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            b = BOUNDARY,
            f = field,
            n = filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();
    send(state, request).await
}

pub async fn send(state: AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = create_router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Number of entries left in a temp directory
pub fn leftover_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
