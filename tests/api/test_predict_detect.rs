// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /predict for the detection variants (`url-detect`, `url-detect-publish`)

use acne_predict::{
    config::{FetchPolicy, ServiceVariant},
    publish::ArtifactPublisher,
};
use axum::http::StatusCode;
use serde_json::json;
use std::sync::Arc;

use super::common::{
    leftover_files, post_json, spawn_image_server, test_state, FakePublisher, FixedDetector,
};

#[tokio::test]
async fn test_url_detect_summary() {
    let base = spawn_image_server().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(
        ServiceVariant::UrlDetect,
        FixedDetector::new(7),
        dir.path(),
        FetchPolicy::Lenient,
        None,
    );

    let (status, body) = post_json(state, json!({"image_url": format!("{}/face.png", base)})).await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body, json!({"acne_count": 7, "condition": "Sedang"}));
    assert_eq!(leftover_files(dir.path()), 0);
}

#[tokio::test]
async fn test_url_detect_no_lesions() {
    let base = spawn_image_server().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(
        ServiceVariant::UrlDetect,
        FixedDetector::new(0),
        dir.path(),
        FetchPolicy::Lenient,
        None,
    );

    let (status, body) = post_json(state, json!({"image_url": format!("{}/face.png", base)})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"acne_count": 0, "condition": "Rendah"}));
}

#[tokio::test]
async fn test_lenient_404_fails_inside_inference() {
    let base = spawn_image_server().await;
    let dir = tempfile::tempdir().unwrap();
    let model = FixedDetector::new(3);
    let state = test_state(
        ServiceVariant::UrlDetect,
        model.clone(),
        dir.path(),
        FetchPolicy::Lenient,
        None,
    );

    let (status, body) =
        post_json(state, json!({"image_url": format!("{}/missing.png", base)})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Prediction failed: "));
    // The 404 body reached the model
    assert_eq!(model.seen.lock().unwrap().len(), 1);
    assert_eq!(leftover_files(dir.path()), 0);
}

#[tokio::test]
async fn test_lenient_unreachable_host_is_internal_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(
        ServiceVariant::UrlDetect,
        FixedDetector::new(1),
        dir.path(),
        FetchPolicy::Lenient,
        None,
    );

    let (status, body) = post_json(state, json!({"image_url": "http://127.0.0.1:9/face.png"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Prediction failed: fetch failed"));
}

#[tokio::test]
async fn test_detect_and_publish() {
    let base = spawn_image_server().await;
    let dir = tempfile::tempdir().unwrap();
    let publisher = FakePublisher::new(false);
    let state = test_state(
        ServiceVariant::UrlDetectPublish,
        FixedDetector::new(4),
        dir.path(),
        FetchPolicy::Lenient,
        Some(publisher.clone() as Arc<dyn ArtifactPublisher>),
    );

    let (status, body) = post_json(state, json!({"image_url": format!("{}/face.png", base)})).await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["acne_count"], 4);
    assert_eq!(body["condition"], "Rendah");
    assert!((body["avg_confidence"].as_f64().unwrap() - 0.75).abs() < 1e-6);
    assert_eq!(
        body["predicted_url"],
        "https://res.cloudinary.com/demo/image/upload/q_auto,f_auto/v1/acne-predictions/result.jpg"
    );

    let boxes = body["boxes"].as_array().unwrap();
    assert_eq!(boxes.len(), 4);
    assert_eq!(boxes[0], json!({"x1": 1.0, "y1": 1.0, "x2": 63.0, "y2": 47.0, "confidence": 0.5}));

    // The annotated JPEG existed while uploading and is gone now
    let uploads = publisher.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    let (path, existed, head) = &uploads[0];
    assert!(*existed);
    assert_eq!(head, &vec![0xFF, 0xD8, 0xFF]);
    assert!(path.starts_with(dir.path()));
    assert!(!path.exists());
    assert_eq!(leftover_files(dir.path()), 0);
}

#[tokio::test]
async fn test_publish_failure_cleans_up() {
    let base = spawn_image_server().await;
    let dir = tempfile::tempdir().unwrap();
    let publisher = FakePublisher::new(true);
    let state = test_state(
        ServiceVariant::UrlDetectPublish,
        FixedDetector::new(2),
        dir.path(),
        FetchPolicy::Lenient,
        Some(publisher.clone() as Arc<dyn ArtifactPublisher>),
    );

    let (status, body) = post_json(state, json!({"image_url": format!("{}/face.png", base)})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["detail"],
        "Prediction failed: upload rejected with HTTP 500: storage unavailable"
    );
    assert_eq!(publisher.uploads.lock().unwrap().len(), 1);
    assert_eq!(leftover_files(dir.path()), 0);
}

#[tokio::test]
async fn test_publish_variant_without_publisher() {
    let base = spawn_image_server().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(
        ServiceVariant::UrlDetectPublish,
        FixedDetector::new(2),
        dir.path(),
        FetchPolicy::Lenient,
        None,
    );

    let (status, body) = post_json(state, json!({"image_url": format!("{}/face.png", base)})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["detail"],
        "Prediction failed: publishing credentials are not configured"
    );
    assert_eq!(leftover_files(dir.path()), 0);
}
