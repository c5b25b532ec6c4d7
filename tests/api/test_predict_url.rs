// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /predict with `{"image_url"}` (`url-classify`)

use acne_predict::config::{FetchPolicy, ServiceVariant};
use axum::{body::Body, http::header, http::Request, http::StatusCode};
use serde_json::json;

use super::common::{
    leftover_files, post_json, send, spawn_image_server, test_state, WidthClassifier,
};

#[tokio::test]
async fn test_url_classify() {
    let base = spawn_image_server().await;
    let dir = tempfile::tempdir().unwrap();
    let model = WidthClassifier::new(4);
    let state = test_state(
        ServiceVariant::UrlClassify,
        model.clone(),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    // width 13 -> class 3
    let (status, body) = post_json(state, json!({"image_url": format!("{}/faces/13", base)})).await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["class"], 3);
    assert!(body["confidence"].as_f64().unwrap() > 0.89);
    assert_eq!(model.seen.lock().unwrap().len(), 1);
    assert_eq!(leftover_files(dir.path()), 0);
}

#[tokio::test]
async fn test_strict_404_is_bad_request() {
    let base = spawn_image_server().await;
    let dir = tempfile::tempdir().unwrap();
    let model = WidthClassifier::new(4);
    let state = test_state(
        ServiceVariant::UrlClassify,
        model.clone(),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    let (status, body) =
        post_json(state, json!({"image_url": format!("{}/missing.png", base)})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"detail": "Failed to fetch image from URL"}));
    // Inference never ran
    assert!(model.seen.lock().unwrap().is_empty());
    assert_eq!(leftover_files(dir.path()), 0);
}

#[tokio::test]
async fn test_strict_unreachable_host_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(
        ServiceVariant::UrlClassify,
        WidthClassifier::new(4),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    let (status, body) = post_json(state, json!({"image_url": "http://127.0.0.1:9/face.png"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Failed to fetch image from URL");
}

#[tokio::test]
async fn test_strict_invalid_url_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(
        ServiceVariant::UrlClassify,
        WidthClassifier::new(4),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    let (status, body) = post_json(state, json!({"image_url": "ftp://example.com/face.png"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Failed to fetch image from URL");
}

#[tokio::test]
async fn test_fetch_timeout() {
    let base = spawn_image_server().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(
        ServiceVariant::UrlClassify,
        WidthClassifier::new(4),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    let (status, body) = post_json(state, json!({"image_url": format!("{}/slow.png", base)})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Failed to fetch image from URL");
    assert_eq!(leftover_files(dir.path()), 0);
}

#[tokio::test]
async fn test_malformed_json_rejected_before_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let model = WidthClassifier::new(4);
    let state = test_state(
        ServiceVariant::UrlClassify,
        model.clone(),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"image_url\": "))
        .unwrap();
    let (status, body) = send(state.clone(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body["detail"].as_str().expect("JSON detail for a syntax error");
    assert!(detail.starts_with("Invalid request body:"), "detail: {}", detail);

    let (status, body) = post_json(state, json!({"url": "http://example.com"})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let detail = body["detail"].as_str().expect("JSON detail for a missing field");
    assert!(detail.contains("image_url"), "detail: {}", detail);

    assert!(model.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_download_rejected_and_cleaned_up() {
    let base = spawn_image_server().await;
    let dir = tempfile::tempdir().unwrap();
    let model = WidthClassifier::new(4);
    let state = test_state(
        ServiceVariant::UrlClassify,
        model.clone(),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    let (status, body) = post_json(state, json!({"image_url": format!("{}/big.png", base)})).await;

    // Size overruns are not fetch failures, so even the strict policy reports a 500
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "body: {}", body);
    let detail = body["detail"].as_str().unwrap();
    assert!(
        detail.starts_with("Prediction failed: Image is too large"),
        "detail: {}",
        detail
    );
    assert!(model.seen.lock().unwrap().is_empty());
    assert_eq!(leftover_files(dir.path()), 0);
}

#[tokio::test]
async fn test_concurrent_url_requests_do_not_cross() {
    let base = spawn_image_server().await;
    let dir = tempfile::tempdir().unwrap();
    let model = WidthClassifier::new(6);
    let state = test_state(
        ServiceVariant::UrlClassify,
        model.clone(),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    let handles: Vec<_> = (0..6u32)
        .map(|i| {
            let state = state.clone();
            let url = format!("{}/faces/{}", base, 10 + i);
            tokio::spawn(async move {
                let (status, body) = post_json(state, json!({ "image_url": url })).await;
                (i, status, body)
            })
        })
        .collect();

    for handle in handles {
        let (i, status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["class"], i as u64);
    }
    assert_eq!(leftover_files(dir.path()), 0);
}
