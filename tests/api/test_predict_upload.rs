// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /predict with a multipart upload (`upload-classify`)

use acne_predict::config::{FetchPolicy, ServiceVariant};
use axum::http::StatusCode;

use super::common::{leftover_files, png_bytes, post_upload, test_state, WidthClassifier};

#[tokio::test]
async fn test_upload_classifies_image() {
    let dir = tempfile::tempdir().unwrap();
    let model = WidthClassifier::new(3);
    let state = test_state(
        ServiceVariant::UploadClassify,
        model.clone(),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    // width 11 -> class 1
    let (status, body) = post_upload(state, "file", "face.png", &png_bytes(11, 20)).await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["class"], 1);
    assert!((body["confidence"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    assert_eq!(body.as_object().unwrap().len(), 2);

    // The model saw a temp file that no longer exists
    let seen = model.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with(dir.path()));
    assert!(!seen[0].exists());
    assert_eq!(leftover_files(dir.path()), 0);
}

#[tokio::test]
async fn test_client_filename_not_used_as_path() {
    let dir = tempfile::tempdir().unwrap();
    let model = WidthClassifier::new(3);
    let state = test_state(
        ServiceVariant::UploadClassify,
        model.clone(),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    let (status, _) = post_upload(state, "file", "../../temp_image.jpg", &png_bytes(12, 12)).await;

    assert_eq!(status, StatusCode::OK);
    let seen = model.seen.lock().unwrap().clone();
    assert!(seen[0].starts_with(dir.path()));
    assert!(!seen[0].to_string_lossy().contains("temp_image"));
    assert_eq!(seen[0].extension().unwrap(), "png");
}

#[tokio::test]
async fn test_undecodable_upload_is_internal_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(
        ServiceVariant::UploadClassify,
        WidthClassifier::new(3),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    let (status, body) = post_upload(state, "file", "notes.txt", b"definitely not an image").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Prediction failed: "));
    assert_eq!(leftover_files(dir.path()), 0);
}

#[tokio::test]
async fn test_missing_file_field() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(
        ServiceVariant::UploadClassify,
        WidthClassifier::new(3),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    let (status, body) = post_upload(state, "image", "face.png", &png_bytes(11, 11)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "No file was uploaded in field 'file'");
    assert_eq!(leftover_files(dir.path()), 0);
}

#[tokio::test]
async fn test_empty_upload() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(
        ServiceVariant::UploadClassify,
        WidthClassifier::new(3),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    let (status, body) = post_upload(state, "file", "face.png", b"").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Prediction failed: Uploaded file is empty");
}

#[tokio::test]
async fn test_concurrent_uploads_do_not_cross() {
    let dir = tempfile::tempdir().unwrap();
    let model = WidthClassifier::new(8);
    let state = test_state(
        ServiceVariant::UploadClassify,
        model.clone(),
        dir.path(),
        FetchPolicy::Strict,
        None,
    );

    let handles: Vec<_> = (0..8u32)
        .map(|i| {
            let state = state.clone();
            tokio::spawn(async move {
                let (status, body) =
                    post_upload(state, "file", "face.png", &png_bytes(10 + i, 16)).await;
                (i, status, body)
            })
        })
        .collect();

    for handle in handles {
        let (i, status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["class"], i as u64);
    }

    let seen = model.seen.lock().unwrap().clone();
    let mut unique = seen.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 8);
    assert_eq!(leftover_files(dir.path()), 0);
}
