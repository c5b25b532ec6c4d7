// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the acne prediction service

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-unified-variants-2025-11-02";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

/// Build date
pub const BUILD_DATE: &str = "2025-11-02";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "upload-classify",
    "url-classify",
    "url-detect",
    "url-detect-publish",
    "severity-buckets",
    "annotated-images",
    "cloudinary-publish",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Acne Predict {} ({})", VERSION_NUMBER, BUILD_DATE)
}
