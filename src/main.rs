// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use acne_predict::{
    api::{start_server, AppState},
    cli::Cli,
    version,
    vision::{load_model_runtime, DetectorParams},
};
use anyhow::Result;
use clap::Parser;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    tracing::info!("📦 BUILD VERSION: {}", version::VERSION);
    tracing::info!("📅 Build Date: {}", version::BUILD_DATE);
    tracing::info!("✨ Features: {}", version::FEATURES.join(", "));

    let config = cli.load_config()?;
    config.validate()?;
    tracing::info!("⚙️  Configuration: {:?}", config);

    let params = DetectorParams {
        confidence_threshold: config.confidence_threshold,
        iou_threshold: config.iou_threshold,
        ..DetectorParams::default()
    };
    let model = load_model_runtime(config.variant.model_kind(), &config.model_path, params)?;

    let state = AppState::from_config(&config, model)?;

    if cli.check {
        tracing::info!("✅ Configuration and model OK");
        return Ok(());
    }

    start_server(&config, state).await
}
