// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use clap::Parser;
use std::path::PathBuf;

use crate::config::{ServiceConfig, ServiceVariant, StartupError};

/// Acne prediction service
#[derive(Parser, Debug, Default)]
#[command(name = "acne-predict")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Serve acne classification and detection over HTTP", long_about = None)]
pub struct Cli {
    /// Endpoint variant (upload-classify, url-classify, url-detect, url-detect-publish)
    #[arg(long, env = "SERVICE_VARIANT")]
    pub variant: Option<ServiceVariant>,

    /// ONNX model file
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Listen host
    #[arg(long, env = "API_HOST")]
    pub host: Option<String>,

    /// Listen port
    #[arg(short, long, env = "API_PORT")]
    pub port: Option<u16>,

    /// Validate configuration and load the model, then exit
    #[arg(long)]
    pub check: bool,
}

impl Cli {
    /// Resolve configuration from the environment with command-line flags taking precedence
    pub fn load_config(&self) -> Result<ServiceConfig, StartupError> {
        self.load_config_with(|key| std::env::var(key).ok())
    }

    /// Same as [`Cli::load_config`] over an arbitrary environment lookup
    pub fn load_config_with<F>(&self, env: F) -> Result<ServiceConfig, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Flags are fed through the same parser so variant-dependent defaults still apply
        ServiceConfig::from_lookup(|key| {
            let flag = match key {
                "SERVICE_VARIANT" => self.variant.map(|v| v.as_str().to_string()),
                "MODEL_PATH" => self.model_path.as_ref().map(|p| p.display().to_string()),
                "API_HOST" => self.host.clone(),
                "API_PORT" => self.port.map(|p| p.to_string()),
                _ => None,
            };
            flag.or_else(|| env(key))
        })
    }
}
