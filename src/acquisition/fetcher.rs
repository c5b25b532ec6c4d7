// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP image fetching with timeouts and a body size cap

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::AcquisitionError;
use crate::config::FetchPolicy;

/// Fetches source images referenced by `image_url`
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Client,
    policy: FetchPolicy,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(timeout: Duration, policy: FetchPolicy, max_bytes: usize) -> Result<Self, AcquisitionError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("acne-predict/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| AcquisitionError::FetchFailed(e.to_string()))?;

        Ok(Self {
            client,
            policy,
            max_bytes,
        })
    }

    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    /// Fetch the raw body behind `url`
    ///
    /// Under [`FetchPolicy::Lenient`] a non-2xx body is returned as-is.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, AcquisitionError> {
        let parsed = Url::parse(url).map_err(|e| AcquisitionError::InvalidUrl(format!("{}: {}", url, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(AcquisitionError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        debug!("Fetching image from: {}", url);

        let mut response = self.client.get(parsed).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            match self.policy {
                FetchPolicy::Strict => return Err(AcquisitionError::FetchStatus(status.as_u16())),
                FetchPolicy::Lenient => {
                    warn!("Image URL returned HTTP {}, passing body through", status.as_u16())
                }
            }
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(AcquisitionError::TooLarge(len as usize, self.max_bytes));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(AcquisitionError::TooLarge(body.len() + chunk.len(), self.max_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> AcquisitionError {
    if e.is_timeout() {
        AcquisitionError::Timeout(e.to_string())
    } else {
        AcquisitionError::FetchFailed(e.to_string())
    }
}
