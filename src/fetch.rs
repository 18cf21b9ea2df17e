//! HTTP text source.
//!
//! Implements [`TextSource`] over a shared [`reqwest::Client`]. Each
//! [`FetchRequest`] carries its own timeout, so one client serves both the
//! page-level and the chapter-level fetches.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Instant;
use tracing::debug;

use talmud_page_core::{FetchRequest, RawResponse, TextSource};

/// Fetches text from an HTTP API.
#[derive(Clone)]
pub struct HttpTextSource {
    client: reqwest::Client,
}

impl HttpTextSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("talmud-page/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client))
    }

    /// Wraps an existing client, e.g. one with a proxy configured.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TextSource for HttpTextSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<RawResponse> {
        let url = request.url();
        let started = Instant::now();

        let response = self
            .client
            .get(&url)
            .query(&request.params)
            .timeout(request.timeout)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;

        debug!(
            url = %url,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched"
        );
        Ok(RawResponse { status, body })
    }
}
