use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Client identity sent with every outbound request.
pub const USER_AGENT: &str = "newswire/0.1";

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound page fetching seam. The feed fetcher and content extractor both
/// go through this so tests can drive the pipeline without a network.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<String>;
}

/// Production fetcher: one reqwest client, short timeout, identity header.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed for {url}"))?
            .error_for_status()
            .with_context(|| format!("Error status for {url}"))?;

        response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {url}"))
    }
}
