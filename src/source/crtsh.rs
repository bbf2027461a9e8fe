// src/source/crtsh.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::DiscoverySource;
use crate::config::SourceConfig;
use crate::types::RawRecord;

/// HTTP client for the crt.sh JSON search endpoint
///
/// Makes a single attempt per search; callers decide what a failure means.
pub struct CrtShClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl CrtShClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl DiscoverySource for CrtShClient {
    fn name(&self) -> &str {
        "crt.sh"
    }

    /// Endpoint: GET {base_url}/?q={domain}&output=json
    async fn search(&self, domain: &str) -> Result<Vec<RawRecord>> {
        let url = format!("{}/", self.base_url);

        debug!("Searching {} for {}", url, domain);

        let response = self
            .http_client
            .get(&url)
            .query(&[("q", domain), ("output", "json")])
            .send()
            .await
            .context("Failed to query crt.sh")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "crt.sh search failed with status {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            );
        }

        let records: Vec<RawRecord> = response
            .json()
            .await
            .context("Failed to parse crt.sh JSON")?;

        debug!("Received {} entries from crt.sh for {}", records.len(), domain);

        Ok(records)
    }
}
