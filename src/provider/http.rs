//! REST market-data client.

use crate::config::ProviderConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::traits::MarketDataProvider;
use super::types::{ApiResponse, DataKind, Payload};

/// Bearer-authenticated JSON API client.
///
/// Response shapes are normalized here, so callers only ever see [`Payload`].
pub struct HttpProvider {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, symbol: &str, kind: DataKind) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            kind.path(),
            urlencoding::encode(symbol)
        )
    }
}

#[async_trait]
impl MarketDataProvider for HttpProvider {
    #[instrument(skip(self))]
    async fn fetch(&self, symbol: &str, kind: DataKind) -> Result<Payload> {
        let url = self.url(symbol, kind);
        let mut request = self.http.get(&url);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to fetch {} for {}", kind, symbol))?
            .error_for_status()
            .with_context(|| format!("API rejected {} request for {}", kind, symbol))?;

        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        let payload = ApiResponse::parse(&body)
            .with_context(|| format!("Unrecognized {} response shape for {}", kind, symbol))?
            .into_payload();

        debug!(symbol = %symbol, %kind, records = payload.records().len(), "Fetched");
        Ok(payload)
    }
}
