//! Firecrawl scrape client (`POST {base}/v1/scrape`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::http_client::{build_http_client, join_url, send_json};
use super::{ScrapeEnvelope, ScrapeRequest, Scraper};
use crate::error::ClientError;

const SERVICE: &str = "firecrawl";

pub struct FirecrawlClient {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl FirecrawlClient {
    #[instrument(level = "debug", skip_all, fields(base_url = %base_url, timeout_ms = timeout.as_millis() as u64))]
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ClientError::Configuration("missing FIRECRAWL_API_KEY".into()))?;

        Ok(Self {
            client: build_http_client(timeout)?,
            endpoint: join_url(base_url, "v1/scrape"),
            api_key,
            timeout,
        })
    }
}

#[async_trait]
impl Scraper for FirecrawlClient {
    #[instrument(level = "debug", skip_all, fields(url = %request.url))]
    async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeEnvelope, ClientError> {
        let http = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request);

        let raw: serde_json::Value = send_json(http, SERVICE, self.timeout).await?;
        let envelope = ScrapeEnvelope::new(raw);
        debug!(success = envelope.succeeded(), "Scrape envelope received");
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let result = FirecrawlClient::new("https://fc.test", None, Duration::from_secs(9));
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn test_endpoint_and_body() {
        let client =
            FirecrawlClient::new("https://api.firecrawl.dev", Some("fc".into()), Duration::from_secs(9))
                .unwrap();
        assert_eq!(client.endpoint, "https://api.firecrawl.dev/v1/scrape");

        let body = serde_json::to_value(ScrapeRequest::html("https://acme.com/whey")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "url": "https://acme.com/whey", "formats": ["html"] })
        );
    }
}
