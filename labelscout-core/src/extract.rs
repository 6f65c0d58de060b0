//! Content extraction through the scraping service under a hard deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};
use url::Url;

use crate::clients::{ScrapeEnvelope, ScrapeRequest, Scraper};
use crate::error::ClientError;
use crate::types::ExtractedContent;

/// Payload fields checked in order of preference.
pub const PAYLOAD_FIELDS: &[&str] = &["html", "markdown", "content"];

/// Outcome of the EXTRACT stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Content(ExtractedContent),
    /// Deadline expired; the in-flight request was dropped.
    TimedOut,
    ServiceError { status: Option<u16>, body: String },
}

/// Pull the preferred payload out of a successful envelope.
pub fn payload(envelope: &ScrapeEnvelope) -> Result<ExtractedContent, String> {
    if !envelope.succeeded() {
        return Err(envelope.raw().to_string());
    }
    let data = envelope.data().ok_or_else(|| "no data".to_string())?;

    PAYLOAD_FIELDS
        .iter()
        .find_map(|field| {
            data.get(field)
                .and_then(serde_json::Value::as_str)
                .filter(|body| !body.trim().is_empty())
                .map(|body| ExtractedContent {
                    body: body.to_string(),
                    format: (*field).to_string(),
                })
        })
        .ok_or_else(|| "no data".to_string())
}

pub struct ContentExtractor {
    scraper: Arc<dyn Scraper>,
    timeout: Duration,
}

impl ContentExtractor {
    pub fn new(scraper: Arc<dyn Scraper>, timeout: Duration) -> Self {
        Self { scraper, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(level = "info", skip(self), fields(url = %url, timeout_ms = self.timeout.as_millis() as u64))]
    pub async fn extract(&self, url: &Url) -> Extraction {
        let start = Instant::now();
        let request = ScrapeRequest::html(url.as_str());

        // Dropping the scrape future on expiry aborts the connection.
        let result = match tokio::time::timeout(self.timeout, self.scraper.scrape(&request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Extraction deadline expired, request aborted");
                return Extraction::TimedOut;
            }
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        let envelope = match result {
            Ok(envelope) => envelope,
            Err(ClientError::Timeout(_)) => {
                warn!(latency_ms, "Scraper timed out");
                return Extraction::TimedOut;
            }
            Err(ClientError::Status { status, body }) => {
                warn!(status, latency_ms, "Scraper returned error status");
                return Extraction::ServiceError {
                    status: Some(status),
                    body,
                };
            }
            Err(e) => {
                warn!(error = %e, latency_ms, "Scrape request failed");
                return Extraction::ServiceError {
                    status: None,
                    body: e.to_string(),
                };
            }
        };

        match payload(&envelope) {
            Ok(content) => {
                info!(
                    format = %content.format,
                    chars = content.body.chars().count(),
                    latency_ms,
                    "Content extracted"
                );
                Extraction::Content(content)
            }
            Err(body) => {
                warn!(latency_ms, "Scrape envelope carried no usable content");
                Extraction::ServiceError { status: None, body }
            }
        }
    }
}
