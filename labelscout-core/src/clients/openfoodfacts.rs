//! Open Food Facts product lookup.
//!
//! Uses the public read API at `{base}/api/v0/product/{code}.json`, which
//! answers `status: 1` with a `product` object when the code is known.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::http_client::{build_http_client, join_url, send_json};
use super::{BarcodeDatabase, ProductRecord};
use crate::config::{DEFAULT_CALL_TIMEOUT, DEFAULT_OPENFOODFACTS_BASE_URL};
use crate::error::ClientError;

const SERVICE: &str = "openfoodfacts";

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    product: Option<serde_json::Value>,
}

/// Open Food Facts barcode database client.
pub struct OpenFoodFactsClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl OpenFoodFactsClient {
    /// Client against the public endpoint with the default timeout.
    pub fn new() -> Result<Self, ClientError> {
        Self::with_config(DEFAULT_OPENFOODFACTS_BASE_URL, DEFAULT_CALL_TIMEOUT)
    }

    #[instrument(level = "debug", skip_all, fields(base_url = %base_url, timeout_ms = timeout.as_millis() as u64))]
    pub fn with_config(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.to_string(),
            timeout,
        })
    }

    fn lookup_url(&self, code: &str) -> String {
        join_url(&self.base_url, &format!("api/v0/product/{code}.json"))
    }
}

#[async_trait]
impl BarcodeDatabase for OpenFoodFactsClient {
    #[instrument(level = "debug", skip(self), fields(source = SERVICE))]
    async fn lookup(&self, code: &str) -> Result<Option<ProductRecord>, ClientError> {
        let request = self.client.get(self.lookup_url(code));

        let response: LookupResponse = match send_json(request, SERVICE, self.timeout).await {
            Ok(response) => response,
            // Some deployments answer unknown codes with 404 instead of status 0.
            Err(ClientError::Status { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let record = match (response.status, response.product) {
            (1, Some(product)) if product.is_object() => Some(ProductRecord::new(product)),
            _ => None,
        };
        debug!(found = record.is_some(), "Barcode lookup finished");
        Ok(record)
    }
}
