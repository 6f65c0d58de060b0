//! HEAD-request liveness probe.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use super::http_client::build_http_client;
use super::LivenessProbe;
use crate::error::ClientError;

/// Issues a single HEAD request and reports the final status after redirects.
pub struct HttpLivenessProbe {
    client: Client,
    timeout: Duration,
}

impl HttpLivenessProbe {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            timeout,
        })
    }
}

#[async_trait]
impl LivenessProbe for HttpLivenessProbe {
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn probe(&self, url: &Url) -> Result<u16, ClientError> {
        let response = self.client.head(url.clone()).send().await.map_err(|e| {
            warn!(error = %e, "Liveness probe failed");
            if e.is_timeout() {
                ClientError::Timeout(self.timeout)
            } else {
                ClientError::from(e)
            }
        })?;

        let status = response.status().as_u16();
        debug!(status, "Liveness probe answered");
        Ok(status)
    }
}
