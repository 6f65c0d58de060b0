//! Shared HTTP plumbing for the upstream clients.
//!
//! Calls are attempted exactly once. Deadlines are enforced here through the
//! client timeout and again by the pipeline around each stage.

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ClientError;

/// Upstream error bodies are echoed to callers; keep them bounded.
const MAX_ERROR_BODY_CHARS: usize = 2048;

/// Build a client with the given per-request timeout.
pub fn build_http_client(timeout: Duration) -> Result<Client, ClientError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("labelscout/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            warn!(error = %e, "Failed to create HTTP client");
            ClientError::Configuration(format!("Failed to create HTTP client: {e}"))
        })
}

/// Send a request and decode a JSON body from a 2xx response.
///
/// Non-2xx responses become [`ClientError::Status`] carrying the body text.
pub(crate) async fn send_json<R: DeserializeOwned>(
    request: RequestBuilder,
    service: &'static str,
    timeout: Duration,
) -> Result<R, ClientError> {
    let start = Instant::now();

    let response = request.send().await.map_err(|e| {
        let latency_ms = start.elapsed().as_millis() as u64;
        warn!(service, error = %e, latency_ms, "Request failed");
        if e.is_timeout() {
            ClientError::Timeout(timeout)
        } else {
            ClientError::from(e)
        }
    })?;

    let status = response.status();
    debug!(service, status = %status, "Received HTTP response");

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(
            service,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Upstream returned error status"
        );
        return Err(ClientError::Status {
            status: status.as_u16(),
            body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
        });
    }

    let parsed = response.json::<R>().await.map_err(|e| {
        warn!(service, error = %e, "Failed to parse JSON response");
        ClientError::Decode(format!("{service}: {e}"))
    })?;

    debug!(
        service,
        latency_ms = start.elapsed().as_millis() as u64,
        "Request completed successfully"
    );
    Ok(parsed)
}

/// Join a base URL and a path without doubling the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
