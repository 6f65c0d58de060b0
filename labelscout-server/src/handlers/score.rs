//! Scoring handler
//!
//! Handles POST /score: runs the full pipeline for one barcode.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use labelscout_core::{PipelineReport, PipelineRequest};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;

/// Client key used when no forwarding header is present.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Request body for POST /score.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScoreRequest {
    /// UPC or EAN barcode; non-digits are ignored
    #[schema(example = "012345678905")]
    pub upc: String,
    /// Known product page; skips resolution when set
    #[serde(default)]
    #[schema(example = "https://acme.com/products/whey")]
    pub product_url: Option<String>,
}

/// Successful scoring response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreResponse {
    #[schema(example = "success")]
    pub status: &'static str,
    /// Canonical EAN-13 code
    #[schema(example = "0012345678905")]
    pub upc: String,
    /// Where the product URL came from
    #[schema(example = "structured-database")]
    pub source: String,
    #[schema(example = "https://acme.com/products/whey")]
    pub product_url: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    /// Advisory score, 0-100
    #[schema(example = 87)]
    pub score: u8,
    pub summary: String,
    pub highlights: Vec<String>,
    /// Whether the result was written to the product store
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_error: Option<String>,
}

impl From<PipelineReport> for ScoreResponse {
    fn from(report: PipelineReport) -> Self {
        Self {
            status: "success",
            upc: report.upc,
            source: report.source.to_string(),
            product_url: report.product_url,
            name: report.name,
            brand: report.brand,
            score: report.score.score,
            summary: report.score.summary,
            highlights: report.score.highlights,
            persisted: report.persisted,
            persistence_error: report.persistence_error,
        }
    }
}

/// Rate-limit key: first `X-Forwarded-For` entry, else `X-Real-IP`.
pub fn client_key(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| header("x-real-ip"))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Score a product by barcode.
///
/// Resolves the product page (structured database first, AI web search as
/// fallback), confirms it is live, scrapes it and asks the scoring model for
/// an advisory score. Persistence is best-effort: a failed write still
/// returns 200 with `persisted: false`.
#[utoipa::path(
    post,
    path = "/score",
    tag = "Scoring",
    request_body = ScoreRequest,
    responses(
        (status = 200, description = "Product scored", body = ScoreResponse),
        (status = 400, description = "Malformed body, barcode or product URL", body = crate::error::ErrorResponse),
        (status = 404, description = "No product page could be resolved", body = crate::error::ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = crate::error::ErrorResponse),
        (status = 424, description = "Product page is not reachable", body = crate::error::ErrorResponse),
        (status = 502, description = "Upstream service error", body = crate::error::ErrorResponse),
        (status = 504, description = "Upstream service timed out", body = crate::error::ErrorResponse)
    )
)]
pub async fn score_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ScoreRequest>, JsonRejection>,
) -> Result<Json<ScoreResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let mut pipeline_request = PipelineRequest::new(request.upc, client_key(&headers));
    pipeline_request.product_url = request.product_url;

    // A panic inside the run stays inside its task.
    let pipeline = state.pipeline.clone();
    let outcome = tokio::spawn(async move { pipeline.run(pipeline_request).await })
        .await
        .map_err(|e| {
            error!(error = %e, "Pipeline task failed");
            ApiError::internal(format!("pipeline task failed: {e}"))
        })?;

    Ok(Json(outcome?.into()))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_client_key_prefers_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_key(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_key_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_key(&headers), "10.0.0.2");

        assert_eq!(client_key(&HeaderMap::new()), UNKNOWN_CLIENT);
    }
}
