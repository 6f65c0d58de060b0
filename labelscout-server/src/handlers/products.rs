//! Cached product lookup
//!
//! Handles GET /products/{upc}: returns the last stored score for a barcode
//! without running the pipeline.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use labelscout_core::{barcode, ScoredProduct};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;

/// A stored product score.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    /// Canonical EAN-13 code
    #[schema(example = "0012345678905")]
    pub upc: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub product_url: String,
    #[schema(example = "ai-search")]
    pub source: String,
    #[schema(example = 87)]
    pub score: u8,
    pub summary: String,
    pub highlights: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<ScoredProduct> for ProductResponse {
    fn from(product: ScoredProduct) -> Self {
        Self {
            upc: product.upc,
            name: product.name,
            brand: product.brand,
            product_url: product.product_url,
            source: product.source.to_string(),
            score: product.score,
            summary: product.summary,
            highlights: product.highlights,
            updated_at: product.updated_at,
        }
    }
}

/// Look up the stored score for a barcode.
///
/// Any UPC/EAN spelling of the same product resolves to the same row.
#[utoipa::path(
    get,
    path = "/products/{upc}",
    tag = "Products",
    params(("upc" = String, Path, description = "UPC or EAN barcode")),
    responses(
        (status = 200, description = "Stored product score", body = ProductResponse),
        (status = 400, description = "Invalid barcode", body = crate::error::ErrorResponse),
        (status = 404, description = "Barcode has not been scored yet", body = crate::error::ErrorResponse),
        (status = 503, description = "Product store unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_product_handler(
    State(state): State<AppState>,
    Path(upc): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let codes = barcode::variants(&upc).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let product = state
        .store()
        .find(codes.ean13())
        .await
        .map_err(|e| ApiError::service_unavailable(e.to_string()))?
        .ok_or_else(|| ApiError::not_found(format!("no stored score for {}", codes.ean13())))?;

    Ok(Json(product.into()))
}
