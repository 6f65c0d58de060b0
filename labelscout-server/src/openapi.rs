//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3.0 document for the LabelScout API.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers::{HealthResponse, ProductResponse, ReadyResponse, ScoreRequest, ScoreResponse};

/// LabelScout API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "LabelScout API",
        version = "0.1.0",
        description = r#"
## Barcode to Product Score

LabelScout takes a retail barcode (UPC-A or EAN-13) and returns an advisory
quality score for the product, with a short summary and highlights.

### How It Works

1. The barcode is normalized into its UPC/EAN lookup variants
2. A structured product database is queried; an AI web search is the fallback
3. The product page URL is checked for liveness
4. The page is scraped and sent to a scoring model
5. The result is stored and returned

Requests are rate limited per client (5 per minute by default). Scores are
advisory only.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Scoring", description = "Run the scoring pipeline for a barcode"),
        (name = "Products", description = "Read previously stored product scores"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::score::score_handler,
        crate::handlers::products::get_product_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            ScoreRequest,
            ScoreResponse,
            ProductResponse,
            ErrorResponse,
        )
    )
)]
pub struct ApiDoc;
