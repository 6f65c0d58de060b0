//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use axum::{
    http::{header, HeaderName, Method, StatusCode},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::handlers::{get_product_handler, health, ready, score_handler};
use crate::middleware::{request_id, REQUEST_ID_HEADER};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Create the application router for `state` with the given configuration.
pub fn create_router(state: AppState, config: &Config) -> Router {
    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!("CORS: Restricting to {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    HeaderName::from_static(REQUEST_ID_HEADER),
                ])
                .expose_headers([header::RETRY_AFTER, HeaderName::from_static(REQUEST_ID_HEADER)])
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any)
        }
    };

    let body_limit = RequestBodyLimitLayer::new(config.body_limit_kb * 1024);

    // Outer bound on a request; a pipeline run already in flight is not cancelled
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        config.request_timeout(),
    );

    let api = Router::new()
        .route("/score", post(score_handler))
        .route("/products/{upc}", get(get_product_handler))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state);

    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api)
        .layer(cors)
        .layer(body_limit)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id))
}
