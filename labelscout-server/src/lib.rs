//! LabelScout Server Library - REST API for the barcode scoring pipeline
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod product_store;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ErrorResponse};
pub use openapi::ApiDoc;
pub use product_store::PostgresProductStore;
pub use routes::create_router;
pub use state::AppState;
