//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod health;
pub mod products;
pub mod score;

pub use crate::state::AppState;
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use products::{get_product_handler, ProductResponse};
pub use score::{client_key, score_handler, ScoreRequest, ScoreResponse};
