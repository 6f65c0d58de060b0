//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;
use std::time::Instant;

use labelscout_core::{Pipeline, ProductStore};

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Scoring pipeline, including the rate limiter and product store
    pub pipeline: Arc<Pipeline>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ProductStore> {
        self.pipeline.store()
    }
}
