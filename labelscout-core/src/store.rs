//! Persistence of scored products.
//!
//! Rows are keyed on the canonical EAN-13 form of the barcode and fully
//! overwritten on every successful run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::SourceTag;

/// A scored product as persisted after a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredProduct {
    /// Canonical EAN-13 code
    pub upc: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub product_url: String,
    pub source: SourceTag,
    pub score: u8,
    pub summary: String,
    pub highlights: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Errors raised by a product store backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage backend for scored products.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Insert or overwrite the row for `product.upc`.
    async fn upsert(&self, product: &ScoredProduct) -> StoreResult<()>;

    /// Fetch the row for a canonical EAN-13 code.
    async fn find(&self, upc: &str) -> StoreResult<Option<ScoredProduct>>;

    /// Short backend name for health reporting.
    fn backend(&self) -> &'static str;
}

/// In-memory store for development, the CLI and tests.
///
/// Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryProductStore {
    products: DashMap<String, ScoredProduct>,
}

impl MemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn upsert(&self, product: &ScoredProduct) -> StoreResult<()> {
        debug!(upc = %product.upc, score = product.score, "Storing product in memory");
        self.products.insert(product.upc.clone(), product.clone());
        Ok(())
    }

    async fn find(&self, upc: &str) -> StoreResult<Option<ScoredProduct>> {
        Ok(self.products.get(upc).map(|entry| entry.value().clone()))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
