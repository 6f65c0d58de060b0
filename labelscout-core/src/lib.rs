//! LabelScout Core - barcode to product score pipeline
//!
//! Resolves a retail barcode (UPC/EAN) to a product page, scrapes it and asks
//! an AI model for an advisory quality score with short highlights.
//!
//! # Stages
//!
//! - Per-client rate limiting ([`RateLimiter`])
//! - Barcode normalization into lookup variants ([`barcode::variants`])
//! - Source ladder: structured database, then AI web search ([`SourceLadder`])
//! - URL validation with a liveness probe ([`UrlValidator`])
//! - Content extraction under a hard deadline ([`ContentExtractor`])
//! - Scoring that degrades instead of failing ([`Scorer`])
//! - Best-effort persistence ([`ProductStore`])
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use labelscout_core::mock::{MockBarcodeDatabase, MockCompletionClient, MockLivenessProbe, MockScraper};
//! use labelscout_core::{Collaborators, MemoryProductStore, Pipeline, PipelineConfig, PipelineRequest};
//!
//! # async fn example() -> Result<(), labelscout_core::PipelineFailure> {
//! let pipeline = Pipeline::new(
//!     &PipelineConfig::default(),
//!     Collaborators {
//!         database: Arc::new(MockBarcodeDatabase::new()),
//!         search: Arc::new(MockCompletionClient::replying("<url>https://acme.com/whey</url>")),
//!         scoring: Arc::new(MockCompletionClient::replying("SCORE: 80\nHIGHLIGHTS:\n- Clean label")),
//!         scraper: Arc::new(MockScraper::html("<h1>Whey</h1>")),
//!         probe: Arc::new(MockLivenessProbe::ok()),
//!         store: Arc::new(MemoryProductStore::new()),
//!     },
//! );
//!
//! let report = pipeline.run(PipelineRequest::new("012345678905", "127.0.0.1")).await?;
//! assert_eq!(report.score.score, 80);
//! # Ok(())
//! # }
//! ```

pub mod barcode;
pub mod clients;
pub mod config;
pub mod error;
pub mod extract;
pub mod mock;
pub mod parse;
pub mod pipeline;
pub mod rate_limit;
pub mod resolver;
pub mod scoring;
pub mod store;
pub mod types;
pub mod url_check;

// Re-export main types for convenience
pub use barcode::{BarcodeError, CodeVariantSet, MAX_VARIANTS};
pub use config::{PipelineConfig, ServiceConfig};
pub use error::{ClientError, PipelineError, Result};
pub use extract::{ContentExtractor, Extraction};
pub use pipeline::{Collaborators, Pipeline, PipelineFailure, PipelineReport, PipelineRequest, Stage};
pub use rate_limit::{Admission, RateLimiter};
pub use resolver::{Resolution, SourceLadder};
pub use scoring::Scorer;
pub use store::{MemoryProductStore, ProductStore, ScoredProduct, StoreError};
pub use types::{ExtractedContent, ResolvedIdentity, ScoreResult, SourceTag};
pub use url_check::{UrlCheck, UrlValidator};

#[cfg(feature = "network")]
pub use clients::live_collaborators;
