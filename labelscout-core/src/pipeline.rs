//! The resolve → validate → extract → score → persist chain.
//!
//! ```text
//! RATE_CHECK → NORMALIZE → RESOLVE → VALIDATE_URL → EXTRACT → SCORE → PERSIST
//! ```
//!
//! The first blocking failure ends the run and is reported with the stage
//! it happened in. Scoring never blocks and a failed write only flags the
//! report.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::barcode::{variants, CodeVariantSet};
use crate::clients::{BarcodeDatabase, CompletionClient, LivenessProbe, Scraper};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::extract::{ContentExtractor, Extraction};
use crate::rate_limit::{Admission, RateLimiter};
use crate::resolver::{Resolution, SourceLadder};
use crate::scoring::Scorer;
use crate::store::{ProductStore, ScoredProduct};
use crate::types::{ResolvedIdentity, ScoreResult, SourceTag};
use crate::url_check::{UrlCheck, UrlValidator};

const SCRAPER_SERVICE: &str = "scraper";

/// Pipeline stage, reported with every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RateCheck,
    Normalize,
    Resolve,
    ValidateUrl,
    Extract,
    Score,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateCheck => "rate_check",
            Self::Normalize => "normalize",
            Self::Resolve => "resolve",
            Self::ValidateUrl => "validate_url",
            Self::Extract => "extract",
            Self::Score => "score",
            Self::Persist => "persist",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scoring request.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub barcode: String,
    /// Known product page; skips resolution when set.
    pub product_url: Option<String>,
    /// Identity the rate limit is keyed on.
    pub client_key: String,
}

impl PipelineRequest {
    pub fn new(barcode: impl Into<String>, client_key: impl Into<String>) -> Self {
        Self {
            barcode: barcode.into(),
            product_url: None,
            client_key: client_key.into(),
        }
    }

    #[must_use]
    pub fn with_product_url(mut self, url: impl Into<String>) -> Self {
        self.product_url = Some(url.into());
        self
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Canonical EAN-13 code
    pub upc: String,
    pub source: SourceTag,
    pub product_url: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub score: ScoreResult,
    pub persisted: bool,
    pub persistence_error: Option<String>,
}

/// A run that ended before producing a score.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} stage failed: {error}")]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub error: PipelineError,
    /// Barcode as far as it was known: raw input before normalization,
    /// canonical EAN-13 afterwards.
    pub upc: Option<String>,
    pub product_url: Option<String>,
}

/// External collaborators wired into a pipeline.
#[derive(Clone)]
pub struct Collaborators {
    pub database: Arc<dyn BarcodeDatabase>,
    pub search: Arc<dyn CompletionClient>,
    pub scoring: Arc<dyn CompletionClient>,
    pub scraper: Arc<dyn Scraper>,
    pub probe: Arc<dyn LivenessProbe>,
    pub store: Arc<dyn ProductStore>,
}

/// Scoring pipeline. Cheap to share behind an `Arc`; runs are independent
/// apart from the rate limiter.
pub struct Pipeline {
    limiter: Arc<RateLimiter>,
    ladder: SourceLadder,
    validator: UrlValidator,
    extractor: ContentExtractor,
    scorer: Scorer,
    store: Arc<dyn ProductStore>,
    call_timeout: Duration,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig, collaborators: Collaborators) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_window,
            config.rate_limit_max_requests,
        ));

        Self {
            limiter,
            ladder: SourceLadder::new(
                collaborators.database,
                collaborators.search,
                config.search_model.clone(),
                config.call_timeout,
            ),
            validator: UrlValidator::new(collaborators.probe, config.call_timeout),
            extractor: ContentExtractor::new(collaborators.scraper, config.extract_timeout),
            scorer: Scorer::new(
                collaborators.scoring,
                config.scoring_model.clone(),
                config.content_budget,
                config.call_timeout,
            ),
            store: collaborators.store,
            call_timeout: config.call_timeout,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn store(&self) -> &Arc<dyn ProductStore> {
        &self.store
    }

    /// Run the full chain for one request.
    #[instrument(level = "info", skip_all, fields(client_key = %request.client_key, barcode = %request.barcode))]
    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineReport, PipelineFailure> {
        let start = Instant::now();
        let raw_upc = Some(request.barcode.trim().to_string()).filter(|upc| !upc.is_empty());

        if let Admission::Denied { retry_after } =
            self.limiter.admit(&request.client_key, Instant::now())
        {
            return Err(fail(
                Stage::RateCheck,
                PipelineError::RateLimited { retry_after },
                raw_upc,
                None,
            ));
        }

        let codes = variants(&request.barcode).map_err(|e| {
            warn!(error = %e, "Barcode rejected");
            fail(
                Stage::Normalize,
                PipelineError::InputInvalid(e.to_string()),
                raw_upc.clone(),
                None,
            )
        })?;
        let upc = codes.ean13().to_string();

        let resolution = self.resolve(&codes, request.product_url).await?;
        let Some(candidate) = resolution.candidate_url else {
            return Err(fail(
                Stage::Resolve,
                PipelineError::NotFound(
                    "could not resolve a product URL from any source".to_string(),
                ),
                Some(upc),
                None,
            ));
        };

        let url = match self.validator.validate(&candidate).await {
            UrlCheck::Valid(url) => url,
            UrlCheck::Invalid(reason) => {
                return Err(fail(
                    Stage::ValidateUrl,
                    PipelineError::InputInvalid(format!("product URL is invalid: {reason}")),
                    Some(upc),
                    Some(candidate),
                ));
            }
            UrlCheck::Unreachable { status } => {
                return Err(fail(
                    Stage::ValidateUrl,
                    PipelineError::UpstreamUnreachable {
                        reason: format!("product URL is not reachable (status: {status})"),
                        status: Some(status),
                    },
                    Some(upc),
                    Some(candidate),
                ));
            }
            UrlCheck::TransportFailure(reason) => {
                return Err(fail(
                    Stage::ValidateUrl,
                    PipelineError::UpstreamUnreachable {
                        reason: format!("could not verify product URL: {reason}"),
                        status: None,
                    },
                    Some(upc),
                    Some(candidate),
                ));
            }
        };
        let product_url = url.to_string();

        let content = match self.extractor.extract(&url).await {
            Extraction::Content(content) => content,
            Extraction::TimedOut => {
                return Err(fail(
                    Stage::Extract,
                    PipelineError::UpstreamTimeout(format!(
                        "scraper did not answer within {:?}",
                        self.extractor.timeout()
                    )),
                    Some(upc),
                    Some(product_url),
                ));
            }
            Extraction::ServiceError { status, body } => {
                return Err(fail(
                    Stage::Extract,
                    PipelineError::UpstreamError {
                        service: SCRAPER_SERVICE,
                        status,
                        body,
                    },
                    Some(upc),
                    Some(product_url),
                ));
            }
        };

        let identity = resolution.identity;
        let score = self.scorer.score(&identity, Some(&content)).await;

        let product = ScoredProduct {
            upc: upc.clone(),
            name: identity.name.clone(),
            brand: identity.brand.clone(),
            product_url: product_url.clone(),
            source: identity.source,
            score: score.score,
            summary: score.summary.clone(),
            highlights: score.highlights.clone(),
            updated_at: Utc::now(),
        };
        let persistence_error = self.persist(&product).await;

        info!(
            upc = %upc,
            source = %identity.source,
            score = score.score,
            persisted = persistence_error.is_none(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Pipeline run completed"
        );

        Ok(PipelineReport {
            upc,
            source: identity.source,
            product_url,
            name: identity.name,
            brand: identity.brand,
            score,
            persisted: persistence_error.is_none(),
            persistence_error,
        })
    }

    async fn resolve(
        &self,
        codes: &CodeVariantSet,
        known_url: Option<String>,
    ) -> Result<Resolution, PipelineFailure> {
        if let Some(url) = known_url.filter(|url| !url.trim().is_empty()) {
            info!(url = %url, "Caller supplied product URL, skipping resolution");
            return Ok(Resolution {
                identity: ResolvedIdentity {
                    source: SourceTag::Caller,
                    ..ResolvedIdentity::unresolved()
                },
                candidate_url: Some(url.trim().to_string()),
            });
        }

        self.ladder
            .resolve(codes)
            .await
            .map_err(|error| fail(Stage::Resolve, error, Some(codes.ean13().to_string()), None))
    }

    /// Returns the failure message when the write did not go through.
    async fn persist(&self, product: &ScoredProduct) -> Option<String> {
        let result = tokio::time::timeout(self.call_timeout, self.store.upsert(product)).await;
        match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                warn!(upc = %product.upc, error = %e, "Failed to persist scored product");
                Some(e.to_string())
            }
            Err(_) => {
                warn!(upc = %product.upc, "Persisting scored product timed out");
                Some(format!("store did not answer within {:?}", self.call_timeout))
            }
        }
    }
}

fn fail(
    stage: Stage,
    error: PipelineError,
    upc: Option<String>,
    product_url: Option<String>,
) -> PipelineFailure {
    warn!(stage = %stage, code = error.code(), error = %error, "Pipeline run failed");
    PipelineFailure {
        stage,
        error,
        upc,
        product_url,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ClientError;
    use crate::mock::{
        FailingProductStore, MockBarcodeDatabase, MockCompletionClient, MockLivenessProbe,
        MockScraper,
    };
    use crate::store::MemoryProductStore;

    const SCORE_REPLY: &str = "SCORE: 87\nHIGHLIGHTS:\n- Clean label\n- Third-party tested";

    struct Harness {
        database: Arc<MockBarcodeDatabase>,
        search: Arc<MockCompletionClient>,
        scoring: Arc<MockCompletionClient>,
        scraper: Arc<MockScraper>,
        probe: Arc<MockLivenessProbe>,
        store: Arc<dyn ProductStore>,
    }

    impl Harness {
        fn happy() -> Self {
            Self {
                database: Arc::new(MockBarcodeDatabase::new().with_record(
                    "0012345678905",
                    json!({
                        "url": "https://acme.com/whey",
                        "product_name": "Acme Whey Protein",
                        "brands": "Acme"
                    }),
                )),
                search: Arc::new(MockCompletionClient::replying("<url>NOT_FOUND</url>")),
                scoring: Arc::new(MockCompletionClient::replying(SCORE_REPLY)),
                scraper: Arc::new(MockScraper::html("<h1>Acme Whey Protein</h1>")),
                probe: Arc::new(MockLivenessProbe::ok()),
                store: Arc::new(MemoryProductStore::new()),
            }
        }

        fn pipeline(&self) -> Pipeline {
            Pipeline::new(
                &PipelineConfig::default(),
                Collaborators {
                    database: self.database.clone(),
                    search: self.search.clone(),
                    scoring: self.scoring.clone(),
                    scraper: self.scraper.clone(),
                    probe: self.probe.clone(),
                    store: self.store.clone(),
                },
            )
        }
    }

    #[tokio::test]
    async fn test_end_to_end_success() {
        let harness = Harness::happy();
        let report = harness
            .pipeline()
            .run(PipelineRequest::new("012345678905", "10.0.0.1"))
            .await
            .unwrap();

        assert_eq!(report.upc, "0012345678905");
        assert_eq!(report.product_url, "https://acme.com/whey");
        assert_eq!(report.source, SourceTag::StructuredDatabase);
        assert_eq!(report.score.score, 87);
        assert_eq!(report.score.highlights, vec!["Clean label", "Third-party tested"]);
        assert!(report.persisted);
        assert_eq!(harness.search.calls(), 0);

        let stored = harness.store.find("0012345678905").await.unwrap().unwrap();
        assert_eq!(stored.score, 87);
        assert_eq!(stored.brand.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn test_persistence_failure_still_succeeds() {
        let harness = Harness {
            store: Arc::new(FailingProductStore::new()),
            ..Harness::happy()
        };
        let report = harness
            .pipeline()
            .run(PipelineRequest::new("012345678905", "10.0.0.1"))
            .await
            .unwrap();

        assert_eq!(report.score.score, 87);
        assert!(!report.persisted);
        assert!(report.persistence_error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_ai_search_fallback_with_failing_store() {
        let harness = Harness {
            database: Arc::new(MockBarcodeDatabase::new()),
            search: Arc::new(MockCompletionClient::replying(
                "<url>https://brand.com/product</url>",
            )),
            store: Arc::new(FailingProductStore::new()),
            ..Harness::happy()
        };
        let report = harness
            .pipeline()
            .run(PipelineRequest::new("012345678905", "10.0.0.2"))
            .await
            .unwrap();

        assert_eq!(report.product_url, "https://brand.com/product");
        assert_eq!(report.source, SourceTag::AiSearch);
        assert_eq!(report.score.score, 87);
        assert_eq!(report.score.highlights, vec!["Clean label", "Third-party tested"]);
        assert!(!report.persisted);
        assert!(report.persistence_error.is_some());
        assert_eq!(harness.search.calls(), 1);
        assert_eq!(harness.probe.calls(), 1);
        assert_eq!(harness.scraper.calls(), 1);
    }

    #[tokio::test]
    async fn test_sixth_run_is_rate_limited() {
        let harness = Harness::happy();
        let pipeline = harness.pipeline();

        for _ in 0..5 {
            pipeline
                .run(PipelineRequest::new("012345678905", "10.0.0.9"))
                .await
                .unwrap();
        }
        let failure = pipeline
            .run(PipelineRequest::new("012345678905", "10.0.0.9"))
            .await
            .unwrap_err();

        assert_eq!(failure.stage, Stage::RateCheck);
        assert!(matches!(failure.error, PipelineError::RateLimited { .. }));
        assert_eq!(harness.database.calls(), 10);
    }

    #[tokio::test]
    async fn test_invalid_barcode_makes_no_calls() {
        let harness = Harness::happy();
        let failure = harness
            .pipeline()
            .run(PipelineRequest::new("not-a-code", "c"))
            .await
            .unwrap_err();

        assert_eq!(failure.stage, Stage::Normalize);
        assert_eq!(failure.error.code(), "INVALID_INPUT");
        assert_eq!(failure.upc.as_deref(), Some("not-a-code"));
        assert_eq!(harness.database.calls(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_url_skips_extraction() {
        let harness = Harness {
            probe: Arc::new(MockLivenessProbe::status(404)),
            ..Harness::happy()
        };
        let failure = harness
            .pipeline()
            .run(PipelineRequest::new("012345678905", "c"))
            .await
            .unwrap_err();

        assert_eq!(failure.stage, Stage::ValidateUrl);
        assert_eq!(
            failure.error,
            PipelineError::UpstreamUnreachable {
                reason: "product URL is not reachable (status: 404)".into(),
                status: Some(404)
            }
        );
        assert_eq!(failure.product_url.as_deref(), Some("https://acme.com/whey"));
        assert_eq!(harness.scraper.calls(), 0);
        assert_eq!(harness.scoring.calls(), 0);
    }

    #[tokio::test]
    async fn test_nothing_resolved_is_not_found() {
        let harness = Harness {
            database: Arc::new(MockBarcodeDatabase::new()),
            ..Harness::happy()
        };
        let failure = harness
            .pipeline()
            .run(PipelineRequest::new("012345678905", "c"))
            .await
            .unwrap_err();

        assert_eq!(failure.stage, Stage::Resolve);
        assert_eq!(failure.error.code(), "NOT_FOUND");
        assert_eq!(failure.upc.as_deref(), Some("0012345678905"));
        assert_eq!(harness.search.calls(), 1);
        assert_eq!(harness.probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_caller_url_skips_resolution() {
        let harness = Harness::happy();
        let report = harness
            .pipeline()
            .run(
                PipelineRequest::new("012345678905", "c")
                    .with_product_url("https://shop.example.com/whey"),
            )
            .await
            .unwrap();

        assert_eq!(report.source, SourceTag::Caller);
        assert_eq!(report.product_url, "https://shop.example.com/whey");
        assert_eq!(harness.database.calls(), 0);
        assert_eq!(harness.probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_caller_url_is_invalid_input() {
        let harness = Harness::happy();
        let failure = harness
            .pipeline()
            .run(PipelineRequest::new("012345678905", "c").with_product_url("shop/whey"))
            .await
            .unwrap_err();

        assert_eq!(failure.stage, Stage::ValidateUrl);
        assert_eq!(failure.error.code(), "INVALID_INPUT");
        assert_eq!(harness.probe.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_scraper_times_out() {
        let harness = Harness {
            scraper: Arc::new(
                MockScraper::html("<p>late</p>").with_delay(Duration::from_secs(20)),
            ),
            ..Harness::happy()
        };
        let failure = harness
            .pipeline()
            .run(PipelineRequest::new("012345678905", "c"))
            .await
            .unwrap_err();

        assert_eq!(failure.stage, Stage::Extract);
        assert_eq!(failure.error.code(), "UPSTREAM_TIMEOUT");
        assert_eq!(harness.scraper.completed(), 0);
        assert_eq!(harness.scoring.calls(), 0);
    }

    #[tokio::test]
    async fn test_scrape_envelope_failure_is_upstream_error() {
        let harness = Harness {
            scraper: Arc::new(MockScraper::returning(
                json!({ "success": false, "error": "blocked by robots.txt" }),
            )),
            ..Harness::happy()
        };
        let failure = harness
            .pipeline()
            .run(PipelineRequest::new("012345678905", "c"))
            .await
            .unwrap_err();

        assert_eq!(failure.stage, Stage::Extract);
        match failure.error {
            PipelineError::UpstreamError { service, status, body } => {
                assert_eq!(service, "scraper");
                assert_eq!(status, None);
                assert!(body.contains("blocked by robots.txt"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_failure_blocks_at_resolve() {
        let harness = Harness {
            database: Arc::new(MockBarcodeDatabase::new()),
            search: Arc::new(MockCompletionClient::failing(ClientError::Transport(
                "connection reset".into(),
            ))),
            ..Harness::happy()
        };
        let failure = harness
            .pipeline()
            .run(PipelineRequest::new("012345678905", "c"))
            .await
            .unwrap_err();

        assert_eq!(failure.stage, Stage::Resolve);
        assert_eq!(failure.error.code(), "UPSTREAM_ERROR");
    }

    #[tokio::test]
    async fn test_scoring_failure_degrades() {
        let harness = Harness {
            scoring: Arc::new(MockCompletionClient::failing(ClientError::Status {
                status: 429,
                body: "slow down".into(),
            })),
            ..Harness::happy()
        };
        let report = harness
            .pipeline()
            .run(PipelineRequest::new("012345678905", "c"))
            .await
            .unwrap();

        assert_eq!(report.score, ScoreResult::default());
        assert!(report.persisted);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::ValidateUrl.to_string(), "validate_url");
        assert_eq!(serde_json::to_string(&Stage::RateCheck).unwrap(), "\"rate_check\"");
    }
}
