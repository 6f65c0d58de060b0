//! Pipeline and upstream service configuration.
//!
//! Both structs load from environment variables with defaults. Missing
//! credentials fail when live clients are wired, before any request runs.

use std::time::Duration;

use crate::error::ClientError;
use crate::rate_limit::{DEFAULT_CAPACITY, DEFAULT_WINDOW};

/// Default deadline for the scrape call.
pub const DEFAULT_EXTRACT_TIMEOUT: Duration = Duration::from_secs(9);

/// Default deadline for every other outbound call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Characters of page content embedded in the scoring prompt.
pub const DEFAULT_CONTENT_BUDGET: usize = 4000;

pub const DEFAULT_SEARCH_MODEL: &str = "perplexity/sonar";
pub const DEFAULT_SCORING_MODEL: &str = "meta-llama/llama-3-8b-instruct";

pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_FIRECRAWL_BASE_URL: &str = "https://api.firecrawl.dev";
pub const DEFAULT_OPENFOODFACTS_BASE_URL: &str = "https://world.openfoodfacts.org";

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Rate limit window length (default: 60s)
    pub rate_limit_window: Duration,
    /// Requests admitted per window and client (default: 5)
    pub rate_limit_max_requests: u32,
    /// Hard deadline for content extraction (default: 9s)
    pub extract_timeout: Duration,
    /// Deadline for lookups, AI calls, liveness probes and persistence (default: 15s)
    pub call_timeout: Duration,
    /// Characters of extracted content sent to the scoring model (default: 4000)
    pub content_budget: usize,
    /// Model used for the URL search fallback
    pub search_model: String,
    /// Model used for scoring
    pub scoring_model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rate_limit_window: DEFAULT_WINDOW,
            rate_limit_max_requests: DEFAULT_CAPACITY,
            extract_timeout: DEFAULT_EXTRACT_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            content_budget: DEFAULT_CONTENT_BUDGET,
            search_model: DEFAULT_SEARCH_MODEL.to_string(),
            scoring_model: DEFAULT_SCORING_MODEL.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let rate_limit_window = env_parse("RATE_LIMIT_WINDOW_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.rate_limit_window);

        let rate_limit_max_requests =
            env_parse("RATE_LIMIT_MAX_REQUESTS").unwrap_or(defaults.rate_limit_max_requests);

        let extract_timeout = env_parse("EXTRACT_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.extract_timeout);

        let call_timeout = env_parse("CALL_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.call_timeout);

        let content_budget =
            env_parse("SCORING_CONTENT_BUDGET").unwrap_or(defaults.content_budget);

        let search_model = env_string("SEARCH_MODEL").unwrap_or(defaults.search_model);
        let scoring_model = env_string("SCORING_MODEL").unwrap_or(defaults.scoring_model);

        Self {
            rate_limit_window,
            rate_limit_max_requests,
            extract_timeout,
            call_timeout,
            content_budget,
            search_model,
            scoring_model,
        }
    }

    /// Worst-case wall time of one run, used to size outer request timeouts.
    pub fn worst_case_duration(&self, variant_count: u32) -> Duration {
        // lookups + search + probe + scoring + persistence, plus extraction
        self.call_timeout * (variant_count + 4) + self.extract_timeout
    }
}

/// Endpoints and credentials of the upstream services.
#[derive(Clone)]
pub struct ServiceConfig {
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
    pub firecrawl_api_key: Option<String>,
    pub firecrawl_base_url: String,
    pub openfoodfacts_base_url: String,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field(
                "openrouter_api_key",
                &self.openrouter_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("openrouter_base_url", &self.openrouter_base_url)
            .field(
                "firecrawl_api_key",
                &self.firecrawl_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("firecrawl_base_url", &self.firecrawl_base_url)
            .field("openfoodfacts_base_url", &self.openfoodfacts_base_url)
            .finish()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            openrouter_base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            firecrawl_api_key: None,
            firecrawl_base_url: DEFAULT_FIRECRAWL_BASE_URL.to_string(),
            openfoodfacts_base_url: DEFAULT_OPENFOODFACTS_BASE_URL.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load endpoints and credentials from environment variables.
    ///
    /// Keys: `OPENROUTER_API_KEY`, `FIRECRAWL_API_KEY`.
    /// Optional: `OPENROUTER_BASE_URL`, `FIRECRAWL_BASE_URL`, `OPENFOODFACTS_BASE_URL`.
    pub fn from_env() -> Self {
        Self {
            openrouter_api_key: env_string("OPENROUTER_API_KEY"),
            openrouter_base_url: env_string("OPENROUTER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string()),
            firecrawl_api_key: env_string("FIRECRAWL_API_KEY"),
            firecrawl_base_url: env_string("FIRECRAWL_BASE_URL")
                .unwrap_or_else(|| DEFAULT_FIRECRAWL_BASE_URL.to_string()),
            openfoodfacts_base_url: env_string("OPENFOODFACTS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENFOODFACTS_BASE_URL.to_string()),
        }
    }

    /// Names of required credentials that are not set.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.openrouter_api_key.is_none() {
            missing.push("OPENROUTER_API_KEY");
        }
        if self.firecrawl_api_key.is_none() {
            missing.push("FIRECRAWL_API_KEY");
        }
        missing
    }

    /// Fail with [`ClientError::Configuration`] naming every missing key.
    pub fn require_credentials(&self) -> Result<(), ClientError> {
        let missing = self.missing_credentials();
        if missing.is_empty() {
            return Ok(());
        }
        Err(ClientError::Configuration(format!(
            "missing {}",
            missing.join(", ")
        )))
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
