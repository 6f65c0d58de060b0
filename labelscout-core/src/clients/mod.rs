//! External collaborators of the pipeline.
//!
//! Every service the pipeline talks to sits behind a trait so stages can be
//! exercised against mocks:
//!
//! - [`BarcodeDatabase`] - structured product lookup by numeric code
//! - [`CompletionClient`] - chat-completions style AI service (search and scoring)
//! - [`Scraper`] - page scraping service
//! - [`LivenessProbe`] - lightweight reachability check for a URL
//!
//! With the `network` feature, HTTP implementations are provided for
//! Open Food Facts, OpenAI-compatible chat completions and Firecrawl.

#[cfg(feature = "network")]
mod chat;
#[cfg(feature = "network")]
mod firecrawl;
#[cfg(feature = "network")]
mod http_client;
#[cfg(feature = "network")]
mod openfoodfacts;
#[cfg(feature = "network")]
mod probe;

#[cfg(feature = "network")]
pub use chat::ChatCompletionsClient;
#[cfg(feature = "network")]
pub use firecrawl::FirecrawlClient;
#[cfg(feature = "network")]
pub use http_client::build_http_client;
#[cfg(feature = "network")]
pub use openfoodfacts::OpenFoodFactsClient;
#[cfg(feature = "network")]
pub use probe::HttpLivenessProbe;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::error::ClientError;

/// Name field aliases, most preferred first.
pub const NAME_FIELDS: &[&str] = &[
    "product_name",
    "product_name_en",
    "product_name_original",
    "generic_name",
];

/// A product record from the structured barcode database.
///
/// The raw JSON is kept intact: when its name and brand are unusable the
/// whole record is handed to the search model instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    raw: serde_json::Value,
}

impl ProductRecord {
    pub fn new(raw: serde_json::Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    /// Direct product page URL, if the record carries one.
    pub fn direct_url(&self) -> Option<&str> {
        self.str_field("url")
    }

    /// First non-empty name alias.
    pub fn name(&self) -> Option<String> {
        NAME_FIELDS
            .iter()
            .find_map(|field| self.str_field(field))
            .map(str::to_string)
    }

    /// First segment of the brand list, split on `,` or `;`.
    pub fn brand(&self) -> Option<String> {
        self.str_field("brands")?
            .split([',', ';'])
            .next()
            .map(str::trim)
            .filter(|brand| !brand.is_empty())
            .map(str::to_string)
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.raw).unwrap_or_else(|_| self.raw.to_string())
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.raw
            .get(field)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Structured barcode database.
#[async_trait]
pub trait BarcodeDatabase: Send + Sync {
    /// Look up one code. `Ok(None)` when the database has no record for it.
    async fn lookup(&self, code: &str) -> Result<Option<ProductRecord>, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request for one chat completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// `None` keeps the service's default sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Content of the last user message.
    pub fn user_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Text of the first choice, `None` when the envelope had no usable content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completion {
    pub content: Option<String>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        let trimmed = content.trim();
        Self {
            content: (!trimmed.is_empty()).then(|| trimmed.to_string()),
        }
    }
}

/// Chat-completions style AI service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ClientError>;
}

/// Scrape request: target page plus preferred output formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeRequest {
    pub url: String,
    pub formats: Vec<String>,
}

impl ScrapeRequest {
    pub fn html(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            formats: vec!["html".to_string()],
        }
    }
}

/// Successful (2xx) response envelope of the scraping service.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeEnvelope {
    raw: serde_json::Value,
}

impl ScrapeEnvelope {
    pub fn new(raw: serde_json::Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    /// `false` only when the service explicitly reported failure.
    pub fn succeeded(&self) -> bool {
        self.raw
            .get("success")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true)
    }

    /// The `data` object, absent when missing or null.
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.raw.get("data").filter(|data| !data.is_null())
    }
}

/// Page scraping service. Dropping the returned future cancels the request.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeEnvelope, ClientError>;
}

/// Reachability check. Returns the HTTP status the URL answered with.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self, url: &Url) -> Result<u16, ClientError>;
}

/// Wire the HTTP clients for live runs.
///
/// Fails with [`ClientError::Configuration`] naming every missing key.
#[cfg(feature = "network")]
pub fn live_collaborators(
    services: &crate::config::ServiceConfig,
    pipeline: &crate::config::PipelineConfig,
    store: std::sync::Arc<dyn crate::store::ProductStore>,
) -> Result<crate::pipeline::Collaborators, ClientError> {
    use std::sync::Arc;

    services.require_credentials()?;

    let chat = Arc::new(ChatCompletionsClient::new(
        &services.openrouter_base_url,
        services.openrouter_api_key.clone(),
        pipeline.call_timeout,
    )?);

    Ok(crate::pipeline::Collaborators {
        database: Arc::new(OpenFoodFactsClient::with_config(
            &services.openfoodfacts_base_url,
            pipeline.call_timeout,
        )?),
        search: chat.clone(),
        scoring: chat,
        scraper: Arc::new(FirecrawlClient::new(
            &services.firecrawl_base_url,
            services.firecrawl_api_key.clone(),
            pipeline.extract_timeout,
        )?),
        probe: Arc::new(HttpLivenessProbe::new(pipeline.call_timeout)?),
        store,
    })
}
