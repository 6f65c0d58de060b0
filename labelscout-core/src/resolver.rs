//! Source ladder: structured barcode database first, AI web search second.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::barcode::CodeVariantSet;
use crate::clients::{BarcodeDatabase, ChatMessage, CompletionClient, CompletionRequest, ProductRecord};
use crate::error::{ClientError, PipelineError, Result};
use crate::parse::parse_url_reply;
use crate::types::{ResolvedIdentity, SourceTag};

pub const SEARCH_SYSTEM_PROMPT: &str =
    "You are an expert web research assistant that returns only the requested URL.";

const SEARCH_SERVICE: &str = "ai-search";

/// Outcome of the RESOLVE stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub identity: ResolvedIdentity,
    /// Unvalidated product page URL, `None` when every rung came up empty.
    pub candidate_url: Option<String>,
}

/// A name is usable for search when it is longer than 4 characters and
/// not a placeholder.
pub fn is_valid_name(name: &str) -> bool {
    name.chars().count() > 4 && !name.to_lowercase().contains("unknown")
}

pub fn is_valid_brand(brand: &str) -> bool {
    brand.chars().count() > 2 && !brand.to_lowercase().contains("unknown")
}

/// Build the user prompt for the AI search fallback.
///
/// The context block is chosen from what the database gave us: usable
/// name/brand lines, else the raw record, else the barcode alone.
pub fn search_prompt(
    upc: &str,
    name: Option<&str>,
    brand: Option<&str>,
    record: Option<&ProductRecord>,
) -> String {
    let usable =
        name.is_some_and(is_valid_name) || brand.is_some_and(is_valid_brand);

    let context = if usable {
        format!(
            "Product Name: {}\nBrand: {}\nUPC: {upc}",
            name.unwrap_or("N/A"),
            brand.unwrap_or("N/A"),
        )
    } else if let Some(record) = record {
        format!(
            "UPC: {upc}\n\nOpenFoodFacts raw product JSON:\n<OFF_JSON>\n{}\n</OFF_JSON>",
            record.to_pretty_json()
        )
    } else {
        format!("UPC: {upc}")
    };

    format!(
        "You are a supplement research assistant. Your task is to find the official product page URL for a supplement.

{context}

Instructions:
1. Search for the product page on the brand's official website.
2. If multiple links exist, choose the most relevant one for the product.
3. If a valid URL appears in the citations or search results, return it.
4. Only return \"<url>NOT_FOUND</url>\" if there is absolutely no product page found on the brand's website.
5. Output only one result in this format:
<url>https://brand.com/product</url>

Do not include any other text or explanation."
    )
}

/// Resolves a barcode to a candidate product page and a best-effort identity.
pub struct SourceLadder {
    database: Arc<dyn BarcodeDatabase>,
    search: Arc<dyn CompletionClient>,
    search_model: String,
    call_timeout: Duration,
}

impl SourceLadder {
    pub fn new(
        database: Arc<dyn BarcodeDatabase>,
        search: Arc<dyn CompletionClient>,
        search_model: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            database,
            search,
            search_model: search_model.into(),
            call_timeout,
        }
    }

    /// Walk the ladder for `variants`.
    ///
    /// Lookup failures on individual variants are treated as misses. Only
    /// the AI search can fail the stage.
    #[instrument(level = "info", skip_all, fields(upc = %variants.raw()))]
    pub async fn resolve(&self, variants: &CodeVariantSet) -> Result<Resolution> {
        let mut retained: Option<ProductRecord> = None;

        for code in variants.iter() {
            let Some(record) = self.lookup(code).await else {
                continue;
            };

            if let Some(url) = record.direct_url() {
                info!(variant = %code, url, "Structured database supplied product URL");
                return Ok(Resolution {
                    identity: ResolvedIdentity {
                        name: record.name(),
                        brand: record.brand(),
                        source: SourceTag::StructuredDatabase,
                    },
                    candidate_url: Some(url.to_string()),
                });
            }

            debug!(variant = %code, "Record has no direct URL");
            if retained.is_none() {
                retained = Some(record);
            }
        }

        let name = retained.as_ref().and_then(ProductRecord::name);
        let brand = retained.as_ref().and_then(ProductRecord::brand);
        debug!(name = ?name, brand = ?brand, "Identity before AI search");

        let prompt = search_prompt(
            variants.raw(),
            name.as_deref(),
            brand.as_deref(),
            retained.as_ref(),
        );
        let candidate_url = self.search(prompt).await?;

        let source = if candidate_url.is_some() {
            SourceTag::AiSearch
        } else {
            SourceTag::None
        };

        Ok(Resolution {
            identity: ResolvedIdentity {
                name,
                brand,
                source,
            },
            candidate_url,
        })
    }

    async fn lookup(&self, code: &str) -> Option<ProductRecord> {
        let start = Instant::now();
        let result = tokio::time::timeout(self.call_timeout, self.database.lookup(code))
            .await
            .unwrap_or(Err(ClientError::Timeout(self.call_timeout)));

        match result {
            Ok(record) => {
                debug!(
                    variant = code,
                    found = record.is_some(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Variant lookup finished"
                );
                record
            }
            Err(e) => {
                warn!(variant = code, error = %e, "Variant lookup failed, continuing");
                None
            }
        }
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.search_model))]
    async fn search(&self, prompt: String) -> Result<Option<String>> {
        let request = CompletionRequest::new(&self.search_model)
            .with_message(ChatMessage::system(SEARCH_SYSTEM_PROMPT))
            .with_message(ChatMessage::user(prompt))
            .with_temperature(0.0);

        let completion = tokio::time::timeout(self.call_timeout, self.search.complete(request))
            .await
            .unwrap_or(Err(ClientError::Timeout(self.call_timeout)))
            .map_err(|e| {
                warn!(error = %e, "AI search failed");
                PipelineError::upstream(SEARCH_SERVICE, e)
            })?;

        let url = completion.content.as_deref().and_then(parse_url_reply);
        match &url {
            Some(url) => info!(url, "AI search supplied product URL"),
            None => warn!(reply = ?completion.content, "AI search returned no usable URL"),
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::barcode::variants;
    use crate::mock::{MockBarcodeDatabase, MockCompletionClient};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn ladder(
        db: &Arc<MockBarcodeDatabase>,
        ai: &Arc<MockCompletionClient>,
    ) -> SourceLadder {
        SourceLadder::new(db.clone(), ai.clone(), "search-model", TIMEOUT)
    }

    #[test]
    fn test_validity_gate() {
        assert!(is_valid_name("Whey Protein"));
        assert!(!is_valid_name("Whey"));
        assert!(!is_valid_name("Unknown product"));
        assert!(is_valid_brand("Acme"));
        assert!(!is_valid_brand("AC"));
        assert!(!is_valid_brand("UNKNOWN"));
    }

    #[test]
    fn test_prompt_with_name_and_brand() {
        let prompt = search_prompt("012345678905", Some("Acme Whey Protein"), Some("Acme"), None);
        assert!(prompt.contains("Product Name: Acme Whey Protein\nBrand: Acme\nUPC: 012345678905"));
        assert!(prompt.contains("<url>NOT_FOUND</url>"));
    }

    #[test]
    fn test_prompt_marks_missing_field() {
        let prompt = search_prompt("1", None, Some("Acme"), None);
        assert!(prompt.contains("Product Name: N/A\nBrand: Acme"));
    }

    #[test]
    fn test_prompt_embeds_raw_record_when_fields_weak() {
        let record = ProductRecord::new(json!({ "product_name": "Bar", "code": "42" }));
        let prompt = search_prompt("42", Some("Bar"), None, Some(&record));
        assert!(prompt.contains("<OFF_JSON>\n{"));
        assert!(prompt.contains("\"code\": \"42\""));
        assert!(prompt.contains("</OFF_JSON>"));
        assert!(!prompt.contains("Product Name:"));
    }

    #[test]
    fn test_prompt_barcode_only() {
        let prompt = search_prompt("42", None, None, None);
        assert!(prompt.contains("\n\nUPC: 42\n\nInstructions:"));
    }

    #[tokio::test]
    async fn test_direct_url_skips_ai_search() {
        let db = Arc::new(MockBarcodeDatabase::new().with_record(
            "0012345678905",
            json!({ "url": "https://acme.com/whey", "product_name": "Acme Whey Protein", "brands": "Acme" }),
        ));
        let ai = Arc::new(MockCompletionClient::replying("<url>https://wrong.com</url>"));

        let resolution = ladder(&db, &ai)
            .resolve(&variants("012345678905").unwrap())
            .await
            .unwrap();

        assert_eq!(resolution.candidate_url.as_deref(), Some("https://acme.com/whey"));
        assert_eq!(resolution.identity.source, SourceTag::StructuredDatabase);
        assert_eq!(resolution.identity.brand.as_deref(), Some("Acme"));
        assert_eq!(ai.calls(), 0);
        // raw variant missed, EAN-13 hit; UPC-12 never tried
        assert_eq!(db.looked_up(), vec!["012345678905", "0012345678905"]);
    }

    #[tokio::test]
    async fn test_name_and_brand_feed_ai_search() {
        let db = Arc::new(MockBarcodeDatabase::new().with_record(
            "012345678905",
            json!({ "product_name": "Acme Whey Protein", "brands": "Acme, Inc.; secondary" }),
        ));
        let ai = Arc::new(MockCompletionClient::replying(
            "Here you go: <url>https://acme.com/p/whey</url>",
        ));

        let resolution = ladder(&db, &ai)
            .resolve(&variants("012345678905").unwrap())
            .await
            .unwrap();

        assert_eq!(resolution.candidate_url.as_deref(), Some("https://acme.com/p/whey"));
        assert_eq!(resolution.identity.source, SourceTag::AiSearch);
        assert_eq!(resolution.identity.brand.as_deref(), Some("Acme"));

        let request = &ai.requests()[0];
        assert_eq!(request.model, "search-model");
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.messages[0].content, SEARCH_SYSTEM_PROMPT);
        let prompt = ai.last_prompt().unwrap();
        assert!(prompt.contains("Acme Whey Protein"));
        assert!(prompt.contains("Brand: Acme\n"));
    }

    #[tokio::test]
    async fn test_first_found_record_is_retained() {
        let db = Arc::new(
            MockBarcodeDatabase::new()
                .with_record("012345678905", json!({ "product_name": "First Product" }))
                .with_record("0012345678905", json!({ "product_name": "Second Product" })),
        );
        let ai = Arc::new(MockCompletionClient::replying("<url>NOT_FOUND</url>"));

        let resolution = ladder(&db, &ai)
            .resolve(&variants("012345678905").unwrap())
            .await
            .unwrap();

        assert_eq!(resolution.identity.name.as_deref(), Some("First Product"));
        assert_eq!(resolution.candidate_url, None);
        assert_eq!(resolution.identity.source, SourceTag::None);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_a_miss() {
        let db = Arc::new(
            MockBarcodeDatabase::new()
                .with_failure("012345678905", ClientError::Transport("reset".into()))
                .with_record("0012345678905", json!({ "url": "https://acme.com/x" })),
        );
        let ai = Arc::new(MockCompletionClient::empty());

        let resolution = ladder(&db, &ai)
            .resolve(&variants("012345678905").unwrap())
            .await
            .unwrap();
        assert_eq!(resolution.candidate_url.as_deref(), Some("https://acme.com/x"));
    }

    #[tokio::test]
    async fn test_ai_search_failure_blocks() {
        let db = Arc::new(MockBarcodeDatabase::new());
        let ai = Arc::new(MockCompletionClient::failing(ClientError::Status {
            status: 401,
            body: "bad key".into(),
        }));

        let err = ladder(&db, &ai)
            .resolve(&variants("42").unwrap())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::UpstreamError {
                service: "ai-search",
                status: Some(401),
                body: "bad key".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ai_search_deadline() {
        let db = Arc::new(MockBarcodeDatabase::new());
        let ai = Arc::new(
            MockCompletionClient::replying("<url>https://late.com</url>")
                .with_delay(Duration::from_secs(60)),
        );

        let err = ladder(&db, &ai)
            .resolve(&variants("42").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamTimeout(_)));
    }
}
