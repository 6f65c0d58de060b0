//! Scoring synthesizer. Degrades to the default result instead of failing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::clients::{ChatMessage, CompletionClient, CompletionRequest};
use crate::error::ClientError;
use crate::parse::parse_score_reply;
use crate::types::{ExtractedContent, ResolvedIdentity, ScoreResult};

/// Build the scoring prompt. `content` is already truncated to budget.
pub fn scoring_prompt(name: Option<&str>, brand: Option<&str>, content: &str) -> String {
    format!(
        "Given the following product information and scraped content, score the product from 0-100 based on its quality, transparency, and value. Also, provide 2-3 short bullet point highlights summarizing the key aspects of the product.

Product Name: {}
Brand: {}
Scraped Content:
{content}

Output format:
SCORE: [0-100]
HIGHLIGHTS:
- Highlight 1
- Highlight 2
- Highlight 3 (optional)",
        name.unwrap_or("N/A"),
        brand.unwrap_or("N/A"),
    )
}

pub struct Scorer {
    client: Arc<dyn CompletionClient>,
    model: String,
    content_budget: usize,
    timeout: Duration,
}

impl Scorer {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        model: impl Into<String>,
        content_budget: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            content_budget,
            timeout,
        }
    }

    /// Score a product. Any transport, status, deadline or envelope defect
    /// yields [`ScoreResult::default`].
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    pub async fn score(
        &self,
        identity: &ResolvedIdentity,
        content: Option<&ExtractedContent>,
    ) -> ScoreResult {
        let start = Instant::now();
        let excerpt = content
            .map(|c| c.excerpt(self.content_budget))
            .unwrap_or_default();
        let prompt = scoring_prompt(identity.name.as_deref(), identity.brand.as_deref(), excerpt);

        let request = CompletionRequest::new(&self.model).with_message(ChatMessage::user(prompt));

        let reply = tokio::time::timeout(self.timeout, self.client.complete(request))
            .await
            .unwrap_or(Err(ClientError::Timeout(self.timeout)));
        let latency_ms = start.elapsed().as_millis() as u64;

        match reply {
            Ok(completion) => match completion.content {
                Some(text) => {
                    let result = parse_score_reply(&text);
                    info!(
                        score = result.score,
                        highlights = result.highlights.len(),
                        latency_ms,
                        "Product scored"
                    );
                    result
                }
                None => {
                    warn!(latency_ms, "Scoring reply had no content, using default score");
                    ScoreResult::default()
                }
            },
            Err(e) => {
                warn!(error = %e, latency_ms, "Scoring call failed, using default score");
                ScoreResult::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCompletionClient;
    use crate::types::{SourceTag, NO_SUMMARY};

    fn identity() -> ResolvedIdentity {
        ResolvedIdentity {
            name: Some("Acme Whey Protein".into()),
            brand: Some("Acme".into()),
            source: SourceTag::StructuredDatabase,
        }
    }

    fn content(body: &str) -> ExtractedContent {
        ExtractedContent {
            body: body.to_string(),
            format: "html".to_string(),
        }
    }

    #[tokio::test]
    async fn test_scores_and_parses_reply() {
        let ai = Arc::new(MockCompletionClient::replying(
            "SCORE: 87\nHIGHLIGHTS:\n- Clean label\n- Third-party tested",
        ));
        let scorer = Scorer::new(ai.clone(), "scoring-model", 4000, Duration::from_secs(5));

        let result = scorer.score(&identity(), Some(&content("<p>Whey</p>"))).await;

        assert_eq!(result.score, 87);
        assert_eq!(result.highlights, vec!["Clean label", "Third-party tested"]);

        let request = &ai.requests()[0];
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.temperature, None);
        let prompt = ai.last_prompt().unwrap();
        assert!(prompt.contains("Product Name: Acme Whey Protein\nBrand: Acme\n"));
        assert!(prompt.contains("Scraped Content:\n<p>Whey</p>\n"));
    }

    #[tokio::test]
    async fn test_content_is_truncated_to_budget() {
        let ai = Arc::new(MockCompletionClient::replying("SCORE: 1"));
        let scorer = Scorer::new(ai.clone(), "m", 10, Duration::from_secs(5));

        scorer
            .score(&identity(), Some(&content("0123456789ABCDEF")))
            .await;

        let prompt = ai.last_prompt().unwrap();
        assert!(prompt.contains("Scraped Content:\n0123456789\n"));
        assert!(!prompt.contains("ABCDEF"));
    }

    #[tokio::test]
    async fn test_failures_degrade_to_default() {
        let ai = Arc::new(MockCompletionClient::failing(ClientError::Status {
            status: 500,
            body: "boom".into(),
        }));
        let scorer = Scorer::new(ai, "m", 4000, Duration::from_secs(5));
        assert_eq!(scorer.score(&identity(), None).await, ScoreResult::default());

        let scorer = Scorer::new(Arc::new(MockCompletionClient::empty()), "m", 4000, Duration::from_secs(5));
        let result = scorer.score(&identity(), None).await;
        assert_eq!(result.score, 0);
        assert_eq!(result.summary, NO_SUMMARY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_degrades_to_default() {
        let ai = Arc::new(MockCompletionClient::replying("SCORE: 90").with_delay(Duration::from_secs(60)));
        let scorer = Scorer::new(ai, "m", 4000, Duration::from_secs(15));
        assert_eq!(scorer.score(&identity(), None).await, ScoreResult::default());
    }
}
