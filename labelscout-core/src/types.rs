//! Values passed between pipeline stages.

use serde::{Deserialize, Serialize};

/// Summary used when the scoring reply carried no highlights.
pub const NO_SUMMARY: &str = "No summary available.";

/// Where the product page URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTag {
    /// Direct URL on a structured barcode database record.
    StructuredDatabase,
    /// URL found by the AI web-search fallback.
    AiSearch,
    /// URL supplied by the caller; resolution was skipped.
    Caller,
    /// Nothing resolved.
    None,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructuredDatabase => "structured-database",
            Self::AiSearch => "ai-search",
            Self::Caller => "caller",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structured-database" => Ok(Self::StructuredDatabase),
            "ai-search" => Ok(Self::AiSearch),
            "caller" => Ok(Self::Caller),
            "none" => Ok(Self::None),
            other => Err(format!("unknown source tag: {other}")),
        }
    }
}

/// Best-effort product identity, produced once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub source: SourceTag,
}

impl ResolvedIdentity {
    pub fn unresolved() -> Self {
        Self {
            name: None,
            brand: None,
            source: SourceTag::None,
        }
    }
}

/// Page payload returned by the scraping stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub body: String,
    /// Which payload field the body came from (`html`, `markdown`, ...).
    pub format: String,
}

impl ExtractedContent {
    /// The first `budget` characters of the body.
    pub fn excerpt(&self, budget: usize) -> &str {
        match self.body.char_indices().nth(budget) {
            Some((cut, _)) => &self.body[..cut],
            None => &self.body,
        }
    }
}

/// Advisory quality score with its highlights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// 0..=100, 0 when the reply carried no parsable score.
    pub score: u8,
    pub summary: String,
    pub highlights: Vec<String>,
}

impl Default for ScoreResult {
    fn default() -> Self {
        Self {
            score: 0,
            summary: NO_SUMMARY.to_string(),
            highlights: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let content = ExtractedContent {
            body: "ééééé".to_string(),
            format: "html".to_string(),
        };
        assert_eq!(content.excerpt(2), "éé");
        assert_eq!(content.excerpt(50), "ééééé");
    }

    #[test]
    fn test_source_tag_round_trips_through_str() {
        for tag in [
            SourceTag::StructuredDatabase,
            SourceTag::AiSearch,
            SourceTag::Caller,
            SourceTag::None,
        ] {
            assert_eq!(tag.as_str().parse::<SourceTag>(), Ok(tag));
        }
        assert_eq!(
            serde_json::to_string(&SourceTag::StructuredDatabase).unwrap(),
            "\"structured-database\""
        );
    }

    #[test]
    fn test_default_score_result() {
        let result = ScoreResult::default();
        assert_eq!(result.score, 0);
        assert_eq!(result.summary, NO_SUMMARY);
        assert!(result.highlights.is_empty());
    }
}
