//! Parsers for the semi-structured replies of the AI stages.
//!
//! Replies are untrusted free text. Each parser looks for one labeled or
//! delimited payload and ignores everything around it; none of them fail,
//! they return `None` / empty instead.

use crate::types::{ScoreResult, NO_SUMMARY};

pub const URL_OPEN: &str = "<url>";
pub const URL_CLOSE: &str = "</url>";
/// Sentinel the search model is told to emit when no page exists.
pub const NOT_FOUND_SENTINEL: &str = "NOT_FOUND";

pub const SCORE_LABEL: &str = "SCORE:";
pub const HIGHLIGHTS_LABEL: &str = "HIGHLIGHTS:";
pub const BULLET_PREFIX: &str = "- ";

/// At most this many highlights are kept.
pub const MAX_HIGHLIGHTS: usize = 3;

/// Extract the URL between `<url>` and `</url>`.
///
/// Tags match case-insensitively. The first delimited value that is an
/// `http(s)` URL without whitespace wins; the sentinel and anything else
/// yield `None`.
pub fn parse_url_reply(text: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    let mut cursor = 0;

    while let Some(open) = lower[cursor..].find(URL_OPEN) {
        let start = cursor + open + URL_OPEN.len();
        let close = start + lower[start..].find(URL_CLOSE)?;
        // A nested or stray open tag may still precede a valid payload.
        cursor = start;

        let inner = text[start..close].trim();
        if is_acceptable_url(inner) {
            return Some(inner.to_string());
        }
    }

    None
}

fn is_acceptable_url(candidate: &str) -> bool {
    if candidate.is_empty() || candidate.eq_ignore_ascii_case(NOT_FOUND_SENTINEL) {
        return false;
    }
    if candidate.chars().any(|c| c.is_whitespace() || c == '<') {
        return false;
    }
    let lower = candidate.to_ascii_lowercase();
    (lower.starts_with("http://") && lower.len() > "http://".len())
        || (lower.starts_with("https://") && lower.len() > "https://".len())
}

/// First `SCORE:` label followed by digits, clamped to 100.
pub fn parse_score(text: &str) -> Option<u8> {
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(SCORE_LABEL) {
        let after = cursor + found + SCORE_LABEL.len();
        cursor = after;

        let rest = text[after..].trim_start();
        let digits: &str = {
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            &rest[..end]
        };
        if digits.is_empty() {
            continue;
        }

        // Anything too long for u64 is certainly above the ceiling.
        let value = digits.parse::<u64>().unwrap_or(u64::MAX).min(100);
        return Some(value as u8);
    }

    None
}

/// Bullet lines directly under a `HIGHLIGHTS:` label.
///
/// The label must end its line. The block is the run of consecutive lines
/// starting with `- ` (indentation allowed) and stops at the first line that
/// is not a bullet. Empty bullets are dropped.
pub fn parse_highlights(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let mut index = 0;
    while index < lines.len() {
        let line = lines[index];
        index += 1;
        if !line.trim_end().ends_with(HIGHLIGHTS_LABEL) {
            continue;
        }

        let bullets: Vec<&str> = lines[index..]
            .iter()
            .map(|line| line.trim_start())
            .take_while(|line| line.starts_with(BULLET_PREFIX))
            .collect();
        if bullets.is_empty() {
            continue;
        }

        return bullets
            .into_iter()
            .map(|line| line[BULLET_PREFIX.len()..].trim())
            .filter(|item| !item.is_empty())
            .take(MAX_HIGHLIGHTS)
            .map(str::to_string)
            .collect();
    }

    Vec::new()
}

/// Parse a complete scoring reply. Missing parts fall back to defaults.
pub fn parse_score_reply(text: &str) -> ScoreResult {
    let score = parse_score(text).unwrap_or(0);
    let highlights = parse_highlights(text);
    let summary = if highlights.is_empty() {
        NO_SUMMARY.to_string()
    } else {
        highlights.join("\n")
    };

    ScoreResult {
        score,
        summary,
        highlights,
    }
}
