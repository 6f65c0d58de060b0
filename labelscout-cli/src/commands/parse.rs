//! Offline parsers for saved AI replies.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use labelscout_core::parse::{parse_score_reply, parse_url_reply};
use tracing::debug;

use crate::input::{read_text, InputError};

/// Execute the parse-score command.
pub fn score(file: &Path, as_json: bool, quiet: bool) -> Result<()> {
    let text = read_text(file)?;
    debug!(bytes = text.len(), "Read scoring reply");

    let result = parse_score_reply(&text);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if quiet {
        println!("{}", result.score);
    } else {
        println!("{} {}/100", "Score:".dimmed(), result.score.to_string().bold());
        println!("{} {}", "Summary:".dimmed(), result.summary);
        for highlight in &result.highlights {
            println!("  - {highlight}");
        }
    }
    Ok(())
}

/// Execute the parse-url command.
pub fn url(file: &Path) -> Result<()> {
    let text = read_text(file)?;
    let url = parse_url_reply(&text).ok_or(InputError::NoUrl)?;
    println!("{url}");
    Ok(())
}
