//! Variants command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use labelscout_core::barcode;
use serde_json::json;

/// Execute the variants command.
pub fn execute(upc: &str, as_json: bool) -> Result<()> {
    let codes = barcode::variants(upc).context("Invalid barcode")?;

    if as_json {
        let out = json!({
            "raw": codes.raw(),
            "ean13": codes.ean13(),
            "variants": codes.as_slice(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} {}", "EAN-13:".dimmed(), codes.ean13().bold());
    for (index, code) in codes.iter().enumerate() {
        println!("  {}. {}", index + 1, code);
    }
    Ok(())
}
