//! Score command implementation.
//!
//! Runs one pipeline against the live services with an in-memory store.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use labelscout_core::config::{
    DEFAULT_FIRECRAWL_BASE_URL, DEFAULT_OPENFOODFACTS_BASE_URL, DEFAULT_OPENROUTER_BASE_URL,
};
use labelscout_core::{
    live_collaborators, MemoryProductStore, Pipeline, PipelineConfig, PipelineReport,
    PipelineRequest, ServiceConfig,
};
use serde_json::json;
use tracing::info;

/// Rate-limit key for local runs.
const CLI_CLIENT_KEY: &str = "cli";

/// Upstream endpoints and credentials, from flags or the environment.
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// OpenRouter API key for search and scoring
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    /// Firecrawl API key for page extraction
    #[arg(long, env = "FIRECRAWL_API_KEY", hide_env_values = true)]
    pub firecrawl_api_key: Option<String>,

    #[arg(long, env = "OPENROUTER_BASE_URL", default_value = DEFAULT_OPENROUTER_BASE_URL)]
    pub openrouter_base_url: String,

    #[arg(long, env = "FIRECRAWL_BASE_URL", default_value = DEFAULT_FIRECRAWL_BASE_URL)]
    pub firecrawl_base_url: String,

    #[arg(long, env = "OPENFOODFACTS_BASE_URL", default_value = DEFAULT_OPENFOODFACTS_BASE_URL)]
    pub openfoodfacts_base_url: String,
}

impl ServiceArgs {
    pub fn into_config(self) -> ServiceConfig {
        let key = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        ServiceConfig {
            openrouter_api_key: key(self.openrouter_api_key),
            openrouter_base_url: self.openrouter_base_url,
            firecrawl_api_key: key(self.firecrawl_api_key),
            firecrawl_base_url: self.firecrawl_base_url,
            openfoodfacts_base_url: self.openfoodfacts_base_url,
        }
    }
}

/// Execute the score command.
pub async fn execute(
    upc: String,
    url: Option<String>,
    services: ServiceArgs,
    as_json: bool,
    quiet: bool,
) -> Result<()> {
    let services = services.into_config();
    let config = PipelineConfig::from_env();
    let collaborators =
        live_collaborators(&services, &config, Arc::new(MemoryProductStore::new()))
            .context("Failed to build upstream clients")?;
    let pipeline = Pipeline::new(&config, collaborators);

    let mut request = PipelineRequest::new(upc, CLI_CLIENT_KEY);
    request.product_url = url;

    if !quiet && !as_json {
        eprintln!("{}", "Scoring product...".dimmed());
    }

    let report = pipeline.run(request).await?;
    info!(upc = %report.upc, score = report.score.score, "Scored product");

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else if quiet {
        println!("{}", report.score.score);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn report_json(report: &PipelineReport) -> serde_json::Value {
    json!({
        "upc": report.upc,
        "source": report.source,
        "product_url": report.product_url,
        "name": report.name,
        "brand": report.brand,
        "score": report.score.score,
        "summary": report.score.summary,
        "highlights": report.score.highlights,
    })
}

fn print_report(report: &PipelineReport) {
    let label = match report.score.score {
        70..=100 => report.score.score.to_string().green().bold(),
        40..=69 => report.score.score.to_string().yellow().bold(),
        _ => report.score.score.to_string().red().bold(),
    };

    println!();
    println!("   {} {}/100", "Score:".dimmed(), label);
    if let Some(name) = &report.name {
        println!("   {} {}", "Product:".dimmed(), name);
    }
    if let Some(brand) = &report.brand {
        println!("   {} {}", "Brand:".dimmed(), brand);
    }
    println!("   {} {}", "EAN-13:".dimmed(), report.upc);
    println!("   {} {} ({})", "Page:".dimmed(), report.product_url, report.source);
    println!("   {} {}", "Summary:".dimmed(), report.score.summary);
    for highlight in &report.score.highlights {
        println!("     - {highlight}");
    }
    println!();
    println!("{}", "Scores are advisory only.".dimmed());
}
