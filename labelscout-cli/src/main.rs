//! LabelScout CLI - barcode normalization, reply parsing and one-shot scoring.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod input;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  64  Invalid barcode, URL or arguments
  66  No product page or URL found
  69  Upstream service unreachable or failing
  70  Internal error
  75  Rate limited or timed out (retry later)
  78  Missing credentials";

#[derive(Parser)]
#[command(name = "labelscout")]
#[command(author, version, about = "Barcode to product quality score", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Suppress decorated output (results only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log pipeline progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the UPC/EAN lookup variants of a barcode
    Variants {
        /// Barcode; separators are ignored
        #[arg(value_name = "UPC")]
        upc: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Parse a saved scoring reply (SCORE:/HIGHLIGHTS: format)
    ParseScore {
        /// File holding the reply, or - for stdin
        #[arg(value_name = "FILE", default_value = "-")]
        file: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Extract the <url>...</url> payload from a saved search reply
    ParseUrl {
        /// File holding the reply, or - for stdin
        #[arg(value_name = "FILE", default_value = "-")]
        file: PathBuf,
    },

    /// Score a product against the live services
    Score {
        /// Barcode to score
        #[arg(value_name = "UPC")]
        upc: String,

        /// Known product page; skips resolution
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        services: commands::score::ServiceArgs,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "labelscout_core=debug,labelscout=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Variants { upc, json } => commands::variants::execute(&upc, json),
        Commands::ParseScore { file, json } => commands::parse::score(&file, json, quiet),
        Commands::ParseUrl { file } => commands::parse::url(&file),
        Commands::Score {
            upc,
            url,
            json,
            services,
        } => commands::score::execute(upc, url, services, json, quiet).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let quiet = cli.quiet;
    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        if quiet {
            eprintln!("{message}");
        } else {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
    }
    std::process::exit(exit.code);
}
