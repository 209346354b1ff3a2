//! # Magazine Archiver
//!
//! Archives the articles of a magazine issue on archive.today and sends the
//! durable snapshot links to Readwise Reader.
//!
//! ## Features
//!
//! - Discovers issues of The Atlantic and The Economist from their archive
//!   pages, with layered fallbacks for when the page layout shifts
//! - Extracts article links from an issue page
//! - Resolves each article to an archive.today snapshot with bounded,
//!   rate-limit-aware retries
//! - Saves snapshots to Readwise Reader, tagged per source
//!
//! ## Usage
//!
//! ```sh
//! magazine_archiver --source atlantic --issue "April 2025"
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Catalog**: find the issues listed on each enabled source
//! 2. **Selection**: pick one issue, by label or interactively
//! 3. **Extraction**: collect the issue's article URLs
//! 4. **Archiving**: turn each article URL into a durable snapshot URL
//! 5. **Read-later**: submit the snapshots to Readwise Reader

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod archive;
mod cli;
mod config;
mod errors;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod readwise;
mod retry;
mod scrapers;
mod select;
mod utils;

use cli::Cli;
use config::{Settings, set_readwise_token};
use fetch::HttpFetcher;
use pipeline::RunOptions;
use readwise::ReadwiseClient;
use select::ConsoleChooser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(config = %args.config.display(), source = ?args.source, issue = ?args.issue, "Parsed CLI arguments");

    println!("\n=============================================");
    println!("     News Magazine Archiver");
    println!("=============================================\n");

    if let Some(token) = &args.token {
        set_readwise_token(&args.config, token)?;
        println!("Readwise token set in {}", args.config.display());
        return Ok(());
    }

    let settings = Settings::load(&args.config)?;
    let timeout = Duration::from_secs(settings.archive.request_timeout_secs);
    let fetcher = HttpFetcher::new(timeout)?;
    let sink = settings
        .readwise_token
        .as_deref()
        .filter(|token| !token.trim().is_empty())
        .map(|token| ReadwiseClient::new(token, timeout))
        .transpose()?;

    let options = RunOptions {
        source: args.source,
        issue: args.issue.clone(),
        list_issues_only: args.list_issues,
    };
    let results = pipeline::run(&settings, &fetcher, &ConsoleChooser, sink.as_ref(), &options).await?;

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");

    if args.list_issues {
        return Ok(());
    }

    if results.is_empty() {
        println!("\nNo articles were archived.");
        return Ok(());
    }

    println!("\nSummary:");
    for (source, durable) in &results {
        println!("{source}: {} articles archived", durable.len());
    }
    println!("\nProcess completed successfully!");
    if sink.is_some() {
        println!("The archived articles will be available in your Readwise Reader account.");
        println!("You can view them at: https://readwise.io/reader");
    }
    Ok(())
}
