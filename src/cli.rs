//! Command-line interface definitions for the magazine archiver.

use crate::scrapers::Source;
use clap::Parser;
use std::path::PathBuf;

/// Archive magazine articles on archive.today and send them to Readwise
/// Reader.
///
/// # Examples
///
/// ```sh
/// # Archive an issue of every enabled source, choosing interactively
/// magazine_archiver
///
/// # List the Economist's editions without archiving anything
/// magazine_archiver --source economist --list-issues
///
/// # Archive a known issue without prompting
/// magazine_archiver --source atlantic --issue "April 2025"
///
/// # Store the Readwise token and exit
/// magazine_archiver --token YOUR_TOKEN
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Store this Readwise access token in the configuration file and exit
    #[arg(long)]
    pub token: Option<String>,

    /// List available issues and exit
    #[arg(long)]
    pub list_issues: bool,

    /// Issue to archive, by its exact label (e.g. "April 2025")
    #[arg(long)]
    pub issue: Option<String>,

    /// Only use this source
    #[arg(long, value_enum)]
    pub source: Option<Source>,
}
