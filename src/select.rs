//! Issue selection.
//!
//! [`select_issue`] turns a catalog plus an optional preselected label into
//! one issue URL. When no exact label is given the choice is delegated to an
//! [`IssueChooser`]; [`ConsoleChooser`] asks on the terminal, tests and
//! batch callers supply their own.

use crate::errors::ArchiverError;
use crate::models::IssueCatalog;
use dialoguer::Input;
use tracing::{error, info, warn};

const PROMPT: &str = "Enter the number of the issue to archive (or 'q' to quit)";

/// Outcome of asking for an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Zero-based index into the labels that were offered.
    Index(usize),
    Cancelled,
}

/// Picks one label out of a list of candidates.
pub trait IssueChooser {
    /// `labels` are presented in the order given and are never empty.
    fn choose(&self, labels: &[String]) -> Result<Choice, ArchiverError>;
}

/// Interactive chooser reading a 1-based number from the terminal.
#[derive(Debug, Default)]
pub struct ConsoleChooser;

impl IssueChooser for ConsoleChooser {
    fn choose(&self, labels: &[String]) -> Result<Choice, ArchiverError> {
        println!("\nAvailable issues:");
        for (i, label) in labels.iter().enumerate() {
            println!("{}. {}", i + 1, label);
        }
        loop {
            let input = Input::<String>::new()
                .with_prompt(PROMPT)
                .interact_text()?;
            match parse_choice(&input, labels.len()) {
                Some(choice) => return Ok(choice),
                None => println!("Invalid selection. Please try again."),
            }
        }
    }
}

/// Interpret a typed answer against `count` candidates.
///
/// `q` (any case) cancels; `1..=count` selects. Anything else is `None`.
pub fn parse_choice(input: &str, count: usize) -> Option<Choice> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return Some(Choice::Cancelled);
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(Choice::Index(n - 1)),
        _ => None,
    }
}

/// Resolve the issue to archive.
///
/// Returns `None` when the catalog is empty, the chooser cancels, or the
/// chooser fails. An exact `preselected` label never reaches the chooser.
pub fn select_issue<C: IssueChooser>(
    catalog: &IssueCatalog,
    preselected: Option<&str>,
    chooser: &C,
) -> Option<String> {
    if catalog.is_empty() {
        warn!("No issues found to select from");
        return None;
    }

    if let Some(label) = preselected {
        if let Some(url) = catalog.get(label) {
            info!(%label, "Using preselected issue");
            return Some(url.to_string());
        }
        warn!(%label, "Preselected issue not in catalog; asking instead");
    }

    let ordered = catalog.newest_first();
    let labels: Vec<String> = ordered.iter().map(|issue| issue.label.clone()).collect();
    match chooser.choose(&labels) {
        Ok(Choice::Index(i)) => match ordered.get(i) {
            Some(issue) => {
                info!(label = %issue.label, "Selected issue");
                Some(issue.url.clone())
            }
            None => {
                warn!(index = i, count = ordered.len(), "Chooser returned an out-of-range index");
                None
            }
        },
        Ok(Choice::Cancelled) => {
            info!("Issue selection cancelled");
            None
        }
        Err(e) => {
            error!(error = %e, "Issue selection failed");
            None
        }
    }
}
