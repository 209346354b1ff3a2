//! Magazine scrapers: issue discovery and article link extraction.
//!
//! Each source follows the same two-phase pattern:
//!
//! 1. **Catalog**: fetch a listing page and build an [`IssueCatalog`]
//! 2. **Extraction**: fetch one issue page and collect its article URLs
//!
//! # Supported Sources
//!
//! | Source | Module | Listing page | Notes |
//! |--------|--------|--------------|-------|
//! | The Atlantic | [`atlantic`] | `/magazine/backissues/` | Four catalog tiers, ends in a synthesized fallback |
//! | The Economist | [`economist`] | `/weeklyedition/archive` | Date-text and anchor tiers, path-pattern extraction |
//!
//! # Strategy cascades
//!
//! Every site-specific heuristic is a [`Strategy`]: a named function that
//! either produces a result or reports "no match" with `None`. Cascades are
//! plain slices tried in order by [`first_match`], so each tier can be tested
//! on its own.
//!
//! Both phases are infallible from the caller's point of view: network and
//! parse failures are logged and produce an empty result.

pub mod atlantic;
pub mod economist;

use crate::fetch::{Fetch, fetch_html};
use crate::models::{IssueCatalog, MONTH_RE};
use crate::outputs::html::dump_html;
use clap::ValueEnum;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// A named extraction heuristic over some input.
pub struct Strategy<I: ?Sized, T> {
    pub name: &'static str,
    pub run: fn(&I) -> Option<T>,
}

/// Run `strategies` in order and return the first non-empty result together
/// with the name of the strategy that produced it.
pub fn first_match<I: ?Sized, T>(
    input: &I,
    strategies: &[Strategy<I, T>],
) -> Option<(&'static str, T)> {
    for strategy in strategies {
        match (strategy.run)(input) {
            Some(result) => {
                debug!(strategy = strategy.name, "Strategy matched");
                return Some((strategy.name, result));
            }
            None => debug!(strategy = strategy.name, "Strategy found nothing"),
        }
    }
    None
}

/// Article links pulled from an issue page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Absolute, deduplicated article URLs in lexicographic order.
    pub links: Vec<String>,
    /// Serialized tags the links were taken from, when the source narrows
    /// the page down before matching.
    pub tags: Option<String>,
}

/// The magazines this tool knows how to scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Source {
    Atlantic,
    Economist,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Atlantic, Source::Economist];

    /// Name used in the settings file and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Source::Atlantic => "atlantic",
            Source::Economist => "economist",
        }
    }

    pub fn from_name(name: &str) -> Option<Source> {
        Source::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Page listing the available issues.
    pub fn listing_url(&self) -> &'static str {
        match self {
            Source::Atlantic => atlantic::BACKISSUES_URL,
            Source::Economist => economist::ARCHIVE_URL,
        }
    }

    fn listing_dump_name(&self) -> &'static str {
        match self {
            Source::Atlantic => "backissues_debug.html",
            Source::Economist => "archive_debug.html",
        }
    }

    fn issue_dump_name(&self) -> &'static str {
        match self {
            Source::Atlantic => "atlantic_issue.html",
            Source::Economist => "economist_issue.html",
        }
    }

    /// Build a catalog from listing-page HTML.
    pub fn parse_catalog(&self, html: &str) -> IssueCatalog {
        match self {
            Source::Atlantic => atlantic::parse_catalog(html, current_year()),
            Source::Economist => economist::parse_catalog(html),
        }
    }

    /// Extract article URLs from issue-page HTML.
    pub fn parse_articles(&self, html: &str) -> Extraction {
        match self {
            Source::Atlantic => atlantic::parse_articles(html),
            Source::Economist => Extraction {
                links: economist::parse_articles(html),
                tags: None,
            },
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Local::now().year()
}

const TAGS_DUMP_NAME: &str = "article_tags.txt";

/// Fetch a source's listing page and build its issue catalog.
///
/// Returns an empty catalog when the page cannot be fetched. The raw HTML is
/// written to `dump_dir` for inspection when given.
///
/// # Arguments
///
/// * `fetcher` - HTTP client used for the listing page
/// * `source` - Which periodical to catalog
/// * `dump_dir` - Optional directory for the raw listing HTML
///
/// # Returns
///
/// The issue catalog. Never an error; an unreachable page gives an empty
/// catalog, and for The Atlantic an unrecognised page gives the synthesized
/// fallback issues.
#[instrument(level = "info", skip(fetcher, dump_dir), fields(source = %source))]
pub async fn resolve_catalog<F: Fetch>(
    fetcher: &F,
    source: Source,
    dump_dir: Option<&Path>,
) -> IssueCatalog {
    let url = source.listing_url();
    info!(%url, "Fetching magazine issues");
    let Some(html) = fetch_html(fetcher, url).await else {
        warn!(%url, "Could not fetch issue listing");
        return IssueCatalog::new();
    };

    if let Some(dir) = dump_dir {
        dump_html(&dir.join(source.listing_dump_name()), &html).await;
    }

    let catalog = source.parse_catalog(&html);
    if catalog.is_empty() {
        warn!("No issues found; the website structure may have changed");
    } else {
        info!(count = catalog.len(), "Found issues");
    }
    catalog
}

/// Fetch an issue page and extract its article URLs.
///
/// Returns an empty list when the page cannot be fetched or no article
/// links are recognised.
#[instrument(level = "info", skip(fetcher, dump_dir), fields(source = %source))]
pub async fn extract_articles<F: Fetch>(
    fetcher: &F,
    source: Source,
    issue_url: &str,
    dump_dir: Option<&Path>,
) -> Vec<String> {
    let Some(html) = fetch_html(fetcher, issue_url).await else {
        warn!(%issue_url, "Could not fetch issue page");
        return Vec::new();
    };

    if let Some(dir) = dump_dir {
        dump_html(&dir.join(source.issue_dump_name()), &html).await;
    }

    let Extraction { links, tags } = source.parse_articles(&html);
    if let (Some(dir), Some(tags)) = (dump_dir, tags) {
        dump_html(&dir.join(TAGS_DUMP_NAME), &tags).await;
    }
    if links.is_empty() {
        warn!("No article links found; the website structure may have changed");
    } else {
        info!(count = links.len(), "Extracted article links");
    }
    links
}

static YEAR_2000S_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b20[0-2]\d\b").unwrap());

/// Whether `text` mentions a month name and a year between 2000 and 2029.
pub fn mentions_month_and_year(text: &str) -> bool {
    MONTH_RE.is_match(text) && YEAR_2000S_RE.is_match(text)
}

/// Visible text of an element with whitespace collapsed.
pub fn visible_text(element: &ElementRef) -> String {
    element.text().flat_map(str::split_whitespace).join(" ")
}

/// Resolve `href` against `base`, keeping absolute URLs as they are.
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::ScriptedFetcher;
    use scraper::Html;
    use tempfile::tempdir;

    fn none(_: &str) -> Option<u32> {
        None
    }
    fn one(_: &str) -> Option<u32> {
        Some(1)
    }
    fn two(_: &str) -> Option<u32> {
        Some(2)
    }

    #[test]
    fn test_first_match_stops_at_first_hit() {
        let strategies: [Strategy<str, u32>; 3] = [
            Strategy { name: "none", run: none },
            Strategy { name: "one", run: one },
            Strategy { name: "two", run: two },
        ];
        assert_eq!(first_match("x", &strategies), Some(("one", 1)));
        assert_eq!(first_match("x", &strategies[..1]), None);
    }

    #[test]
    fn test_mentions_month_and_year() {
        assert!(mentions_month_and_year("April 2025"));
        assert!(mentions_month_and_year("Latest Issue Sept 2024"));
        assert!(mentions_month_and_year("Dec 2000"));
        assert!(!mentions_month_and_year("April 1999"));
        assert!(!mentions_month_and_year("April 2030"));
        assert!(!mentions_month_and_year("Subscribe 2025"));
        assert!(!mentions_month_and_year("Mayor 2025"));
    }

    #[test]
    fn test_absolutize() {
        let base = "https://www.theatlantic.com";
        assert_eq!(
            absolutize(base, "/magazine/toc/2025/04/").as_deref(),
            Some("https://www.theatlantic.com/magazine/toc/2025/04/")
        );
        assert_eq!(
            absolutize(base, "https://example.com/x").as_deref(),
            Some("https://example.com/x")
        );
        assert_eq!(
            absolutize(base, "magazine/toc/2025/04/").as_deref(),
            Some("https://www.theatlantic.com/magazine/toc/2025/04/")
        );
    }

    #[test]
    fn test_visible_text_collapses_whitespace() {
        let doc = Html::parse_document("<a href='/x'>\n  April\n  <span>2025</span> </a>");
        let sel = scraper::Selector::parse("a").unwrap();
        let a = doc.select(&sel).next().unwrap();
        assert_eq!(visible_text(&a), "April 2025");
    }

    #[test]
    fn test_source_names_round_trip() {
        for source in Source::ALL {
            assert_eq!(Source::from_name(source.name()), Some(source));
        }
        assert_eq!(Source::from_name("newyorker"), None);
        assert_eq!(Source::Economist.to_string(), "economist");
    }

    #[tokio::test]
    async fn test_resolve_catalog_empty_on_fetch_failure() {
        let fetcher = ScriptedFetcher::new().fail(atlantic::BACKISSUES_URL, "dns failure");
        let catalog = resolve_catalog(&fetcher, Source::Atlantic, None).await;
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_catalog_dumps_listing() {
        let dir = tempdir().unwrap();
        let html = r#"<a href="/magazine/toc/2025/04/">April 2025</a>"#;
        let fetcher = ScriptedFetcher::new().ok(atlantic::BACKISSUES_URL, html);

        let catalog = resolve_catalog(&fetcher, Source::Atlantic, Some(dir.path())).await;
        assert_eq!(
            catalog.get("April 2025"),
            Some("https://www.theatlantic.com/magazine/toc/2025/04/")
        );
        let dumped = std::fs::read_to_string(dir.path().join("backissues_debug.html")).unwrap();
        assert_eq!(dumped, html);
    }

    #[tokio::test]
    async fn test_extract_articles_empty_on_error_status() {
        let url = "https://www.economist.com/weeklyedition/2025-03-29";
        let fetcher = ScriptedFetcher::new().respond(url, url, 503, "busy");
        assert!(extract_articles(&fetcher, Source::Economist, url, None).await.is_empty());
    }
}
