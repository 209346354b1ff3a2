//! The Atlantic magazine scraper.
//!
//! # Catalog
//!
//! The back-issues page at [`BACKISSUES_URL`] has changed layout several
//! times, so issues are discovered through a cascade:
//!
//! 1. Anchors into `/magazine/archive/` or `/magazine/toc/` whose text reads
//!    like `"April 2025"` (the "Latest Issue" marker is stripped)
//! 2. Any anchor into `/magazine/` with such text
//! 3. Text nodes with such text, paired with a `/magazine/` anchor found in
//!    one of their nearest ancestors
//! 4. A synthesized catalog of `/magazine/toc/YYYY/MM/` URLs for the current
//!    and previous year. These are not checked against the live site.
//!
//! # Articles
//!
//! An issue page is first reduced to a tag collection (`<article>` elements,
//! then content-like containers, then archive anchors) and links are then
//! pulled out of the serialized tags with three increasingly loose patterns.

use super::{Extraction, Strategy, absolutize, first_match, mentions_month_and_year, visible_text};
use crate::models::IssueCatalog;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

pub const BASE_URL: &str = "https://www.theatlantic.com";
pub const BACKISSUES_URL: &str = "https://www.theatlantic.com/magazine/backissues/";

const LATEST_ISSUE_MARKER: &str = "Latest Issue";
const ISSUE_PATHS: [&str; 2] = ["/magazine/archive/", "/magazine/toc/"];
const MAGAZINE_PATH: &str = "/magazine/";
const ARCHIVE_PATH: &str = "/magazine/archive/";
const CONTENT_CLASS_TERMS: [&str; 4] = ["article", "post", "content", "entry"];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static CONTAINER: Lazy<Selector> = Lazy::new(|| Selector::parse("div[class], section[class]").unwrap());

static STRICT_ARCHIVE_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"href="(https://www\.theatlantic\.com/magazine/archive/[^'" >]+)""#).unwrap()
});
static ANY_HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r#"href="([^'" >]+?)""#).unwrap());
static BARE_SITE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(https://www\.theatlantic\.com/[^'" >]+)"#).unwrap());

const CATALOG_STRATEGIES: [Strategy<Html, IssueCatalog>; 3] = [
    Strategy {
        name: "issue anchors",
        run: issue_anchors,
    },
    Strategy {
        name: "magazine anchors",
        run: magazine_anchors,
    },
    Strategy {
        name: "text near anchor",
        run: text_near_anchor,
    },
];

const TAG_STRATEGIES: [Strategy<Html, Vec<String>>; 3] = [
    Strategy {
        name: "article elements",
        run: article_elements,
    },
    Strategy {
        name: "content containers",
        run: content_containers,
    },
    Strategy {
        name: "archive anchors",
        run: archive_anchors,
    },
];

const LINK_PATTERNS: [Strategy<str, Vec<String>>; 3] = [
    Strategy {
        name: "strict archive href",
        run: strict_archive_hrefs,
    },
    Strategy {
        name: "site magazine href",
        run: site_magazine_hrefs,
    },
    Strategy {
        name: "bare magazine url",
        run: bare_magazine_urls,
    },
];

/// Build the issue catalog from back-issues HTML.
///
/// Never empty: when no tier recognises the page the synthesized catalog for
/// `current_year` and the year before is returned.
pub fn parse_catalog(html: &str, current_year: i32) -> IssueCatalog {
    let document = Html::parse_document(html);
    match first_match(&document, &CATALOG_STRATEGIES) {
        Some((strategy, catalog)) => {
            info!(strategy, count = catalog.len(), "Resolved Atlantic issues");
            catalog
        }
        None => {
            warn!("Automatic issue detection failed; using synthesized issue URLs");
            fallback_catalog(current_year)
        }
    }
}

/// One issue per month of `current_year - 1` and `current_year`.
pub fn fallback_catalog(current_year: i32) -> IssueCatalog {
    let mut catalog = IssueCatalog::new();
    for year in [current_year - 1, current_year] {
        for (index, month) in MONTHS.iter().enumerate() {
            catalog.insert(
                format!("{month} {year}"),
                format!("{BASE_URL}/magazine/toc/{year}/{:02}/", index + 1),
            );
        }
    }
    catalog
}

fn non_empty(catalog: IssueCatalog) -> Option<IssueCatalog> {
    (!catalog.is_empty()).then_some(catalog)
}

fn issue_anchors(document: &Html) -> Option<IssueCatalog> {
    let mut catalog = IssueCatalog::new();
    for link in document.select(&ANCHOR) {
        let href = link.value().attr("href").unwrap_or_default();
        if !ISSUE_PATHS.iter().any(|path| href.contains(path)) {
            continue;
        }
        let text = visible_text(&link);
        if text.is_empty() || !mentions_month_and_year(&text) {
            continue;
        }
        let label = text
            .replace(LATEST_ISSUE_MARKER, "")
            .split_whitespace()
            .join(" ");
        if let Some(url) = absolutize(BASE_URL, href) {
            catalog.insert(label, url);
        }
    }
    non_empty(catalog)
}

fn magazine_anchors(document: &Html) -> Option<IssueCatalog> {
    let mut catalog = IssueCatalog::new();
    for link in document.select(&ANCHOR) {
        let href = link.value().attr("href").unwrap_or_default();
        let text = visible_text(&link);
        if text.is_empty() || !mentions_month_and_year(&text) || !href.contains(MAGAZINE_PATH) {
            continue;
        }
        if let Some(url) = absolutize(BASE_URL, href) {
            catalog.insert(text, url);
        }
    }
    non_empty(catalog)
}

fn text_near_anchor(document: &Html) -> Option<IssueCatalog> {
    let mut catalog = IssueCatalog::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let text = text.split_whitespace().join(" ");
        if text.is_empty() || !mentions_month_and_year(&text) {
            continue;
        }
        // Only the enclosing element counts; wider ancestors can hold
        // several issues and would pair labels with the wrong link.
        let Some(parent) = node.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        let Some(href) = parent
            .select(&ANCHOR)
            .next()
            .and_then(|a| a.value().attr("href"))
            .filter(|href| href.contains(MAGAZINE_PATH))
        else {
            continue;
        };
        if let Some(url) = absolutize(BASE_URL, href) {
            catalog.insert(text, url);
        }
    }
    non_empty(catalog)
}

/// Extract article links from issue-page HTML.
///
/// The returned extraction carries the serialized tag collection that the
/// links were taken from.
pub fn parse_articles(html: &str) -> Extraction {
    let document = Html::parse_document(html);
    let Some((container, tags)) = first_match(&document, &TAG_STRATEGIES) else {
        warn!("No article containers found on Atlantic issue page");
        return Extraction::default();
    };
    let fragment = tags.join("\n");
    info!(strategy = container, tags = tags.len(), "Collected Atlantic article tags");

    let links = match first_match(fragment.as_str(), &LINK_PATTERNS) {
        Some((pattern, links)) => {
            info!(pattern, count = links.len(), "Matched Atlantic article links");
            links
        }
        None => Vec::new(),
    };

    Extraction {
        links: normalize(links),
        tags: Some(fragment),
    }
}

fn non_empty_tags(tags: Vec<String>) -> Option<Vec<String>> {
    (!tags.is_empty()).then_some(tags)
}

fn article_elements(document: &Html) -> Option<Vec<String>> {
    non_empty_tags(document.select(&ARTICLE).map(|e| e.html()).collect())
}

fn content_containers(document: &Html) -> Option<Vec<String>> {
    non_empty_tags(
        document
            .select(&CONTAINER)
            .filter(|e| {
                let class = e.value().attr("class").unwrap_or_default().to_lowercase();
                CONTENT_CLASS_TERMS.iter().any(|term| class.contains(term))
            })
            .map(|e| e.html())
            .collect(),
    )
}

fn archive_anchors(document: &Html) -> Option<Vec<String>> {
    non_empty_tags(
        document
            .select(&ANCHOR)
            .filter(|e| {
                e.value()
                    .attr("href")
                    .is_some_and(|href| href.contains(ARCHIVE_PATH))
            })
            .map(|e| e.html())
            .collect(),
    )
}

fn strict_archive_hrefs(fragment: &str) -> Option<Vec<String>> {
    non_empty_tags(
        STRICT_ARCHIVE_HREF
            .captures_iter(fragment)
            .map(|c| c[1].to_string())
            .collect(),
    )
}

fn site_magazine_hrefs(fragment: &str) -> Option<Vec<String>> {
    non_empty_tags(
        ANY_HREF
            .captures_iter(fragment)
            .filter_map(|c| absolutize(BASE_URL, &c[1]))
            .filter(|link| link.contains("theatlantic.com/magazine/"))
            .collect(),
    )
}

fn bare_magazine_urls(fragment: &str) -> Option<Vec<String>> {
    non_empty_tags(
        BARE_SITE_URL
            .captures_iter(fragment)
            .map(|c| c[1].to_string())
            .filter(|link| link.contains(MAGAZINE_PATH))
            .collect(),
    )
}

/// Absolute, entity-decoded, deduplicated, sorted.
fn normalize(links: Vec<String>) -> Vec<String> {
    links
        .into_iter()
        .map(|link| link.replace("&amp;", "&"))
        .filter_map(|link| absolutize(BASE_URL, &link))
        .sorted()
        .dedup()
        .collect()
}
