//! The Economist weekly edition scraper.
//!
//! # Catalog
//!
//! The archive page at [`ARCHIVE_URL`] lists editions by date
//! (`"Mar 29th 2025"`). Editions are discovered by:
//!
//! 1. Date text nodes, labelled with the nearest heading and paired with the
//!    first anchor inside the date's element (or the next anchor after it)
//! 2. `/weeklyedition/` anchors whose own text carries a date
//!
//! # Articles
//!
//! Article URLs have the shape `/<section>/<yyyy>/<mm>/<dd>/<slug>`. Every
//! anchor on the issue page is reduced to a site path and matched against
//! that shape; the digit widths are exact.

use super::{Strategy, absolutize, first_match, visible_text};
use crate::models::IssueCatalog;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use tracing::{debug, info};

pub const BASE_URL: &str = "https://www.economist.com";
pub const ARCHIVE_URL: &str = "https://www.economist.com/weeklyedition/archive";

const EDITION_PATHS: [&str; 2] = ["/weeklyedition/", "/printedition/"];
const DEFAULT_TITLE: &str = "Weekly Edition";
const HEADINGS: [&str; 3] = ["h2", "h3", "h4"];

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

static EDITION_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d+\w+\s+\d{4}\b").unwrap()
});

static ARTICLE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/[^/]+/\d{4}/\d{2}/\d{2}/[^/]+/?$").unwrap());

const CATALOG_STRATEGIES: [Strategy<Html, IssueCatalog>; 2] = [
    Strategy {
        name: "dated text",
        run: dated_text,
    },
    Strategy {
        name: "edition anchors",
        run: edition_anchors,
    },
];

/// Build the issue catalog from archive-page HTML. May be empty.
pub fn parse_catalog(html: &str) -> IssueCatalog {
    let document = Html::parse_document(html);
    match first_match(&document, &CATALOG_STRATEGIES) {
        Some((strategy, catalog)) => {
            info!(strategy, count = catalog.len(), "Resolved Economist editions");
            catalog
        }
        None => IssueCatalog::new(),
    }
}

fn is_heading(element: &ElementRef) -> bool {
    HEADINGS.contains(&element.value().name())
}

fn is_link(element: &ElementRef) -> bool {
    element.value().name() == "a" && element.value().attr("href").is_some()
}

/// First element after `start` in document order that satisfies `pred`.
/// `start`'s own descendants count as "after".
fn find_next<'a>(
    document: &'a Html,
    start: ElementRef<'a>,
    pred: fn(&ElementRef) -> bool,
) -> Option<ElementRef<'a>> {
    document
        .root_element()
        .descendants()
        .skip_while(|node| node.id() != start.id())
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|element| pred(element))
}

/// Heading that titles the edition containing `element`: a heading that is
/// a direct child of `element` or one of its ancestors below `<body>`, else
/// the next heading in the document.
fn edition_heading<'a>(document: &'a Html, element: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let enclosing = std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .take_while(|e| !matches!(e.value().name(), "body" | "html"))
        .find_map(|e| e.children().filter_map(ElementRef::wrap).find(is_heading));
    enclosing.or_else(|| find_next(document, element, is_heading))
}

fn dated_text(document: &Html) -> Option<IssueCatalog> {
    let mut catalog = IssueCatalog::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if !EDITION_DATE.is_match(text) {
            continue;
        }
        let date = text.split_whitespace().join(" ");
        let Some(parent) = node.parent().and_then(ElementRef::wrap) else {
            continue;
        };

        let title = edition_heading(document, parent)
            .filter(|heading| heading.id() != parent.id())
            .map(|heading| visible_text(&heading))
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let link = parent
            .select(&ANCHOR)
            .next()
            .or_else(|| find_next(document, parent, is_link));
        let Some(href) = link.and_then(|a| a.value().attr("href")) else {
            continue;
        };
        if !EDITION_PATHS.iter().any(|path| href.contains(path)) {
            debug!(%href, %date, "Dated text is not next to an edition link");
            continue;
        }
        if let Some(url) = absolutize(BASE_URL, href) {
            catalog.insert(format!("{date} - {title}"), url);
        }
    }
    (!catalog.is_empty()).then_some(catalog)
}

fn edition_anchors(document: &Html) -> Option<IssueCatalog> {
    let mut catalog = IssueCatalog::new();
    for link in document.select(&ANCHOR) {
        let href = link.value().attr("href").unwrap_or_default();
        if !href.contains(EDITION_PATHS[0]) {
            continue;
        }
        let text = visible_text(&link);
        let Some(date) = EDITION_DATE.find(&text) else {
            continue;
        };
        if let Some(url) = absolutize(BASE_URL, href) {
            catalog.insert(format!("{} - {DEFAULT_TITLE}", date.as_str()), url);
        }
    }
    (!catalog.is_empty()).then_some(catalog)
}

/// Site path for an anchor target: economist.com URLs lose their scheme and
/// host, site-relative paths pass through, anything else is ignored.
pub fn article_path(href: &str) -> Option<String> {
    if href.starts_with("http") && href.contains("economist.com") {
        Some(format!("/{}", href.split('/').skip(3).join("/")))
    } else if href.starts_with('/') {
        Some(href.to_string())
    } else {
        None
    }
}

/// Article URLs on an issue page, deduplicated and sorted.
pub fn parse_articles(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let links: BTreeSet<String> = document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(article_path)
        .filter(|path| ARTICLE_PATH.is_match(path))
        .map(|path| format!("{BASE_URL}{path}"))
        .collect();
    links.into_iter().collect()
}
