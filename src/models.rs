//! Data models shared across the pipeline.
//!
//! - [`IssueCatalog`]: issue label to issue page URL, rebuilt on every run
//! - [`IssueDate`]: sortable (year, month) key parsed from an issue label
//! - [`ArchiveResolution`]: the outcome of archiving one article
//! - [`ReadLaterDocument`]: payload submitted to Readwise Reader

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One discoverable issue of a periodical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Human-readable label, e.g. `"April 2025"`.
    pub label: String,
    /// Absolute URL of the issue's table of contents.
    pub url: String,
}

/// Mapping from issue label to issue URL.
///
/// Labels are unique. Inserting an existing label replaces its URL but keeps
/// the label's original position, so iteration follows first discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueCatalog {
    issues: Vec<Issue>,
}

impl IssueCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the URL for `label`.
    pub fn insert(&mut self, label: impl Into<String>, url: impl Into<String>) {
        let label = label.into();
        let url = url.into();
        match self.issues.iter_mut().find(|issue| issue.label == label) {
            Some(existing) => existing.url = url,
            None => self.issues.push(Issue { label, url }),
        }
    }

    /// URL for an exact label.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.issues
            .iter()
            .find(|issue| issue.label == label)
            .map(|issue| issue.url.as_str())
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues ordered newest first by the date parsed from each label.
    ///
    /// Labels without a recognisable date go last and keep their relative
    /// discovery order.
    pub fn newest_first(&self) -> Vec<&Issue> {
        let mut sorted: Vec<&Issue> = self.issues.iter().collect();
        // `sort_by` is stable.
        sorted.sort_by(|a, b| IssueDate::parse(&a.label).cmp_newest_first(&IssueDate::parse(&b.label)));
        sorted
    }
}

/// Full or abbreviated English month name.
pub static MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:t|tember)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)\b",
    )
    .unwrap()
});

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

/// Month number (1-12) for a full or abbreviated English month name.
pub fn month_number(name: &str) -> Option<u32> {
    let number = match name.get(..3)? {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => return None,
    };
    Some(number)
}

/// Sort key parsed from an issue label.
///
/// `(0, 0)` means the label carried no year. A label with a year but no
/// month gets month `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueDate {
    pub year: i32,
    pub month: u32,
}

impl IssueDate {
    /// Parse the first month name in `label` and the first four-digit year
    /// after it. Never fails.
    ///
    /// Economist labels read `"<date> - <title>"`, so a year inside the
    /// title must not win over the edition date. Labels with no month, or
    /// no year after the month, take the first year anywhere in the label.
    pub fn parse(label: &str) -> Self {
        let month = MONTH_RE.captures(label).and_then(|c| {
            let name = c.get(1)?;
            Some((month_number(name.as_str())?, name.end()))
        });
        let first_year = |text: &str| {
            YEAR_RE
                .captures(text)
                .and_then(|c| c[1].parse::<i32>().ok())
        };

        let year = month
            .and_then(|(_, end)| first_year(&label[end..]))
            .or_else(|| first_year(label));
        match year {
            Some(year) => IssueDate {
                year,
                month: month.map_or(0, |(number, _)| number),
            },
            None => IssueDate { year: 0, month: 0 },
        }
    }

    pub fn is_known(&self) -> bool {
        self.year != 0
    }

    /// Ordering for display: newest first, unknown dates last.
    pub fn cmp_newest_first(&self, other: &Self) -> Ordering {
        match (self.is_known(), other.is_known()) {
            (true, true) => (other.year, other.month).cmp(&(self.year, self.month)),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => Ordering::Equal,
        }
    }
}

/// Outcome of archiving one article.
///
/// `durable_url` is only set when both archive stages succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveResolution {
    /// The article URL that was archived.
    pub source_url: String,
    /// The archive.today submission link built from `source_url`.
    pub submission_url: String,
    /// The snapshot link scraped from the capture page.
    pub durable_url: Option<String>,
}

/// A document submitted to Readwise Reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadLaterDocument {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
}

impl ReadLaterDocument {
    /// Build a document for `url`.
    ///
    /// When `tags` is empty the document is tagged with the second-level
    /// label of the URL's host, e.g. `"archive"` for `archive.ph`.
    pub fn new(url: impl Into<String>, tags: &[String]) -> Self {
        let url = url.into();
        let tags = if tags.is_empty() {
            domain_tag(&url).into_iter().collect()
        } else {
            tags.to_vec()
        };
        Self {
            url,
            title: None,
            author: None,
            tags,
        }
    }
}

/// Extract the domain name (before .com/.org/etc) from a URL.
/// For example: "https://www.theatlantic.com/magazine" -> "theatlantic"
pub fn domain_tag(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() >= 2 {
        return Some(parts[parts.len() - 2].to_string());
    }
    None
}
