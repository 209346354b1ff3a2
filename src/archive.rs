//! archive.today resolution.
//!
//! Each article goes through two stages, both under the same
//! [`RetryPolicy`]:
//!
//! 1. **Redirect**: GET `http://archive.today/<article url>` and keep the URL
//!    the redirect chain lands on. Only transport failures are retried.
//! 2. **Capture**: GET that URL and read the first link inside the
//!    `TEXT-BLOCK` element. HTTP 429, other non-200 statuses, and a missing
//!    link are all retried.
//!
//! A failure in either stage drops the article; the batch carries on.
//! Articles are separated by a fixed pause, and at most `concurrency` are in
//! flight at once. Results keep the input order.

use crate::config::ArchiveSettings;
use crate::errors::ArchiverError;
use crate::fetch::Fetch;
use crate::models::ArchiveResolution;
use crate::outputs::text::write_url_list;
use crate::retry::{Attempt, RetryPolicy, RetryReason};
use crate::scrapers::absolutize;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Prefix that turns an article URL into an archive.today submission.
pub const SUBMISSION_PREFIX: &str = "http://archive.today/";

const SUBMISSIONS_FILE: &str = "archive_links.txt";
const DURABLE_FILE: &str = "final_archive_links.txt";

static TEXT_BLOCK: Lazy<Selector> = Lazy::new(|| Selector::parse("div.TEXT-BLOCK").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// The archive.today submission URL for an article. The article URL is
/// appended as-is.
pub fn submission_url(article_url: &str) -> String {
    format!("{SUBMISSION_PREFIX}{article_url}")
}

/// First link inside the first `TEXT-BLOCK` element of a capture page,
/// resolved against `page_url`.
pub fn durable_link(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let block = document.select(&TEXT_BLOCK).next()?;
    let href = block.select(&ANCHOR).next()?.value().attr("href")?;
    absolutize(page_url, href)
}

/// Resolves article URLs to durable snapshot URLs.
pub struct ArchiveResolver<'a, F> {
    fetcher: &'a F,
    pub policy: RetryPolicy,
    /// Pause after each article, successful or not.
    pub pause: Duration,
    /// Articles in flight at once.
    pub concurrency: usize,
}

impl<'a, F: Fetch> ArchiveResolver<'a, F> {
    pub fn new(fetcher: &'a F, settings: &ArchiveSettings) -> Self {
        Self {
            fetcher,
            policy: RetryPolicy::from(settings),
            pause: Duration::from_millis(settings.pause_ms),
            concurrency: settings.concurrency.max(1),
        }
    }

    /// Stage 1: the URL the submission link redirects to.
    async fn follow_submission(&self, submission: &str) -> Option<String> {
        let fetcher = self.fetcher;
        self.policy
            .run("redirect", move |_| async move {
                match fetcher.get(submission).await {
                    Ok(page) => Attempt::Done(page.url),
                    Err(e) => Attempt::Retry(RetryReason::Transport(e)),
                }
            })
            .await
    }

    /// Stage 2: the durable link on a capture page.
    async fn read_capture(&self, capture_url: &str) -> Option<String> {
        let fetcher = self.fetcher;
        self.policy
            .run("capture", move |_| async move {
                let page = match fetcher.get(capture_url).await {
                    Ok(page) => page,
                    Err(e) => return Attempt::Retry(RetryReason::Transport(e)),
                };
                if page.status != 200 {
                    return Attempt::Retry(RetryReason::Status(page.status));
                }
                match durable_link(&page.body, &page.url) {
                    Some(link) => Attempt::Done(link),
                    None => Attempt::Retry(RetryReason::Structural(format!(
                        "no archive link found in {}",
                        page.url
                    ))),
                }
            })
            .await
    }

    /// Run both stages for one article.
    ///
    /// # Arguments
    ///
    /// * `article_url` - Canonical URL of the article to archive
    ///
    /// # Returns
    ///
    /// An [`ArchiveResolution`] whose `durable_url` is `Some` only when the
    /// redirect and the capture page both resolved within the retry budget.
    #[instrument(level = "info", skip(self))]
    pub async fn resolve(&self, article_url: &str) -> ArchiveResolution {
        let submission = submission_url(article_url);
        info!(%submission, "Processing");

        let durable_url = match self.follow_submission(&submission).await {
            Some(capture_url) => {
                info!(%capture_url, "Redirected");
                self.read_capture(&capture_url).await
            }
            None => {
                warn!(%submission, "Failed to get redirected URL");
                None
            }
        };

        match &durable_url {
            Some(url) => info!(durable_url = %url, "Extracted archive link"),
            None => warn!("Could not archive article"),
        }
        ArchiveResolution {
            source_url: article_url.to_string(),
            submission_url: submission,
            durable_url,
        }
    }

    /// Resolve every article, pausing after each, in input order.
    pub async fn resolve_all(&self, article_urls: &[String]) -> Vec<ArchiveResolution> {
        stream::iter(article_urls)
            .map(|url| async move {
                let resolution = self.resolve(url).await;
                sleep(self.pause).await;
                resolution
            })
            .buffered(self.concurrency.max(1))
            .collect()
            .await
    }
}

/// Archive a batch of articles, writing the submission and durable URL
/// lists under `archive_dir`. Returns the durable URLs.
#[instrument(level = "info", skip_all, fields(dir = %archive_dir.display(), count = article_urls.len()))]
pub async fn archive_articles<F: Fetch>(
    resolver: &ArchiveResolver<'_, F>,
    article_urls: &[String],
    archive_dir: &Path,
) -> Result<Vec<String>, ArchiverError> {
    let submissions: Vec<String> = article_urls.iter().map(|url| submission_url(url)).collect();
    write_url_list(&archive_dir.join(SUBMISSIONS_FILE), &submissions).await?;

    let durable: Vec<String> = resolver
        .resolve_all(article_urls)
        .await
        .into_iter()
        .filter_map(|resolution| {
            if resolution.durable_url.is_none() {
                debug!(
                    article = %resolution.source_url,
                    submission = %resolution.submission_url,
                    "Dropped from final archive list"
                );
            }
            resolution.durable_url
        })
        .collect();

    write_url_list(&archive_dir.join(DURABLE_FILE), &durable).await?;
    info!(archived = durable.len(), failed = article_urls.len() - durable.len(), "Archiving finished");
    Ok(durable)
}
