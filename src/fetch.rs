//! HTTP fetch adapter shared by every scraper and the archive resolver.
//!
//! All requests go through the [`Fetch`] trait so the scraping and archiving
//! logic can be driven by an in-memory script in tests. [`HttpFetcher`] is the
//! production implementation: a `reqwest` client with a browser-like
//! `User-Agent`, natural redirect following, and a per-request deadline.

use crate::errors::ArchiverError;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Browser-like user agent sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// A fetched response: body, status, and the URL reached after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// The final URL after following redirects.
    pub url: String,
    /// HTTP status code of the final response.
    pub status: u16,
    /// Response body decoded as text.
    pub body: String,
}

impl Page {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can GET a URL.
///
/// Implementations return `Ok` for every HTTP response regardless of status;
/// only transport failures are errors.
pub trait Fetch {
    /// Issue a GET request and follow redirects.
    async fn get(&self, url: &str) -> Result<Page, ArchiverError>;
}

/// `reqwest`-backed [`Fetch`] implementation.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ArchiverError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn get(&self, url: &str) -> Result<Page, ArchiverError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;
        debug!(status, %final_url, bytes = body.len(), "Fetched page");
        Ok(Page {
            url: final_url,
            status,
            body,
        })
    }
}

/// Fetch a page and return its body when the status is 2xx.
///
/// Failures are logged and reported as `None`.
pub async fn fetch_html<F: Fetch>(fetcher: &F, url: &str) -> Option<String> {
    match fetcher.get(url).await {
        Ok(page) if page.is_success() => Some(page.body),
        Ok(page) => {
            warn!(%url, status = page.status, "Page fetch returned non-success status");
            None
        }
        Err(e) => {
            error!(%url, error = %e, "Page fetch failed");
            None
        }
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted [`Fetch`] implementation for tests.

    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::io::ErrorKind;
    use std::sync::Mutex;

    /// Replays queued responses per URL and records every request.
    ///
    /// When a URL's queue holds a single response it is replayed forever;
    /// URLs with no script fail as a refused connection.
    #[derive(Default)]
    pub struct ScriptedFetcher {
        script: Mutex<HashMap<String, VecDeque<Result<Page, String>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a 200 response with `body` that reports `url` as its final URL.
        pub fn ok(self, url: &str, body: &str) -> Self {
            self.respond(url, url, 200, body)
        }

        /// Queue a response with an explicit final URL and status.
        pub fn respond(self, url: &str, final_url: &str, status: u16, body: &str) -> Self {
            self.push(
                url,
                Ok(Page {
                    url: final_url.to_string(),
                    status,
                    body: body.to_string(),
                }),
            )
        }

        /// Queue a transport failure.
        pub fn fail(self, url: &str, message: &str) -> Self {
            self.push(url, Err(message.to_string()))
        }

        fn push(self, url: &str, entry: Result<Page, String>) -> Self {
            self.script
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(entry);
            self
        }

        /// Every URL requested so far, in order.
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        /// How many times `url` was requested.
        pub fn count(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
        }
    }

    fn refused(message: String) -> ArchiverError {
        ArchiverError::Io(std::io::Error::new(ErrorKind::ConnectionRefused, message))
    }

    impl Fetch for ScriptedFetcher {
        async fn get(&self, url: &str) -> Result<Page, ArchiverError> {
            self.calls.lock().unwrap().push(url.to_string());
            let mut script = self.script.lock().unwrap();
            let entry = match script.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            };
            match entry {
                Some(Ok(page)) => Ok(page),
                Some(Err(message)) => Err(refused(message)),
                None => Err(refused(format!("no script for {url}"))),
            }
        }
    }
}
