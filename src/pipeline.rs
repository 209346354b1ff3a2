//! End-to-end run: catalog, selection, extraction, archiving, Readwise.
//!
//! Sources are processed one after another in the order the settings file
//! lists them. A source that yields nothing is reported and skipped; only
//! settings and directory failures end the run early.

use crate::archive::{ArchiveResolver, archive_articles};
use crate::config::Settings;
use crate::errors::ArchiverError;
use crate::fetch::Fetch;
use crate::outputs::text::write_url_list;
use crate::readwise::{ReadLaterSink, save_all};
use crate::scrapers::{Source, extract_articles, resolve_catalog};
use crate::select::{IssueChooser, select_issue};
use crate::utils::{ensure_writable_dir, upcase};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument};

const ARTICLES_FILE: &str = "articles.txt";
const ARCHIVES_DIR: &str = "archives";

/// What the command line asked for.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Restrict the run to one source.
    pub source: Option<Source>,
    /// Exact issue label to archive without prompting.
    pub issue: Option<String>,
    /// Print the catalogs and stop.
    pub list_issues_only: bool,
}

/// Enabled, known sources in settings order, optionally narrowed to one.
fn enabled_sources<'s>(
    settings: &'s Settings,
    only: Option<Source>,
) -> impl Iterator<Item = (Source, PathBuf)> + 's {
    settings
        .sources
        .iter()
        .filter(|(_, source)| source.enabled)
        .filter_map(|(name, _)| match Source::from_name(name) {
            Some(source) => Some(source),
            None => {
                debug!(%name, "No scraper for configured source");
                None
            }
        })
        .filter(move |source| only.is_none_or(|only| only == *source))
        .map(move |source| (source, settings.output_path_for(source.name())))
}

/// Create the output directory and every enabled source's directory.
#[instrument(level = "info", skip_all)]
pub async fn setup_directories(settings: &Settings) -> Result<(), ArchiverError> {
    ensure_writable_dir(Path::new(&settings.output_directory)).await?;
    for (_, dir) in enabled_sources(settings, None) {
        ensure_writable_dir(&dir).await?;
    }
    Ok(())
}

/// Print each source's catalog, newest first, and return the labels.
pub async fn list_available_issues<F: Fetch>(
    fetcher: &F,
    settings: &Settings,
    only: Option<Source>,
) -> IndexMap<String, Vec<String>> {
    let mut listed = IndexMap::new();
    for (source, dir) in enabled_sources(settings, only) {
        let catalog = resolve_catalog(fetcher, source, Some(&dir)).await;
        let display = upcase(source.name());
        if catalog.is_empty() {
            println!(
                "No issues found for {display}. Please check your internet connection or the website structure may have changed."
            );
            continue;
        }

        println!("\nAvailable issues for {display}:");
        let labels: Vec<String> = catalog
            .newest_first()
            .into_iter()
            .map(|issue| issue.label.clone())
            .collect();
        for (i, label) in labels.iter().enumerate() {
            println!("{}. {}", i + 1, label);
        }
        listed.insert(source.name().to_string(), labels);
    }
    listed
}

/// Pick an issue per source and extract its article URLs.
///
/// Sources with no selected issue or no articles are left out of the result.
pub async fn scrape_articles<F: Fetch, C: IssueChooser>(
    fetcher: &F,
    chooser: &C,
    settings: &Settings,
    options: &RunOptions,
) -> IndexMap<String, Vec<String>> {
    let mut scraped = IndexMap::new();
    for (source, dir) in enabled_sources(settings, options.source) {
        let display = upcase(source.name());
        println!("Scraping articles from {display}...");

        let catalog = resolve_catalog(fetcher, source, Some(&dir)).await;
        let Some(issue_url) = select_issue(&catalog, options.issue.as_deref(), chooser) else {
            println!("No articles were found from {display} or the process was cancelled.");
            continue;
        };
        info!(%source, %issue_url, "Scraping issue");

        let links = extract_articles(fetcher, source, &issue_url, Some(&dir)).await;
        if let Err(e) = write_url_list(&dir.join(ARTICLES_FILE), &links).await {
            error!(%source, error = %e, "Failed to save article links");
        }
        if links.is_empty() {
            println!("No articles were found from {display} or the process was cancelled.");
            continue;
        }
        scraped.insert(source.name().to_string(), links);
    }
    scraped
}

/// Archive each source's articles and send the durable links to Readwise.
///
/// Returns the durable URLs per source; sources where nothing was archived
/// are left out.
pub async fn process_articles<F: Fetch, S: ReadLaterSink>(
    fetcher: &F,
    sink: Option<&S>,
    settings: &Settings,
    articles_by_source: &IndexMap<String, Vec<String>>,
) -> IndexMap<String, Vec<String>> {
    let resolver = ArchiveResolver::new(fetcher, &settings.archive);
    let mut archived = IndexMap::new();

    for (name, article_urls) in articles_by_source {
        if article_urls.is_empty() {
            println!("No articles found for {name}.");
            continue;
        }

        println!("Archiving {} articles from {name}...", article_urls.len());
        let archive_dir = settings.output_path_for(name).join(ARCHIVES_DIR);
        let durable = match archive_articles(&resolver, article_urls, &archive_dir).await {
            Ok(durable) => durable,
            Err(e) => {
                error!(source = %name, error = %e, "Archiving failed");
                continue;
            }
        };
        if durable.is_empty() {
            println!("No articles were successfully archived for {name}.");
            continue;
        }

        match sink {
            Some(sink) => {
                println!("Adding {} archived articles to Readwise...", durable.len());
                let saved = save_all(sink, &durable, &settings.tags_for(name)).await;
                println!("Successfully added {} articles to Readwise.", saved.len());
            }
            None => {
                println!("Readwise token not configured. Skipping Readwise integration.");
                println!("You can set your Readwise token using: magazine_archiver --token YOUR_TOKEN");
            }
        }
        archived.insert(name.clone(), durable);
    }
    archived
}

/// Full run. Returns durable URLs per source; empty when only listing.
#[instrument(level = "info", skip_all, fields(source = ?options.source, list_only = options.list_issues_only))]
pub async fn run<F: Fetch, C: IssueChooser, S: ReadLaterSink>(
    settings: &Settings,
    fetcher: &F,
    chooser: &C,
    sink: Option<&S>,
    options: &RunOptions,
) -> Result<IndexMap<String, Vec<String>>, ArchiverError> {
    setup_directories(settings).await?;

    if options.list_issues_only {
        list_available_issues(fetcher, settings, options.source).await;
        return Ok(IndexMap::new());
    }

    let articles = scrape_articles(fetcher, chooser, settings, options).await;
    Ok(process_articles(fetcher, sink, settings, &articles).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::submission_url;
    use crate::config::SourceSettings;
    use crate::fetch::testing::ScriptedFetcher;
    use crate::readwise::testing::RecordingSink;
    use crate::scrapers::{atlantic, economist};
    use crate::select::Choice;
    use serde_json::Map;
    use tempfile::{TempDir, tempdir};

    struct MustNotAsk;

    impl IssueChooser for MustNotAsk {
        fn choose(&self, _: &[String]) -> Result<Choice, ArchiverError> {
            panic!("chooser should not be consulted");
        }
    }

    struct Cancel;

    impl IssueChooser for Cancel {
        fn choose(&self, _: &[String]) -> Result<Choice, ArchiverError> {
            Ok(Choice::Cancelled)
        }
    }

    const ISSUE_URL: &str = "https://www.theatlantic.com/magazine/toc/2025/04/";

    fn settings_in(dir: &TempDir) -> Settings {
        let mut settings = Settings::default();
        settings.output_directory = dir.path().join("data").display().to_string();
        for (name, source) in settings.sources.iter_mut() {
            source.output_path = dir.path().join("data").join(name).display().to_string();
        }
        settings
    }

    fn archived(fetcher: ScriptedFetcher, article: &str, durable: &str) -> ScriptedFetcher {
        let capture = format!("{durable}/capture");
        fetcher
            .respond(&submission_url(article), &capture, 200, "")
            .ok(
                &capture,
                &format!(r#"<div class="TEXT-BLOCK"><a href="{durable}">x</a></div>"#),
            )
    }

    fn atlantic_issue_page(slugs: &[&str]) -> String {
        slugs
            .iter()
            .map(|slug| {
                format!(
                    r#"<article><a href="/magazine/archive/2025/04/{slug}/1/">{slug}</a></article>"#
                )
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_end_to_end_with_preselected_issue() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        let article_a = "https://www.theatlantic.com/magazine/archive/2025/04/alpha/1/";
        let article_b = "https://www.theatlantic.com/magazine/archive/2025/04/beta/1/";

        let fetcher = ScriptedFetcher::new()
            .ok(
                atlantic::BACKISSUES_URL,
                r#"<a href="/magazine/toc/2025/04/">April 2025</a><a href="/magazine/toc/2025/03/">March 2025</a>"#,
            )
            .ok(ISSUE_URL, &atlantic_issue_page(&["alpha", "beta"]));
        let fetcher = archived(fetcher, article_a, "https://archive.ph/alpha");
        let fetcher = archived(fetcher, article_b, "https://archive.ph/beta");
        let sink = RecordingSink::default();
        let options = RunOptions {
            issue: Some("April 2025".to_string()),
            ..Default::default()
        };

        let results = run(&settings, &fetcher, &MustNotAsk, Some(&sink), &options)
            .await
            .unwrap();

        assert_eq!(
            results["atlantic"],
            vec!["https://archive.ph/alpha", "https://archive.ph/beta"]
        );
        // The economist source is disabled by default.
        assert!(!results.contains_key("economist"));
        assert!(!fetcher.calls().iter().any(|url| url == economist::ARCHIVE_URL));

        let saved = sink.saved.lock().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].tags, vec!["the atlantic"]);

        let source_dir = dir.path().join("data").join("atlantic");
        assert_eq!(
            std::fs::read_to_string(source_dir.join("articles.txt")).unwrap(),
            format!("{article_a}\n{article_b}\n")
        );
        assert_eq!(
            std::fs::read_to_string(source_dir.join("archives").join("final_archive_links.txt"))
                .unwrap(),
            "https://archive.ph/alpha\nhttps://archive.ph/beta\n"
        );
        assert!(source_dir.join("backissues_debug.html").exists());
        assert!(source_dir.join("atlantic_issue.html").exists());
        assert!(source_dir.join("article_tags.txt").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_without_sink_still_archives() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        let article = "https://www.theatlantic.com/magazine/archive/2025/04/alpha/1/";
        let fetcher = ScriptedFetcher::new()
            .ok(atlantic::BACKISSUES_URL, r#"<a href="/magazine/toc/2025/04/">April 2025</a>"#)
            .ok(ISSUE_URL, &atlantic_issue_page(&["alpha"]));
        let fetcher = archived(fetcher, article, "https://archive.ph/alpha");
        let options = RunOptions {
            issue: Some("April 2025".to_string()),
            ..Default::default()
        };

        let results = run(&settings, &fetcher, &MustNotAsk, None::<&RecordingSink>, &options)
            .await
            .unwrap();
        assert_eq!(results["atlantic"], vec!["https://archive.ph/alpha"]);
    }

    #[tokio::test]
    async fn test_cancelled_selection_archives_nothing() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        let fetcher = ScriptedFetcher::new()
            .ok(atlantic::BACKISSUES_URL, r#"<a href="/magazine/toc/2025/04/">April 2025</a>"#);

        let results = run(
            &settings,
            &fetcher,
            &Cancel,
            None::<&RecordingSink>,
            &RunOptions::default(),
        )
        .await
        .unwrap();

        assert!(results.is_empty());
        assert_eq!(fetcher.calls(), vec![atlantic::BACKISSUES_URL.to_string()]);
    }

    #[tokio::test]
    async fn test_list_issues_only_fetches_listings() {
        let dir = tempdir().unwrap();
        let mut settings = settings_in(&dir);
        settings.sources.get_mut("economist").unwrap().enabled = true;
        let fetcher = ScriptedFetcher::new()
            .ok(
                atlantic::BACKISSUES_URL,
                r#"<a href="/magazine/toc/2025/03/">March 2025</a><a href="/magazine/toc/2025/04/">April 2025</a>"#,
            )
            .ok(
                economist::ARCHIVE_URL,
                r#"<a href="/weeklyedition/2025-03-29">Mar 29th 2025</a>"#,
            );

        let listed = list_available_issues(&fetcher, &settings, None).await;
        assert_eq!(listed["atlantic"], vec!["April 2025", "March 2025"]);
        assert_eq!(listed["economist"], vec!["Mar 29th 2025 - Weekly Edition"]);

        let listed = list_available_issues(&fetcher, &settings, Some(Source::Economist)).await;
        assert_eq!(listed.keys().collect::<Vec<_>>(), vec!["economist"]);

        let results = run(
            &settings,
            &fetcher,
            &MustNotAsk,
            None::<&RecordingSink>,
            &RunOptions {
                list_issues_only: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_setup_directories_skips_disabled_and_unknown_sources() {
        let dir = tempdir().unwrap();
        let mut settings = settings_in(&dir);
        settings.sources.insert(
            "newyorker".to_string(),
            SourceSettings {
                enabled: true,
                output_path: dir.path().join("data").join("newyorker").display().to_string(),
                tags: None,
                extra: Map::new(),
            },
        );

        setup_directories(&settings).await.unwrap();
        let data = dir.path().join("data");
        assert!(data.join("atlantic").is_dir());
        assert!(!data.join("economist").exists());
        assert!(!data.join("newyorker").exists());
    }

    #[test]
    fn test_enabled_sources_follow_settings_order() {
        let dir = tempdir().unwrap();
        let mut settings = settings_in(&dir);
        let atlantic = settings.sources.shift_remove("atlantic").unwrap();
        settings.sources.get_mut("economist").unwrap().enabled = true;
        settings.sources.insert("atlantic".to_string(), atlantic);

        let order: Vec<Source> = enabled_sources(&settings, None).map(|(source, _)| source).collect();
        assert_eq!(order, vec![Source::Economist, Source::Atlantic]);

        let only: Vec<Source> = enabled_sources(&settings, Some(Source::Atlantic))
            .map(|(source, _)| source)
            .collect();
        assert_eq!(only, vec![Source::Atlantic]);
    }

    #[tokio::test]
    async fn test_process_articles_skips_empty_sources() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        let fetcher = ScriptedFetcher::new();
        let mut by_source = IndexMap::new();
        by_source.insert("atlantic".to_string(), Vec::new());

        let results =
            process_articles(&fetcher, None::<&RecordingSink>, &settings, &by_source).await;
        assert!(results.is_empty());
        assert!(fetcher.calls().is_empty());
    }
}
