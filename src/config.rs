//! JSON settings store.
//!
//! The settings file keeps the Readwise token, the output locations, the
//! per-source switches, and the archive retry knobs. Keys this program does
//! not know about are carried through load/save untouched, and missing keys
//! fall back to [`Settings::default`].

use crate::errors::ArchiverError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use indexmap::IndexMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Readwise Reader access token.
    #[serde(default)]
    pub readwise_token: Option<String>,
    /// Root directory for all artifacts.
    #[serde(default = "default_output_directory")]
    pub output_directory: String,
    /// Per-source settings keyed by source name.
    #[serde(default = "default_sources")]
    pub sources: IndexMap<String, SourceSettings>,
    /// Archive retry and pacing knobs.
    #[serde(default)]
    pub archive: ArchiveSettings,
    /// Keys this version does not recognise.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Settings for a single news source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Directory for this source's artifacts. Empty means
    /// `<output_directory>/<source name>`.
    #[serde(default)]
    pub output_path: String,
    /// Readwise tags. `None` tags documents with the source name; an empty
    /// list lets Readwise tagging fall back to the document's domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Retry, pacing and concurrency knobs for archive resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    /// Attempts per archive stage.
    pub max_retries: u32,
    /// Delay between attempts.
    pub retry_delay_ms: u64,
    /// Multiplier on `retry_delay_ms` after an HTTP 429.
    pub rate_limit_multiplier: u32,
    /// Whether a 429 consumes one of `max_retries`.
    pub rate_limit_counts_toward_budget: bool,
    /// 429 responses tolerated when they do not count toward `max_retries`.
    pub max_rate_limited_retries: u32,
    /// Pause after each article before starting the next.
    pub pause_ms: u64,
    /// Deadline for any single HTTP request.
    pub request_timeout_secs: u64,
    /// Articles resolved at the same time.
    pub concurrency: usize,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 2000,
            rate_limit_multiplier: 2,
            rate_limit_counts_toward_budget: true,
            max_rate_limited_retries: 3,
            pause_ms: 1000,
            request_timeout_secs: 30,
            concurrency: 1,
        }
    }
}

fn default_output_directory() -> String {
    "data".to_string()
}

fn default_sources() -> IndexMap<String, SourceSettings> {
    let mut sources = IndexMap::new();
    sources.insert(
        "atlantic".to_string(),
        SourceSettings {
            enabled: true,
            output_path: "data/atlantic".to_string(),
            tags: Some(vec!["the atlantic".to_string()]),
            extra: Map::new(),
        },
    );
    sources.insert(
        "economist".to_string(),
        SourceSettings {
            enabled: false,
            output_path: "data/economist".to_string(),
            tags: Some(vec!["the economist".to_string()]),
            extra: Map::new(),
        },
    );
    sources
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            readwise_token: None,
            output_directory: default_output_directory(),
            sources: default_sources(),
            archive: ArchiveSettings::default(),
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// A missing file is created with the defaults. A file that is not valid
    /// JSON is left alone and the defaults are used for this run.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the JSON settings file
    ///
    /// # Returns
    ///
    /// The parsed settings, with missing keys filled from
    /// [`Settings::default`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file exists but cannot be read
    /// - The file is missing and the defaults cannot be written in its place
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ArchiverError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Config file not found; creating default configuration");
                let settings = Settings::default();
                settings.save(path)?;
                return Ok(settings);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!(error = %e, "Could not parse config file; using default configuration");
                Ok(Settings::default())
            }
        }
    }

    /// Write settings to `path` as pretty-printed JSON.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<(), ArchiverError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Configuration saved");
        Ok(())
    }

    /// Directory where a source writes its artifacts.
    pub fn output_path_for(&self, name: &str) -> PathBuf {
        match self.sources.get(name) {
            Some(source) if !source.output_path.is_empty() => PathBuf::from(&source.output_path),
            _ => Path::new(&self.output_directory).join(name),
        }
    }

    /// Readwise tags for documents from a source.
    pub fn tags_for(&self, name: &str) -> Vec<String> {
        self.sources
            .get(name)
            .and_then(|s| s.tags.clone())
            .unwrap_or_else(|| vec![name.to_string()])
    }
}

/// Store a Readwise token in the settings file at `path`.
pub fn set_readwise_token(path: &Path, token: &str) -> Result<(), ArchiverError> {
    let mut settings = Settings::load(path)?;
    settings.readwise_token = Some(token.to_string());
    settings.save(path)
}
