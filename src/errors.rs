//! Error types for the archiver.
//!
//! Most failures in the scraping and archiving path are swallowed where they
//! happen and surface to callers only as empty collections or `None`. This
//! enum exists so the layers below that point can still use `?` and so the
//! log lines carry a precise description of what went wrong.

use thiserror::Error;

/// Errors that can occur while fetching, archiving, or persisting data.
#[derive(Error, Debug)]
pub enum ArchiverError {
    /// A request could not be sent or its body could not be read.
    ///
    /// Covers DNS failures, refused connections, TLS errors and timeouts.
    #[error(transparent)]
    Network(#[from] reqwest::Error),

    /// Reading or writing a local file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The settings file or an API response was not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The interactive prompt could not read from the terminal.
    #[error(transparent)]
    Prompt(#[from] dialoguer::Error),

    /// Readwise rejected a document.
    #[error("Readwise rejected the document with status {status}: {body}")]
    ReadLater { status: u16, body: String },

    /// No Readwise token was configured.
    #[error("no Readwise access token configured")]
    MissingToken,
}
