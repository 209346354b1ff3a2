//! Newline-delimited URL lists.

use crate::errors::ArchiverError;
use itertools::Itertools;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `urls` to `path`, one per line with a trailing newline.
///
/// The parent directory is created when missing. An empty list produces an
/// empty file.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = urls.len()))]
pub async fn write_url_list(path: &Path, urls: &[String]) -> Result<(), ArchiverError> {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    let contents = urls.iter().map(|url| format!("{url}\n")).join("");
    fs::write(path, contents).await?;
    info!("Wrote URL list");
    Ok(())
}
