//! Debug dumps of fetched pages.

use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

/// Write `contents` to `path`, creating parent directories.
///
/// Dumps are best effort: a failed write is logged and otherwise ignored so
/// that diagnostics never stop a run.
pub async fn dump_html(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent).await {
            warn!(path = %parent.display(), error = %e, "Failed to create dump directory");
            return;
        }
    }
    match fs::write(path, contents).await {
        Ok(()) => info!(path = %path.display(), bytes = contents.len(), "Saved debug HTML"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to save debug HTML"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_dump_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deep").join("page.html");
        dump_html(&path, "<html></html>").await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html></html>");
    }

    #[tokio::test]
    async fn test_dump_failure_is_swallowed() {
        let dir = tempdir().unwrap();
        // A directory where the file should go makes the write fail.
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();
        dump_html(&path, "ignored").await;
        assert!(path.is_dir());
    }
}
