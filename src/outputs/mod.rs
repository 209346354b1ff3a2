//! Flat-file artifacts written while a run progresses.
//!
//! Nothing here is read back by the program; the files exist so an operator
//! can see what each stage produced.
//!
//! # Submodules
//!
//! - [`text`]: newline-delimited URL lists
//! - [`html`]: raw page dumps for diagnosing scraper breakage
//!
//! # Output Structure
//!
//! ```text
//! <source output_path>/
//! ├── backissues_debug.html      # Atlantic listing page
//! ├── archive_debug.html         # Economist listing page
//! ├── atlantic_issue.html        # issue page (economist_issue.html)
//! ├── article_tags.txt           # Atlantic tags the links came from
//! ├── articles.txt               # extracted article URLs
//! └── archives/
//!     ├── archive_links.txt      # archive.today submission URLs
//!     └── final_archive_links.txt
//! ```

pub mod html;
pub mod text;
