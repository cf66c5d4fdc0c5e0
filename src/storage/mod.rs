//! Persistence for fetched pages and the problem catalog.
//!
//! ## Directory Structure
//!
//! ```text
//! .cache/pages/
//! └── {sha256(url)}.html    # raw page, mtime = fetch time
//! _data/
//! └── problems.json         # canonical catalog
//! data/
//! └── problems.js           # script mirror of the catalog
//! ```

pub mod cache;
pub mod catalog;

// Re-export for convenience
pub use cache::{DiskCache, MemoryCache, PageCache, PageSource, get_or_fetch};
pub use catalog::{CatalogStore, MergeSummary, merge_records, upgrade_legacy_ids};
