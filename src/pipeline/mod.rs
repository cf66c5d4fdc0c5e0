//! Pipeline entry points.
//!
//! - `run_harvest`: fetch every source, extract, merge and persist the catalog

pub mod harvest;

pub use harvest::{RunSummary, build_fetcher, run_harvest};
