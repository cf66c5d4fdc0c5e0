//! Service layer for the harvester.
//!
//! This module contains the business logic for:
//! - Resilient page fetching (`Fetcher`)
//! - Markup queries (`dom`)
//! - Fault signal extraction (`Extractor`)
//! - Per-source harvesting (`Harvester`)

pub mod dom;
mod extractor;
mod fetcher;
mod harvester;

pub use extractor::{Extraction, Extractor};
pub use fetcher::{Fetcher, RetryPolicy};
pub use harvester::{HarvestOutcome, HarvestSettings, Harvester};
