// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains the catalog record, source definitions, keyword
//! vocabularies and the application configuration.

mod config;
mod problem;
mod source;
mod vocabulary;

// Re-export all public types
pub use config::{CacheConfig, CatalogConfig, Config, FetcherConfig, HarvestConfig};
pub use problem::ProblemRecord;
pub use source::{SourceDefinition, SourceSelectors};
pub use vocabulary::{BrandEntry, Vocabulary};
