//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{SourceDefinition, SourceSelectors, Vocabulary};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP, retry and throttling behavior
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Page cache location and lifetimes
    #[serde(default)]
    pub cache: CacheConfig,

    /// Per-source harvesting limits
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Catalog output settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Symptom and vehicle keyword lists
    #[serde(default)]
    pub vocabulary: Vocabulary,

    /// Forums to harvest
    #[serde(default = "defaults::sources")]
    pub sources: Vec<SourceDefinition>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.fetcher.max_attempts == 0 {
            return Err(AppError::validation("fetcher.max_attempts must be > 0"));
        }
        if self.fetcher.throttle_min_ms > self.fetcher.throttle_max_ms {
            return Err(AppError::validation(
                "fetcher.throttle_min_ms must not exceed fetcher.throttle_max_ms",
            ));
        }
        if self.harvest.max_threads_per_source == 0 {
            return Err(AppError::validation(
                "harvest.max_threads_per_source must be > 0",
            ));
        }
        if self.catalog.max_records == 0 {
            return Err(AppError::validation("catalog.max_records must be > 0"));
        }
        if !is_js_identifier(&self.catalog.mirror_variable) {
            return Err(AppError::validation(format!(
                "catalog.mirror_variable '{}' is not a valid identifier",
                self.catalog.mirror_variable
            )));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }

        let mut names = std::collections::HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(AppError::validation("source name is empty"));
            }
            if !names.insert(source.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            url::Url::parse(&source.base_url)?;
            url::Url::parse(&source.listing_url)?;
            for selector in source.selector_list() {
                scraper::Selector::parse(selector)
                    .map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            cache: CacheConfig::default(),
            harvest: HarvestConfig::default(),
            catalog: CatalogConfig::default(),
            vocabulary: Vocabulary::default(),
            sources: defaults::sources(),
        }
    }
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// HTTP client, retry and throttling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Total attempts per URL, including the first
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base backoff in milliseconds, doubled per attempt
    #[serde(default = "defaults::backoff")]
    pub backoff_ms: u64,

    /// Upper bound of the random jitter added on 429
    #[serde(default = "defaults::max_jitter")]
    pub max_jitter_ms: u64,

    /// Lower bound of the pause after each network fetch
    #[serde(default = "defaults::throttle_min")]
    pub throttle_min_ms: u64,

    /// Upper bound of the pause after each network fetch
    #[serde(default = "defaults::throttle_max")]
    pub throttle_max_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_attempts: defaults::max_attempts(),
            backoff_ms: defaults::backoff(),
            max_jitter_ms: defaults::max_jitter(),
            throttle_min_ms: defaults::throttle_min(),
            throttle_max_ms: defaults::throttle_max(),
        }
    }
}

/// Page cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one file per cached URL
    #[serde(default = "defaults::cache_dir")]
    pub dir: PathBuf,

    /// Lifetime of listing pages in seconds
    #[serde(default = "defaults::listing_ttl")]
    pub listing_ttl_secs: u64,

    /// Lifetime of thread pages in seconds
    #[serde(default = "defaults::thread_ttl")]
    pub thread_ttl_secs: u64,
}

impl CacheConfig {
    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_ttl_secs)
    }

    pub fn thread_ttl(&self) -> Duration {
        Duration::from_secs(self.thread_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: defaults::cache_dir(),
            listing_ttl_secs: defaults::listing_ttl(),
            thread_ttl_secs: defaults::thread_ttl(),
        }
    }
}

/// Per-source harvesting limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Threads taken from each listing page
    #[serde(default = "defaults::max_threads")]
    pub max_threads_per_source: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_threads_per_source: defaults::max_threads(),
        }
    }
}

/// Catalog output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Structured JSON file
    #[serde(default = "defaults::data_path")]
    pub data_path: PathBuf,

    /// Script-loadable mirror of the JSON file
    #[serde(default = "defaults::mirror_path")]
    pub mirror_path: PathBuf,

    /// Maximum number of persisted records
    #[serde(default = "defaults::max_records")]
    pub max_records: usize,

    /// Global variable assigned in the mirror (`window.<name>`)
    #[serde(default = "defaults::mirror_variable")]
    pub mirror_variable: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_path: defaults::data_path(),
            mirror_path: defaults::mirror_path(),
            max_records: defaults::max_records(),
            mirror_variable: defaults::mirror_variable(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{SourceDefinition, SourceSelectors};

    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; fault-harvester/0.1)".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn backoff() -> u64 {
        1000
    }
    pub fn max_jitter() -> u64 {
        1000
    }
    pub fn throttle_min() -> u64 {
        1000
    }
    pub fn throttle_max() -> u64 {
        1500
    }

    // Cache defaults
    pub fn cache_dir() -> PathBuf {
        PathBuf::from(".cache/pages")
    }
    pub fn listing_ttl() -> u64 {
        24 * 60 * 60
    }
    pub fn thread_ttl() -> u64 {
        7 * 24 * 60 * 60
    }

    // Harvest defaults
    pub fn max_threads() -> usize {
        10
    }

    // Catalog defaults
    pub fn data_path() -> PathBuf {
        PathBuf::from("_data/problems.json")
    }
    pub fn mirror_path() -> PathBuf {
        PathBuf::from("data/problems.js")
    }
    pub fn max_records() -> usize {
        500
    }
    pub fn mirror_variable() -> String {
        "problems".into()
    }

    // Source defaults
    pub fn sources() -> Vec<SourceDefinition> {
        vec![SourceDefinition {
            name: "drive2".to_string(),
            base_url: "https://drive2.ru".to_string(),
            listing_url: "https://drive2.ru/forums/elektrooborudovanie.107/".to_string(),
            selectors: SourceSelectors::xenforo(),
        }]
    }
}
