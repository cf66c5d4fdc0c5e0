// src/services/harvester.rs

//! Source harvester.
//!
//! Walks one source's listing page, fetches each thread's detail page and
//! turns the relevant ones into catalog records. Failures stay local: a bad
//! listing empties one source, a bad thread drops one thread.

use std::time::Duration;

use chrono::NaiveDate;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CacheConfig, HarvestConfig, ProblemRecord, SourceDefinition};
use crate::services::dom::{self, ThreadEntry};
use crate::services::{Extractor, Fetcher};
use crate::utils::{normalize_whitespace, resolve_url};

/// Result of harvesting one source.
#[derive(Debug, Default)]
pub struct HarvestOutcome {
    /// Candidate records in listing order
    pub records: Vec<ProblemRecord>,
    /// Thread entries taken from the listing (after the cap)
    pub threads_seen: usize,
    /// Entries without a usable title or link
    pub threads_skipped: usize,
    /// Threads whose detail page could not be fetched or read
    pub thread_failures: usize,
    /// Threads with neither a symptom nor a code
    pub irrelevant: usize,
    /// The listing page itself failed
    pub listing_failed: bool,
}

/// Per-run harvesting settings.
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub max_threads: usize,
    pub listing_ttl: Duration,
    pub thread_ttl: Duration,
}

impl HarvestSettings {
    pub fn new(harvest: &HarvestConfig, cache: &CacheConfig) -> Self {
        Self {
            max_threads: harvest.max_threads_per_source,
            listing_ttl: cache.listing_ttl(),
            thread_ttl: cache.thread_ttl(),
        }
    }
}

/// Service for harvesting fault threads from one forum at a time.
pub struct Harvester<'a> {
    fetcher: &'a Fetcher,
    extractor: &'a Extractor,
    settings: HarvestSettings,
}

/// A listing entry that passed the title/link checks.
struct ThreadRef {
    title: String,
    url: String,
}

impl<'a> Harvester<'a> {
    pub fn new(fetcher: &'a Fetcher, extractor: &'a Extractor, settings: HarvestSettings) -> Self {
        Self {
            fetcher,
            extractor,
            settings,
        }
    }

    /// Harvest one source. Never fails; problems are logged and counted.
    pub async fn harvest(&self, source: &SourceDefinition, today: NaiveDate) -> HarvestOutcome {
        let mut outcome = HarvestOutcome::default();

        let entries = match self.fetch_listing(source).await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("[{}] Listing unavailable, skipping source: {}", source.name, e);
                outcome.listing_failed = true;
                return outcome;
            }
        };
        outcome.threads_seen = entries.len();
        log::info!("[{}] {} threads on listing", source.name, entries.len());

        let base = Url::parse(&source.base_url).ok();
        let date_added = ProblemRecord::format_date(today);

        for entry in entries {
            let thread = match Self::thread_ref(entry, base.as_ref()) {
                Ok(thread) => thread,
                Err(e) => {
                    log::debug!("[{}] {}", source.name, e);
                    outcome.threads_skipped += 1;
                    continue;
                }
            };

            match self.harvest_thread(source, &thread, &date_added).await {
                Ok(Some(record)) => {
                    log::info!("[{}] + {}", source.name, record.title);
                    outcome.records.push(record);
                }
                Ok(None) => outcome.irrelevant += 1,
                Err(e) => {
                    log::warn!("[{}] Thread failed, skipping {}: {}", source.name, thread.url, e);
                    outcome.thread_failures += 1;
                }
            }
        }

        outcome
    }

    async fn fetch_listing(&self, source: &SourceDefinition) -> Result<Vec<ThreadEntry>> {
        let html = self
            .fetcher
            .fetch_cached(&source.listing_url, self.settings.listing_ttl)
            .await?;
        dom::thread_entries(&html, &source.selectors, self.settings.max_threads)
    }

    async fn harvest_thread(
        &self,
        source: &SourceDefinition,
        thread: &ThreadRef,
        date_added: &str,
    ) -> Result<Option<ProblemRecord>> {
        let html = self
            .fetcher
            .fetch_cached(&thread.url, self.settings.thread_ttl)
            .await?;
        let text = dom::page_text(&html, source.selectors.body.as_deref())?;

        let extraction = self.extractor.extract(&thread.title, &text);
        if !extraction.is_relevant() {
            return Ok(None);
        }

        Ok(Some(ProblemRecord {
            id: ProblemRecord::make_id(&source.name, &thread.url),
            title: thread.title.clone(),
            brand: extraction.brand,
            model: extraction.model,
            symptoms: extraction.symptoms,
            error_codes: extraction.error_codes,
            source_url: thread.url.clone(),
            source: source.name.clone(),
            date_added: date_added.to_string(),
        }))
    }

    fn thread_ref(entry: ThreadEntry, base: Option<&Url>) -> Result<ThreadRef> {
        let title = entry
            .title
            .map(|t| normalize_whitespace(&t))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::skipped("missing title"))?;
        let href = entry
            .href
            .ok_or_else(|| AppError::skipped(format!("missing link for '{title}'")))?;

        let url = match base {
            Some(base) => resolve_url(base, &href),
            None => Url::parse(&href).ok().map(|u| u.to_string()),
        }
        .ok_or_else(|| AppError::skipped(format!("unresolvable link '{href}'")))?;

        Ok(ThreadRef { title, url })
    }
}
