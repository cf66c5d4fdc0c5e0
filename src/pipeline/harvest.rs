// src/pipeline/harvest.rs

//! Full harvest run: every source, then one catalog merge.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::models::Config;
use crate::services::{Extractor, Fetcher, HarvestSettings, Harvester, RetryPolicy};
use crate::storage::{CatalogStore, DiskCache, MergeSummary, upgrade_legacy_ids};
use crate::utils::http::ReqwestTransport;
use crate::utils::log as console;

/// Totals for one run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub sources_total: usize,
    pub sources_failed: usize,
    pub threads_seen: usize,
    pub threads_skipped: usize,
    pub thread_failures: usize,
    pub candidates: usize,
    pub merge: MergeSummary,
}

/// Build the production fetcher: reqwest transport and on-disk cache.
pub fn build_fetcher(config: &Config) -> Result<Fetcher> {
    let transport = ReqwestTransport::from_config(&config.fetcher)?;
    let cache = DiskCache::new(&config.cache.dir);
    Ok(Fetcher::new(
        Arc::new(transport),
        Arc::new(cache),
        RetryPolicy::from(&config.fetcher),
    ))
}

/// Harvest every configured source and merge the results into the catalog.
///
/// Network and parsing problems are absorbed per source or per thread;
/// only a failure to write the catalog ends the run with an error.
pub async fn run_harvest(
    config: &Config,
    fetcher: &Fetcher,
    catalog: &CatalogStore,
    today: NaiveDate,
) -> Result<RunSummary> {
    let start_time = Utc::now();
    console::header("Harvesting electrical fault threads");

    let mut existing = catalog.load().await?;
    log::info!("Loaded {} existing records", existing.len());
    let upgraded = upgrade_legacy_ids(&mut existing, &config.sources);
    if upgraded > 0 {
        log::info!("Re-keyed {} records with URL ids", upgraded);
    }

    let extractor = Extractor::new(&config.vocabulary)?;
    let harvester = Harvester::new(
        fetcher,
        &extractor,
        HarvestSettings::new(&config.harvest, &config.cache),
    );

    let total = config.sources.len();
    let mut candidates = Vec::new();
    let mut sources_failed = 0;
    let mut threads_seen = 0;
    let mut threads_skipped = 0;
    let mut thread_failures = 0;

    for (i, source) in config.sources.iter().enumerate() {
        console::step(i + 1, total, &format!("{} ({})", source.name, source.listing_url));

        let outcome = harvester.harvest(source, today).await;
        if outcome.listing_failed {
            sources_failed += 1;
        }
        threads_seen += outcome.threads_seen;
        threads_skipped += outcome.threads_skipped;
        thread_failures += outcome.thread_failures;

        console::sub_item(&format!(
            "{} candidates, {} irrelevant, {} skipped, {} failed",
            outcome.records.len(),
            outcome.irrelevant,
            outcome.threads_skipped,
            outcome.thread_failures
        ));
        candidates.extend(outcome.records);
    }

    let candidate_count = candidates.len();
    let merge = catalog.merge_and_save(existing, candidates).await?;

    let summary = RunSummary {
        start_time,
        end_time: Utc::now(),
        sources_total: total,
        sources_failed,
        threads_seen,
        threads_skipped,
        thread_failures,
        candidates: candidate_count,
        merge,
    };

    console::summary(
        "Harvest complete",
        &[
            ("Sources", format!("{} ({} failed)", total, sources_failed)),
            ("Threads seen", threads_seen.to_string()),
            ("Candidates", candidate_count.to_string()),
            ("Inserted", merge.inserted.to_string()),
            ("Updated", merge.updated.to_string()),
            ("Dropped by cap", merge.dropped.to_string()),
            ("Total records", merge.total.to_string()),
            (
                "Elapsed",
                format!(
                    "{:.1}s",
                    (summary.end_time - start_time).num_milliseconds() as f64 / 1000.0
                ),
            ),
        ],
    );

    Ok(summary)
}
