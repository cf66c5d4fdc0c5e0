// src/storage/catalog.rs

//! Persistent problem catalog.
//!
//! The catalog is rewritten in full on every run, in two forms:
//!
//! ```text
//! _data/problems.json   # pretty-printed array of records
//! data/problems.js      # window.problems = <same array>;
//! ```
//!
//! Records are upserted by `id` and the result is capped at a fixed size,
//! keeping the first records in list order.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CatalogConfig, ProblemRecord, SourceDefinition};

/// Counts from one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Records in the saved catalog
    pub total: usize,
    /// New ids added and still present after the cap
    pub inserted: usize,
    /// Existing ids replaced and still present after the cap
    pub updated: usize,
    /// Records cut by the size cap
    pub dropped: usize,
}

/// Upsert `new` into `existing` by id and cap the result at `max_records`.
///
/// A replaced record keeps its position; unseen ids are appended in the
/// order given. Truncation keeps the first `max_records` of that order.
pub fn merge_records(
    existing: Vec<ProblemRecord>,
    new: Vec<ProblemRecord>,
    max_records: usize,
) -> (Vec<ProblemRecord>, MergeSummary) {
    let mut summary = MergeSummary::default();
    let mut records: Vec<ProblemRecord> = Vec::with_capacity(existing.len() + new.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    // Loaded data may already hold duplicates; the later copy wins.
    for record in existing {
        upsert(&mut records, &mut positions, record);
    }

    let mut inserted = HashSet::new();
    let mut updated = HashSet::new();
    for record in new {
        let id = record.id.clone();
        if upsert(&mut records, &mut positions, record) {
            inserted.insert(id);
        } else if !inserted.contains(&id) {
            updated.insert(id);
        }
    }

    if records.len() > max_records {
        summary.dropped = records.len() - max_records;
        records.truncate(max_records);
    }
    summary.total = records.len();
    summary.inserted = records.iter().filter(|r| inserted.contains(&r.id)).count();
    summary.updated = records.iter().filter(|r| updated.contains(&r.id)).count();

    (records, summary)
}

/// Re-key records whose id is the bare thread URL, as older catalogs stored them.
///
/// The record's own source is used when set; otherwise the configured source
/// with the same host as the thread URL. Records with no matching source are
/// left alone. Returns how many records were re-keyed.
pub fn upgrade_legacy_ids(records: &mut [ProblemRecord], sources: &[SourceDefinition]) -> usize {
    let mut upgraded = 0;
    for record in records.iter_mut().filter(|r| r.id == r.source_url) {
        let source = if record.source.is_empty() {
            match source_for_url(&record.source_url, sources) {
                Some(name) => name.to_string(),
                None => continue,
            }
        } else {
            record.source.clone()
        };
        record.id = ProblemRecord::make_id(&source, &record.source_url);
        record.source = source;
        upgraded += 1;
    }
    upgraded
}

fn source_for_url<'a>(url: &str, sources: &'a [SourceDefinition]) -> Option<&'a str> {
    let host = bare_host(url)?;
    sources
        .iter()
        .find(|s| bare_host(&s.base_url).as_deref() == Some(host.as_str()))
        .map(|s| s.name.as_str())
}

fn bare_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_lowercase())
}

/// Insert or replace by id. Returns `true` when the id was not present.
fn upsert(
    records: &mut Vec<ProblemRecord>,
    positions: &mut HashMap<String, usize>,
    record: ProblemRecord,
) -> bool {
    match positions.get(&record.id) {
        Some(&index) => {
            records[index] = record;
            false
        }
        None => {
            positions.insert(record.id.clone(), records.len());
            records.push(record);
            true
        }
    }
}

/// File-backed catalog store.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    data_path: PathBuf,
    mirror_path: PathBuf,
    max_records: usize,
    mirror_variable: String,
}

impl CatalogStore {
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            data_path: config.data_path.clone(),
            mirror_path: config.mirror_path.clone(),
            max_records: config.max_records,
            mirror_variable: config.mirror_variable.clone(),
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn mirror_path(&self) -> &Path {
        &self.mirror_path
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Load the persisted catalog.
    ///
    /// A missing file is an empty catalog. A file that cannot be parsed is
    /// logged and also treated as empty; the next save replaces it.
    pub async fn load(&self) -> Result<Vec<ProblemRecord>> {
        let bytes = match tokio::fs::read(&self.data_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No catalog at {}, starting empty", self.data_path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        match parse_catalog(&self.data_path, &bytes) {
            Ok(records) => Ok(records),
            Err(error) => {
                log::warn!("{}. Starting with an empty catalog.", error);
                Ok(Vec::new())
            }
        }
    }

    /// Merge `new` into `existing` and persist both output forms.
    pub async fn merge_and_save(
        &self,
        existing: Vec<ProblemRecord>,
        new: Vec<ProblemRecord>,
    ) -> Result<MergeSummary> {
        let (records, summary) = merge_records(existing, new, self.max_records);
        self.save(&records).await?;
        Ok(summary)
    }

    /// Write the structured file and its script mirror.
    pub async fn save(&self, records: &[ProblemRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        write_bytes(&self.data_path, json.as_bytes()).await?;

        let mirror = render_mirror(&self.mirror_variable, &json);
        write_bytes(&self.mirror_path, mirror.as_bytes()).await?;

        log::info!(
            "Catalog saved: {} records to {} and {}",
            records.len(),
            self.data_path.display(),
            self.mirror_path.display()
        );
        Ok(())
    }
}

/// Parse catalog bytes, classifying bad content as `AppError::CorruptCatalog`.
fn parse_catalog(path: &Path, bytes: &[u8]) -> Result<Vec<ProblemRecord>> {
    serde_json::from_slice(bytes).map_err(|e| AppError::CorruptCatalog {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Wrap catalog JSON in a global assignment for browser scripts.
pub fn render_mirror(variable: &str, json: &str) -> String {
    format!("window.{} = {};\n", variable, json)
}

/// Write bytes atomically (write to temp, then rename).
async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
