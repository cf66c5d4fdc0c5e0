// src/models/problem.rs

//! Problem record stored in the catalog.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::{short_digest, url_digest};

/// A forum thread classified as a vehicle electrical fault.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemRecord {
    /// Identity key: `{source}_{digest of source_url}`
    pub id: String,

    /// Thread title
    pub title: String,

    /// Uppercased brand token
    #[serde(default)]
    pub brand: Option<String>,

    /// Model token, only present together with a brand
    #[serde(default)]
    pub model: Option<String>,

    /// Matched symptom keywords
    #[serde(default)]
    pub symptoms: BTreeSet<String>,

    /// Diagnostic trouble codes, uppercase
    #[serde(default)]
    pub error_codes: BTreeSet<String>,

    /// Absolute URL of the thread
    pub source_url: String,

    /// Name of the originating source
    #[serde(default)]
    pub source: String,

    /// Ingestion date, `YYYY-MM-DD`
    pub date_added: String,
}

impl ProblemRecord {
    /// Build the identity key for a thread URL.
    ///
    /// The digest is SHA-256 over the URL bytes, so the same thread maps to
    /// the same id on every run and platform.
    pub fn make_id(source: &str, url: &str) -> String {
        format!("{}_{}", source, short_digest(&url_digest(url)))
    }

    /// Format an ingestion date the way it is stored.
    pub fn format_date(date: NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }
}
