// src/types.rs
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inventory value type for every entry this engine writes
pub const SSL_CERTIFICATE: &str = "SSL_Certificate";

/// One certificate-transparency entry as returned by the discovery source
///
/// Fields stay optional here so that a missing field surfaces as a
/// malformed record during normalization instead of a decode failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRecord {
    /// One or more hostnames separated by newlines
    #[serde(rename = "name_value", alias = "name")]
    pub subject_names: Option<String>,

    /// When the log recorded the entry
    #[serde(rename = "entry_timestamp", alias = "logged_at")]
    pub observed_at: Option<String>,

    /// Certificate expiry, ISO-8601 text
    pub not_after: Option<String>,
}

impl RawRecord {
    pub fn new(
        subject_names: impl Into<String>,
        observed_at: impl Into<String>,
        not_after: impl Into<String>,
    ) -> Self {
        Self {
            subject_names: Some(subject_names.into()),
            observed_at: Some(observed_at.into()),
            not_after: Some(not_after.into()),
        }
    }
}

/// A raw record narrowed to a single hostname
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRecord {
    pub name: String,
    pub observed_at: DateTime<Utc>,
    pub not_after: String,
}

/// The most recent observation for one hostname
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestRecord {
    pub name: String,
    pub observed_at: DateTime<Utc>,
    pub not_after: String,
}

/// Hostname -> latest record, in first-seen order
pub type LatestSet = IndexMap<String, LatestRecord>;

/// Persistent asset row keyed by (domain, value_type, value_name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub domain: String,
    pub value_type: String,
    pub value_name: String,
    pub expiry_date: NaiveDate,
    pub discovered_date: NaiveDate,
    pub discovered_by: String,
}

impl InventoryEntry {
    pub fn key(&self) -> (String, String, String) {
        (
            self.domain.clone(),
            self.value_type.clone(),
            self.value_name.clone(),
        )
    }
}

impl fmt::Display for InventoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (expires {})",
            self.value_type, self.value_name, self.expiry_date
        )
    }
}

/// An inventory entry whose expiry moved during reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatedEntry {
    /// Entry as written, carrying the new expiry
    pub entry: InventoryEntry,
    pub previous_expiry: NaiveDate,
}

/// Inventory mutations performed by one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub created: Vec<InventoryEntry>,
    pub updated: Vec<UpdatedEntry>,
    pub unchanged: usize,
}

impl ChangeSet {
    /// True when nothing was written
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty()
    }

    /// Number of entries examined, written or not
    pub fn total(&self) -> usize {
        self.created.len() + self.updated.len() + self.unchanged
    }
}
