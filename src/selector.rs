// src/selector.rs
//! Picks the most recent observation per hostname

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::types::{FlatRecord, LatestRecord, LatestSet};

/// Running best for one hostname
struct Candidate {
    observed_at: DateTime<Utc>,
    not_after: String,
}

impl Candidate {
    /// Older than any real observation, so the first record always wins
    fn sentinel() -> Self {
        Self {
            observed_at: DateTime::<Utc>::MIN_UTC,
            not_after: String::new(),
        }
    }
}

/// Reduce flat records to one `LatestRecord` per hostname in one pass
///
/// A record replaces the running best only when strictly newer, so on
/// equal timestamps the first record seen is kept. Output order is the
/// order in which each hostname first appeared.
pub fn select_latest(records: Vec<FlatRecord>) -> LatestSet {
    let mut best: IndexMap<String, Candidate> = IndexMap::new();

    for record in records {
        let candidate = match best.entry(record.name) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => slot.insert(Candidate::sentinel()),
        };

        if record.observed_at > candidate.observed_at {
            candidate.observed_at = record.observed_at;
            candidate.not_after = record.not_after;
        }
    }

    best.into_iter()
        .map(|(name, candidate)| {
            let latest = LatestRecord {
                name: name.clone(),
                observed_at: candidate.observed_at,
                not_after: candidate.not_after,
            };
            (name, latest)
        })
        .collect()
}
