// src/normalizer.rs
//! Flattens raw CT entries into one record per hostname

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::error::PipelineError;
use crate::reconciler::expiry_date;
use crate::types::{FlatRecord, RawRecord};

const NAME_SEPARATOR: char = '\n';

/// Expand every raw record into one `FlatRecord` per listed hostname
///
/// Any record missing a field, listing no hostname, carrying an
/// unparseable timestamp or a `not_after` without a leading date fails
/// the whole batch.
pub fn normalize(records: &[RawRecord]) -> Result<Vec<FlatRecord>, PipelineError> {
    let mut flat = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let locator = format!("record #{}", index);

        let subject_names = record
            .subject_names
            .as_deref()
            .ok_or_else(|| PipelineError::malformed(&locator, "missing name"))?;
        let observed_raw = record
            .observed_at
            .as_deref()
            .ok_or_else(|| PipelineError::malformed(&locator, "missing observation timestamp"))?;
        let not_after = record
            .not_after
            .as_deref()
            .ok_or_else(|| PipelineError::malformed(&locator, "missing not_after"))?;

        let observed_at = parse_timestamp(observed_raw).ok_or_else(|| {
            PipelineError::malformed(
                &locator,
                format!("unparseable observation timestamp '{}'", observed_raw),
            )
        })?;

        if expiry_date(not_after).is_none() {
            return Err(PipelineError::malformed(
                &locator,
                format!("not_after '{}' does not start with a YYYY-MM-DD date", not_after),
            ));
        }

        let before = flat.len();
        for name in subject_names
            .split(NAME_SEPARATOR)
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            flat.push(FlatRecord {
                name: name.to_string(),
                observed_at,
                not_after: not_after.to_string(),
            });
        }

        if flat.len() == before {
            return Err(PipelineError::malformed(&locator, "no hostname in name field"));
        }
    }

    debug!("Normalized {} raw records into {} flat records", records.len(), flat.len());

    Ok(flat)
}

/// Parse a CT log timestamp; naive forms are taken as UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}
