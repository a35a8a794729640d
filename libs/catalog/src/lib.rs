//! Recurring-task catalog.
//!
//! The catalog is a CSV file defining one recurring-task template per row.
//! Loading is all-or-nothing: any unreadable or malformed row rejects the
//! whole file, so a run never operates on a partial catalog.
//!
//! # Invariants
//!
//! - Row order is preserved (processing order follows file order).
//! - (subject, project_id) is the key used to correlate a template with
//!   issues in the tracker; the catalog is expected to hold at most one
//!   row per key. Duplicate keys are not rejected here — callers evaluate
//!   them independently.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Columns every catalog file must carry.
const REQUIRED_COLUMNS: &[&str] = &[
    "subject",
    "project_id",
    "tracker_id",
    "assigned_to_id",
    "priority_id",
    "description",
    "interval_type",
    "interval_value",
    "start_date",
];

/// Catalog loading errors. All of these are fatal for a run.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be opened or read.
    #[error("failed to read catalog {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// A required header column is absent.
    #[error("catalog is missing required column '{0}'")]
    MissingColumn(&'static str),

    /// A row failed to deserialize.
    #[error("malformed catalog row {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: csv::Error,
    },

    /// interval_value must be at least 1.
    #[error("interval_value must be positive (row {line}, subject '{subject}')")]
    ZeroInterval { line: usize, subject: String },
}

/// One recurring-task template.
///
/// `interval_type` is kept as the raw string from the file: an unknown
/// value is a per-row decision error at evaluation time, not a reason to
/// reject the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskTemplate {
    pub subject: String,
    pub project_id: i32,
    pub tracker_id: i32,
    pub assigned_to_id: i32,
    pub priority_id: i32,
    pub description: String,
    pub interval_type: String,
    pub interval_value: u32,
    /// Used only by initial seeding, never by rollover.
    #[serde(deserialize_with = "de_optional_date")]
    pub start_date: Option<NaiveDate>,
}

/// Deserialize a `YYYY-MM-DD` field where empty means absent.
///
/// Values are trimmed first; catalogs edited by hand tend to carry stray
/// whitespace around dates.
fn de_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(Some)
        .map_err(serde::de::Error::custom)
}

/// Load the catalog at `path`, preserving file order.
pub fn load_catalog(path: &Path) -> Result<Vec<TaskTemplate>, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CatalogError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;

    let headers = reader
        .headers()
        .map_err(|source| CatalogError::Unreadable {
            path: path.display().to_string(),
            source,
        })?
        .clone();

    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == *column) {
            return Err(CatalogError::MissingColumn(column));
        }
    }

    let mut templates = Vec::new();
    for (index, row) in reader.deserialize::<TaskTemplate>().enumerate() {
        // Header occupies line 1.
        let line = index + 2;
        let template = row.map_err(|source| CatalogError::Malformed { line, source })?;

        if template.interval_value == 0 {
            return Err(CatalogError::ZeroInterval {
                line,
                subject: template.subject,
            });
        }

        templates.push(template);
    }

    Ok(templates)
}
