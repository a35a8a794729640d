//! Database error types.

use thiserror::Error;

/// Database operation errors.
///
/// Any query failure is fatal for the remaining run: the engine runs over
/// a single shared connection scope and does not isolate per-row query
/// failures.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// The issue_statuses table defines no closed status and no override
    /// was configured.
    #[error("no closed status found in issue_statuses; set DONE_STATUS_IDS to override")]
    NoClosedStatuses,
}
