//! Recurrence engine.
//!
//! The engine owns no persistent state: each pass is a function from
//! (catalog, store snapshot, clock) to a set of issue-creation requests.
//! The store and the tracker API are the systems of record.
//!
//! Two entry points:
//! - [`run_rollover_check`]: spawn a successor for every template whose
//!   latest instance was completed.
//! - [`run_initial_seed`]: create the first instance of every template.
//!
//! Both isolate failures per catalog row; only store/query failures and
//! seed preflight failures abort a run.

mod due;
#[cfg(test)]
mod fakes;
mod rollover;
mod seed;

pub use due::{next_due_date, IntervalError};
pub use rollover::run_rollover_check;
pub use seed::run_initial_seed;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::db::DbError;
use crate::redmine::{IssueRef, NewIssue, ServiceError};

/// A row from the tracker's issues table.
#[derive(Debug, Clone)]
pub struct IssueRecord {
    pub id: i32,
    pub subject: String,
    pub description: Option<String>,
    pub project_id: i32,
    pub tracker_id: i32,
    pub assigned_to_id: Option<i32>,
    pub priority_id: i32,
    pub status_id: i32,
    pub created_on: NaiveDateTime,
    pub closed_on: Option<NaiveDateTime>,
}

/// Read access to the tracker's issue data.
#[async_trait]
pub trait IssueStore {
    /// The set of status ids that mean "done".
    async fn closed_status_ids(&self) -> Result<Vec<i32>, DbError>;

    /// Newest done issue for (subject, project), by closed_on.
    async fn latest_closed_issue(
        &self,
        subject: &str,
        project_id: i32,
        done: &[i32],
    ) -> Result<Option<IssueRecord>, DbError>;

    /// Count of non-done issues for (subject, project) created after the
    /// given instant.
    async fn open_successors_since(
        &self,
        subject: &str,
        project_id: i32,
        done: &[i32],
        created_after: NaiveDateTime,
    ) -> Result<i64, DbError>;

    /// Whether any issue at all exists for (subject, project). Used by
    /// the seeding duplicate rule only.
    async fn has_issue(&self, subject: &str, project_id: i32) -> Result<bool, DbError>;
}

/// Issue creation and reference lookups on the tracker API.
#[async_trait]
pub trait TicketService {
    async fn create_issue(&self, issue: &NewIssue) -> Result<IssueRef, ServiceError>;

    async fn project_exists(&self, project_id: i32) -> Result<bool, ServiceError>;

    async fn tracker_ids(&self) -> Result<Vec<i32>, ServiceError>;
}

/// Fatal engine errors. These abort the whole run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] DbError),

    /// Seed preflight could not reach the tracker API.
    #[error("tracker API unavailable: {0}")]
    Service(#[from] ServiceError),

    #[error("project {0} not found in the tracker")]
    MissingProject(i32),

    #[error("tracker {0} not found in the tracker")]
    MissingTracker(i32),
}

/// Per-row errors. These never abort the run.
#[derive(Debug, Error)]
pub enum RowError {
    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error("issue creation failed: {0}")]
    Service(#[from] ServiceError),

    /// Seeding needs a start_date; rollover never does.
    #[error("start_date is required for seeding")]
    MissingStartDate,
}

/// Failure of a single catalog row, keyed by the template's subject.
#[derive(Debug)]
pub struct RowFailure {
    pub subject: String,
    pub cause: RowError,
}

/// Aggregate outcome of one engine pass.
#[derive(Debug, Default)]
pub struct RunResult {
    pub created: usize,
    pub skipped: usize,
    pub errors: Vec<RowFailure>,
}
