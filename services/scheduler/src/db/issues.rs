//! Postgres-backed issue store.
//!
//! Read-only queries against the tracker's `issues` and `issue_statuses`
//! tables. Issue creation goes through the tracker's REST API, never
//! through the database.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::engine::{IssueRecord, IssueStore};

use super::DbError;

impl<'r> sqlx::FromRow<'r, PgRow> for IssueRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            subject: row.try_get("subject")?,
            description: row.try_get("description")?,
            project_id: row.try_get("project_id")?,
            tracker_id: row.try_get("tracker_id")?,
            assigned_to_id: row.try_get("assigned_to_id")?,
            priority_id: row.try_get("priority_id")?,
            status_id: row.try_get("status_id")?,
            created_on: row.try_get("created_on")?,
            closed_on: row.try_get("closed_on")?,
        })
    }
}

/// Issue store backed by the tracker's Postgres schema.
pub struct PgIssueStore {
    pool: PgPool,
    done_override: Option<Vec<i32>>,
}

impl PgIssueStore {
    /// Create a new store. `done_override`, when set, is returned from
    /// [`IssueStore::closed_status_ids`] instead of querying
    /// `issue_statuses`.
    pub fn new(pool: PgPool, done_override: Option<Vec<i32>>) -> Self {
        Self {
            pool,
            done_override,
        }
    }
}

#[async_trait]
impl IssueStore for PgIssueStore {
    async fn closed_status_ids(&self) -> Result<Vec<i32>, DbError> {
        if let Some(ids) = &self.done_override {
            return Ok(ids.clone());
        }

        let ids: Vec<i32> = sqlx::query_scalar("SELECT id FROM issue_statuses WHERE is_closed")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Query)?;

        if ids.is_empty() {
            return Err(DbError::NoClosedStatuses);
        }

        Ok(ids)
    }

    async fn latest_closed_issue(
        &self,
        subject: &str,
        project_id: i32,
        done: &[i32],
    ) -> Result<Option<IssueRecord>, DbError> {
        sqlx::query_as::<_, IssueRecord>(
            r#"
            SELECT id, subject, description, project_id, tracker_id,
                   assigned_to_id, priority_id, status_id, created_on, closed_on
            FROM issues
            WHERE subject = $1
              AND project_id = $2
              AND status_id = ANY($3)
            ORDER BY closed_on DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(subject)
        .bind(project_id)
        .bind(done)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn open_successors_since(
        &self,
        subject: &str,
        project_id: i32,
        done: &[i32],
        created_after: NaiveDateTime,
    ) -> Result<i64, DbError> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM issues
            WHERE subject = $1
              AND project_id = $2
              AND NOT (status_id = ANY($3))
              AND created_on > $4
            "#,
        )
        .bind(subject)
        .bind(project_id)
        .bind(done)
        .bind(created_after)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn has_issue(&self, subject: &str, project_id: i32) -> Result<bool, DbError> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM issues WHERE subject = $1 AND project_id = $2)",
        )
        .bind(subject)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)
    }
}
