//! Database layer.
//!
//! This module provides:
//! - Connection pool management
//! - The Postgres-backed issue store used by the recurrence engine
//! - A session advisory lock excluding overlapping runs
//!
//! The database layer uses SQLx with Postgres against the tracker's own
//! schema (`issues`, `issue_statuses`).

mod error;
mod issues;

pub use error::DbError;
pub use issues::PgIssueStore;

use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;
use std::time::Duration;
use tracing::info;

/// Advisory lock key identifying a taskmill run.
///
/// Two concurrent invocations would both pass the successor-exists check
/// before either creates an issue; the lock makes the second invocation
/// exit cleanly instead.
const RUN_LOCK_KEY: i64 = 815_211_001;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Connection acquire timeout.
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/redmine".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl DbConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/redmine".to_string());

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Self {
            database_url,
            max_connections,
            ..Default::default()
        }
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            max_connections = config.max_connections,
            "Connecting to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(DbError::Connect)?;

        info!("Database connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn health_check(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }

    /// Get an issue store handle.
    ///
    /// `done_override` replaces the closed-status lookup with an explicit
    /// set of status ids (the DONE_STATUS_IDS configuration).
    pub fn issue_store(&self, done_override: Option<Vec<i32>>) -> PgIssueStore {
        PgIssueStore::new(self.pool.clone(), done_override)
    }

    /// Try to acquire the run lock.
    ///
    /// Returns `None` when another run holds it. The lock is bound to a
    /// dedicated session held by the returned guard; release it at the
    /// end of the run (it also falls away when the process exits).
    pub async fn try_lock_run(&self) -> Result<Option<RunLock>, DbError> {
        let mut conn = self.pool.acquire().await.map_err(DbError::Query)?;

        let locked: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(RUN_LOCK_KEY)
            .fetch_one(conn.as_mut())
            .await
            .map_err(DbError::Query)?;

        if locked {
            Ok(Some(RunLock { conn }))
        } else {
            Ok(None)
        }
    }
}

/// Guard for the session advisory lock taken by [`Database::try_lock_run`].
pub struct RunLock {
    conn: PoolConnection<Postgres>,
}

impl RunLock {
    /// Release the lock and return the session to the pool.
    pub async fn release(mut self) -> Result<(), DbError> {
        sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(RUN_LOCK_KEY)
            .fetch_one(self.conn.as_mut())
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }
}
