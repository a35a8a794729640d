use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::db::DbConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the tracker's REST API.
    pub redmine_url: String,
    pub redmine_api_key: String,
    /// Recurring-task catalog CSV.
    pub catalog_path: PathBuf,
    /// Directory for export snapshots.
    pub data_dir: PathBuf,
    /// When set, log lines are appended here in addition to stdout.
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    /// Override for the closed-status set. When absent the set is read
    /// from the store's issue_statuses table.
    pub done_status_ids: Option<Vec<i32>>,
    pub database: DbConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let redmine_url = std::env::var("REDMINE_URL").context("REDMINE_URL is not set")?;
        let redmine_api_key =
            std::env::var("REDMINE_API_KEY").context("REDMINE_API_KEY is not set")?;

        let catalog_path = std::env::var("CATALOG_PATH")
            .unwrap_or_else(|_| "data/periodic_tasks.csv".to_string())
            .into();

        let data_dir = std::env::var("DATA_DIR")
            .unwrap_or_else(|_| "data".to_string())
            .into();

        let log_file = std::env::var("LOG_FILE").ok().map(PathBuf::from);

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let done_status_ids = match std::env::var("DONE_STATUS_IDS") {
            Ok(raw) => Some(parse_status_ids(&raw)?),
            Err(_) => None,
        };

        let database = DbConfig::from_env();

        Ok(Self {
            redmine_url,
            redmine_api_key,
            catalog_path,
            data_dir,
            log_file,
            log_level,
            done_status_ids,
            database,
        })
    }
}

/// Parse a comma-separated list of status ids, e.g. `"5"` or `"3,5"`.
fn parse_status_ids(raw: &str) -> Result<Vec<i32>> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<i32>()
                .with_context(|| format!("invalid status id '{}' in DONE_STATUS_IDS", part.trim()))
        })
        .collect()
}
