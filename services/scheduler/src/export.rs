//! Reference-data snapshots.
//!
//! Each export fetches one collection from the tracker API and writes it
//! to `<data_dir>/<name>_<timestamp>.csv`. Exports are independent:
//! `export_all` keeps going when one fails and reports at the end.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::redmine::{RedmineClient, ServiceError};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to fetch {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error("failed to create {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("{failed} of 4 exports failed")]
    Partial { failed: usize },
}

#[derive(Debug, Serialize)]
struct ProjectRow {
    id: i32,
    name: String,
    identifier: String,
    description: Option<String>,
    homepage: Option<String>,
    status: i32,
    created_on: Option<chrono::DateTime<Utc>>,
    updated_on: Option<chrono::DateTime<Utc>>,
    parent_id: Option<i32>,
}

#[derive(Debug, Serialize)]
struct TrackerRow {
    id: i32,
    name: String,
    description: Option<String>,
    default_status_id: Option<i32>,
}

#[derive(Debug, Serialize)]
struct UserRow {
    id: i32,
    login: String,
    firstname: Option<String>,
    lastname: Option<String>,
    mail: Option<String>,
    admin: Option<bool>,
    status: Option<i32>,
}

#[derive(Debug, Serialize)]
struct StatusRow {
    id: i32,
    name: String,
    is_closed: bool,
}

/// Export all projects. Returns the written file's path.
pub async fn export_projects(
    client: &RedmineClient,
    data_dir: &Path,
) -> Result<PathBuf, ExportError> {
    let projects = client.list_projects().await.map_err(|source| {
        ExportError::Fetch {
            what: "projects",
            source,
        }
    })?;

    let rows: Vec<ProjectRow> = projects
        .into_iter()
        .map(|p| ProjectRow {
            id: p.id,
            name: p.name,
            identifier: p.identifier,
            description: p.description,
            homepage: p.homepage,
            status: p.status,
            created_on: p.created_on,
            updated_on: p.updated_on,
            parent_id: p.parent.map(|parent| parent.id),
        })
        .collect();

    write_rows(data_dir, "projects", &rows)
}

/// Export all trackers. Returns the written file's path.
pub async fn export_trackers(
    client: &RedmineClient,
    data_dir: &Path,
) -> Result<PathBuf, ExportError> {
    let trackers = client.list_trackers().await.map_err(|source| {
        ExportError::Fetch {
            what: "trackers",
            source,
        }
    })?;

    let rows: Vec<TrackerRow> = trackers
        .into_iter()
        .map(|t| TrackerRow {
            id: t.id,
            name: t.name,
            description: t.description,
            default_status_id: t.default_status_id,
        })
        .collect();

    write_rows(data_dir, "trackers", &rows)
}

/// Export all users. Returns the written file's path.
pub async fn export_users(
    client: &RedmineClient,
    data_dir: &Path,
) -> Result<PathBuf, ExportError> {
    let users = client.list_users().await.map_err(|source| {
        ExportError::Fetch {
            what: "users",
            source,
        }
    })?;

    let rows: Vec<UserRow> = users
        .into_iter()
        .map(|u| UserRow {
            id: u.id,
            login: u.login,
            firstname: u.firstname,
            lastname: u.lastname,
            mail: u.mail,
            admin: u.admin,
            status: u.status,
        })
        .collect();

    write_rows(data_dir, "users", &rows)
}

/// Export all issue statuses. Returns the written file's path.
pub async fn export_statuses(
    client: &RedmineClient,
    data_dir: &Path,
) -> Result<PathBuf, ExportError> {
    let statuses = client.list_issue_statuses().await.map_err(|source| {
        ExportError::Fetch {
            what: "issue statuses",
            source,
        }
    })?;

    let rows: Vec<StatusRow> = statuses
        .into_iter()
        .map(|s| StatusRow {
            id: s.id,
            name: s.name,
            is_closed: s.is_closed,
        })
        .collect();

    write_rows(data_dir, "issue_statuses", &rows)
}

/// Run every export, continuing through individual failures.
pub async fn export_all(client: &RedmineClient, data_dir: &Path) -> Result<(), ExportError> {
    let mut failed = 0;

    if let Err(e) = export_projects(client, data_dir).await {
        warn!(error = %e, "Projects export failed");
        failed += 1;
    }
    if let Err(e) = export_trackers(client, data_dir).await {
        warn!(error = %e, "Trackers export failed");
        failed += 1;
    }
    if let Err(e) = export_users(client, data_dir).await {
        warn!(error = %e, "Users export failed");
        failed += 1;
    }
    if let Err(e) = export_statuses(client, data_dir).await {
        warn!(error = %e, "Issue statuses export failed");
        failed += 1;
    }

    if failed > 0 {
        Err(ExportError::Partial { failed })
    } else {
        Ok(())
    }
}

fn write_rows<T: Serialize>(
    data_dir: &Path,
    name: &str,
    rows: &[T],
) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(data_dir).map_err(|source| ExportError::Io {
        path: data_dir.display().to_string(),
        source,
    })?;

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = data_dir.join(format!("{name}_{timestamp}.csv"));

    let mut writer = csv::Writer::from_path(&path).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })?;

    for row in rows {
        writer.serialize(row).map_err(|source| ExportError::Write {
            path: path.display().to_string(),
            source,
        })?;
    }

    writer.flush().map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;

    info!(path = %path.display(), rows = rows.len(), "Export written");

    Ok(path)
}
