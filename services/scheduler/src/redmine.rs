//! HTTP client for the tracker's REST API.
//!
//! Built from explicit configuration; nothing here is global. All calls
//! carry the API key header and are bounded by a 30s timeout.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::engine::TicketService;

const API_KEY_HEADER: &str = "X-Redmine-API-Key";

/// Page size for paginated list endpoints (projects, users).
const PAGE_SIZE: u32 = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tracker API errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("tracker API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response from tracker API: {0}")]
    InvalidResponse(String),
}

/// Issue creation request.
#[derive(Debug, Clone, Serialize)]
pub struct NewIssue {
    pub project_id: i32,
    pub subject: String,
    pub description: String,
    pub tracker_id: i32,
    pub assigned_to_id: i32,
    pub priority_id: i32,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// Reference to a created issue.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueRef {
    pub id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i32,
    pub name: String,
    pub identifier: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    pub status: i32,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parent: Option<ProjectParent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectParent {
    pub id: i32,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracker {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_status_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub login: String,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub admin: Option<bool>,
    #[serde(default)]
    pub status: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueStatus {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub is_closed: bool,
}

#[derive(Debug, Serialize)]
struct NewIssueBody<'a> {
    issue: &'a NewIssue,
}

#[derive(Debug, Deserialize)]
struct IssueRefBody {
    issue: IssueRef,
}

#[derive(Debug, Deserialize)]
struct ProjectBody {
    project: Project,
}

#[derive(Debug, Deserialize)]
struct ProjectsPage {
    projects: Vec<Project>,
    #[serde(default)]
    total_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TrackersBody {
    trackers: Vec<Tracker>,
}

#[derive(Debug, Deserialize)]
struct UsersPage {
    users: Vec<User>,
    #[serde(default)]
    total_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct IssueStatusesBody {
    issue_statuses: Vec<IssueStatus>,
}

/// Error body shape used by the tracker API.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// API client for the tracker.
#[derive(Debug, Clone)]
pub struct RedmineClient {
    client: reqwest::Client,
    base_url: String,
}

impl RedmineClient {
    /// Create a new client from config.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(&config.redmine_api_key).context("Invalid API key format")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.redmine_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a URL for an endpoint.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        let response = self.client.get(self.url(path)).query(query).send().await?;

        self.handle_response(response).await
    }

    /// Fetch a project by id.
    pub async fn get_project(&self, project_id: i32) -> Result<Project, ServiceError> {
        let body: ProjectBody = self
            .get(&format!("/projects/{project_id}.json"), &[])
            .await?;
        Ok(body.project)
    }

    /// Fetch all projects, following offset pagination.
    pub async fn list_projects(&self) -> Result<Vec<Project>, ServiceError> {
        let mut projects = Vec::new();
        let mut offset = 0u32;

        loop {
            let page: ProjectsPage = self
                .get(
                    "/projects.json",
                    &[
                        ("offset", offset.to_string()),
                        ("limit", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;

            let fetched = page.projects.len() as u32;
            projects.extend(page.projects);
            offset += fetched;

            let done = match page.total_count {
                Some(total) => offset >= total,
                None => true,
            };
            if done || fetched == 0 {
                return Ok(projects);
            }
        }
    }

    /// Fetch all trackers.
    pub async fn list_trackers(&self) -> Result<Vec<Tracker>, ServiceError> {
        let body: TrackersBody = self.get("/trackers.json", &[]).await?;
        Ok(body.trackers)
    }

    /// Fetch all users, following offset pagination.
    pub async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        let mut users = Vec::new();
        let mut offset = 0u32;

        loop {
            let page: UsersPage = self
                .get(
                    "/users.json",
                    &[
                        ("offset", offset.to_string()),
                        ("limit", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;

            let fetched = page.users.len() as u32;
            users.extend(page.users);
            offset += fetched;

            let done = match page.total_count {
                Some(total) => offset >= total,
                None => true,
            };
            if done || fetched == 0 {
                return Ok(users);
            }
        }
    }

    /// Fetch all issue statuses.
    pub async fn list_issue_statuses(&self) -> Result<Vec<IssueStatus>, ServiceError> {
        let body: IssueStatusesBody = self.get("/issue_statuses.json", &[]).await?;
        Ok(body.issue_statuses)
    }

    /// Handle a successful or error response.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
        } else {
            self.handle_error(response).await
        }
    }

    /// Handle an error response.
    async fn handle_error<T>(&self, response: reqwest::Response) -> Result<T, ServiceError> {
        let status = response.status().as_u16();

        let body: ApiErrorBody = response
            .json()
            .await
            .unwrap_or_else(|_| ApiErrorBody { errors: Vec::new() });

        let message = if body.errors.is_empty() {
            "unknown error".to_string()
        } else {
            body.errors.join("; ")
        };

        Err(ServiceError::Api { status, message })
    }
}

#[async_trait]
impl TicketService for RedmineClient {
    async fn create_issue(&self, issue: &NewIssue) -> Result<IssueRef, ServiceError> {
        let response = self
            .client
            .post(self.url("/issues.json"))
            .json(&NewIssueBody { issue })
            .send()
            .await?;

        let body: IssueRefBody = self.handle_response(response).await?;
        Ok(body.issue)
    }

    async fn project_exists(&self, project_id: i32) -> Result<bool, ServiceError> {
        match self.get_project(project_id).await {
            Ok(_) => Ok(true),
            Err(ServiceError::Api { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn tracker_ids(&self) -> Result<Vec<i32>, ServiceError> {
        let trackers = self.list_trackers().await?;
        Ok(trackers.into_iter().map(|t| t.id).collect())
    }
}
