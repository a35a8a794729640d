//! In-memory store and service fakes for engine tests.
//!
//! The service shares the store's issue list, so an issue created through
//! the fake service is visible to subsequent store queries in the same
//! test, mirroring the real store-plus-API pair.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use taskmill_catalog::TaskTemplate;

use crate::db::DbError;
use crate::redmine::{IssueRef, NewIssue, ServiceError};

use super::{IssueRecord, IssueStore, TicketService};

pub const DONE_STATUS: i32 = 9;
pub const OPEN_STATUS: i32 = 1;

pub fn template(subject: &str, project_id: i32, interval_type: &str, value: u32) -> TaskTemplate {
    TaskTemplate {
        subject: subject.to_string(),
        project_id,
        tracker_id: 2,
        assigned_to_id: 3,
        priority_id: 2,
        description: format!("{subject} description"),
        interval_type: interval_type.to_string(),
        interval_value: value,
        start_date: None,
    }
}

pub fn closed_issue(subject: &str, project_id: i32, closed_on: DateTime<Utc>) -> IssueRecord {
    IssueRecord {
        id: 100,
        subject: subject.to_string(),
        description: None,
        project_id,
        tracker_id: 2,
        assigned_to_id: Some(3),
        priority_id: 2,
        status_id: DONE_STATUS,
        created_on: closed_on.naive_utc() - chrono::Duration::days(30),
        closed_on: Some(closed_on.naive_utc()),
    }
}

pub struct FakeStore {
    pub issues: Arc<Mutex<Vec<IssueRecord>>>,
    pub done: Vec<i32>,
}

impl FakeStore {
    pub fn empty() -> Self {
        Self {
            issues: Arc::new(Mutex::new(Vec::new())),
            done: vec![DONE_STATUS],
        }
    }

    pub fn push(&self, issue: IssueRecord) {
        self.issues.lock().unwrap().push(issue);
    }
}

#[async_trait]
impl IssueStore for FakeStore {
    async fn closed_status_ids(&self) -> Result<Vec<i32>, DbError> {
        Ok(self.done.clone())
    }

    async fn latest_closed_issue(
        &self,
        subject: &str,
        project_id: i32,
        done: &[i32],
    ) -> Result<Option<IssueRecord>, DbError> {
        let issues = self.issues.lock().unwrap();
        Ok(issues
            .iter()
            .filter(|i| {
                i.subject == subject && i.project_id == project_id && done.contains(&i.status_id)
            })
            .max_by_key(|i| i.closed_on)
            .cloned())
    }

    async fn open_successors_since(
        &self,
        subject: &str,
        project_id: i32,
        done: &[i32],
        created_after: NaiveDateTime,
    ) -> Result<i64, DbError> {
        let issues = self.issues.lock().unwrap();
        Ok(issues
            .iter()
            .filter(|i| {
                i.subject == subject
                    && i.project_id == project_id
                    && !done.contains(&i.status_id)
                    && i.created_on > created_after
            })
            .count() as i64)
    }

    async fn has_issue(&self, subject: &str, project_id: i32) -> Result<bool, DbError> {
        let issues = self.issues.lock().unwrap();
        Ok(issues
            .iter()
            .any(|i| i.subject == subject && i.project_id == project_id))
    }
}

pub struct FakeService {
    issues: Arc<Mutex<Vec<IssueRecord>>>,
    pub created: Mutex<Vec<NewIssue>>,
    fail_subjects: HashSet<String>,
    next_id: AtomicI32,
    pub projects: Vec<i32>,
    pub trackers: Vec<i32>,
}

impl FakeService {
    pub fn sharing(store: &FakeStore) -> Self {
        Self {
            issues: Arc::clone(&store.issues),
            created: Mutex::new(Vec::new()),
            fail_subjects: HashSet::new(),
            next_id: AtomicI32::new(1000),
            projects: vec![1, 2],
            trackers: vec![1, 2],
        }
    }

    /// Make creation fail for the given subject.
    pub fn failing_on(mut self, subject: &str) -> Self {
        self.fail_subjects.insert(subject.to_string());
        self
    }

    pub fn with_projects(mut self, projects: Vec<i32>) -> Self {
        self.projects = projects;
        self
    }

    pub fn with_trackers(mut self, trackers: Vec<i32>) -> Self {
        self.trackers = trackers;
        self
    }
}

#[async_trait]
impl TicketService for FakeService {
    async fn create_issue(&self, issue: &NewIssue) -> Result<IssueRef, ServiceError> {
        if self.fail_subjects.contains(&issue.subject) {
            return Err(ServiceError::Api {
                status: 500,
                message: "internal error".to_string(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.issues.lock().unwrap().push(IssueRecord {
            id,
            subject: issue.subject.clone(),
            description: Some(issue.description.clone()),
            project_id: issue.project_id,
            tracker_id: issue.tracker_id,
            assigned_to_id: Some(issue.assigned_to_id),
            priority_id: issue.priority_id,
            status_id: OPEN_STATUS,
            created_on: Utc::now().naive_utc(),
            closed_on: None,
        });
        self.created.lock().unwrap().push(issue.clone());

        Ok(IssueRef { id })
    }

    async fn project_exists(&self, project_id: i32) -> Result<bool, ServiceError> {
        Ok(self.projects.contains(&project_id))
    }

    async fn tracker_ids(&self) -> Result<Vec<i32>, ServiceError> {
        Ok(self.trackers.clone())
    }
}
