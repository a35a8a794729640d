//! Initial seeding: create the first instance of every catalog template.

use std::time::Duration;

use taskmill_catalog::TaskTemplate;
use tracing::{debug, info, warn};

use super::due::next_due_date;
use super::{EngineError, IssueStore, RowError, RowFailure, RunResult, TicketService};
use crate::redmine::NewIssue;

#[derive(Debug)]
enum SeedOutcome {
    /// The seeding duplicate rule: skip when any issue with the same
    /// subject and project already exists. This is deliberately stricter
    /// than the rollover rule, which only looks at non-done issues newer
    /// than the latest completed instance.
    AlreadyExists,
    Created { issue_id: i32 },
    Failed(RowError),
}

/// Seed the first instance of every template, in catalog order.
///
/// Preflight verifies that every project and tracker referenced by the
/// catalog exists in the tracker; a missing one aborts the whole seed.
/// After preflight, failures are isolated per row. `pause` spaces out
/// creation calls to respect API rate limits (pass `Duration::ZERO` in
/// tests).
pub async fn run_initial_seed<S, T>(
    catalog: &[TaskTemplate],
    store: &S,
    service: &T,
    pause: Duration,
) -> Result<RunResult, EngineError>
where
    S: IssueStore,
    T: TicketService,
{
    info!(templates = catalog.len(), "Starting initial seeding");

    preflight(catalog, service).await?;

    let mut result = RunResult::default();

    for template in catalog {
        match seed_template(template, store, service).await? {
            SeedOutcome::AlreadyExists => {
                debug!(subject = %template.subject, "Issue already exists; skipping");
                result.skipped += 1;
            }
            SeedOutcome::Created { issue_id } => {
                info!(issue_id, subject = %template.subject, "Created initial issue");
                result.created += 1;
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }
            SeedOutcome::Failed(cause) => {
                warn!(subject = %template.subject, error = %cause, "Seeding failed for template");
                result.errors.push(RowFailure {
                    subject: template.subject.clone(),
                    cause,
                });
            }
        }
    }

    info!(
        created = result.created,
        skipped = result.skipped,
        failed = result.errors.len(),
        "Initial seeding complete"
    );

    Ok(result)
}

/// Verify every referenced project and tracker before creating anything.
async fn preflight<T: TicketService>(
    catalog: &[TaskTemplate],
    service: &T,
) -> Result<(), EngineError> {
    let mut project_ids: Vec<i32> = catalog.iter().map(|t| t.project_id).collect();
    project_ids.sort_unstable();
    project_ids.dedup();

    for project_id in project_ids {
        if !service.project_exists(project_id).await? {
            return Err(EngineError::MissingProject(project_id));
        }
    }

    let known_trackers = service.tracker_ids().await?;
    let mut tracker_ids: Vec<i32> = catalog.iter().map(|t| t.tracker_id).collect();
    tracker_ids.sort_unstable();
    tracker_ids.dedup();

    for tracker_id in tracker_ids {
        if !known_trackers.contains(&tracker_id) {
            return Err(EngineError::MissingTracker(tracker_id));
        }
    }

    Ok(())
}

async fn seed_template<S, T>(
    template: &TaskTemplate,
    store: &S,
    service: &T,
) -> Result<SeedOutcome, EngineError>
where
    S: IssueStore,
    T: TicketService,
{
    if store
        .has_issue(&template.subject, template.project_id)
        .await?
    {
        return Ok(SeedOutcome::AlreadyExists);
    }

    let Some(start_date) = template.start_date else {
        return Ok(SeedOutcome::Failed(RowError::MissingStartDate));
    };

    let due = match next_due_date(start_date, &template.interval_type, template.interval_value) {
        Ok(due) => due,
        Err(e) => return Ok(SeedOutcome::Failed(e.into())),
    };

    let issue = NewIssue {
        project_id: template.project_id,
        subject: template.subject.clone(),
        description: template.description.clone(),
        tracker_id: template.tracker_id,
        assigned_to_id: template.assigned_to_id,
        priority_id: template.priority_id,
        start_date,
        due_date: due,
    };

    match service.create_issue(&issue).await {
        Ok(created) => Ok(SeedOutcome::Created {
            issue_id: created.id,
        }),
        Err(e) => Ok(SeedOutcome::Failed(e.into())),
    }
}
