//! Rollover check: detect completed recurring tasks and spawn successors.

use chrono::{DateTime, Utc};
use taskmill_catalog::TaskTemplate;
use tracing::{debug, info, warn};

use super::due::next_due_date;
use super::{EngineError, IssueStore, RowError, RowFailure, RunResult, TicketService};
use crate::redmine::NewIssue;

/// Outcome of evaluating one template. Terminal states of the per-row
/// state machine; there are no retries within a run.
#[derive(Debug)]
enum RolloverOutcome {
    /// No done instance exists yet for this template.
    NoCompletedInstance,
    /// A non-done issue newer than the latest done instance already
    /// exists; the rollover already happened.
    SuccessorExists,
    Created { issue_id: i32 },
    Failed(RowError),
}

/// Run one rollover pass over the catalog, in catalog order.
///
/// `now` is the processing instant: the successor's start date and the
/// anchor of its due-date computation. Callers pass `Utc::now()`.
///
/// Per-row failures (unknown interval type, creation failure) are
/// recorded and the loop continues; store failures abort the run.
pub async fn run_rollover_check<S, T>(
    catalog: &[TaskTemplate],
    store: &S,
    service: &T,
    now: DateTime<Utc>,
) -> Result<RunResult, EngineError>
where
    S: IssueStore,
    T: TicketService,
{
    let done = store.closed_status_ids().await?;

    info!(
        templates = catalog.len(),
        done_statuses = ?done,
        "Starting rollover check"
    );

    let mut result = RunResult::default();

    for template in catalog {
        match evaluate_template(template, store, service, &done, now).await? {
            RolloverOutcome::NoCompletedInstance => {
                debug!(subject = %template.subject, "No completed instance yet; skipping");
                result.skipped += 1;
            }
            RolloverOutcome::SuccessorExists => {
                debug!(subject = %template.subject, "Successor already exists; skipping");
                result.skipped += 1;
            }
            RolloverOutcome::Created { issue_id } => {
                info!(issue_id, subject = %template.subject, "Created successor issue");
                result.created += 1;
            }
            RolloverOutcome::Failed(cause) => {
                warn!(subject = %template.subject, error = %cause, "Template evaluation failed");
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
        "Rollover check complete"
    );

    Ok(result)
}

async fn evaluate_template<S, T>(
    template: &TaskTemplate,
    store: &S,
    service: &T,
    done: &[i32],
    now: DateTime<Utc>,
) -> Result<RolloverOutcome, EngineError>
where
    S: IssueStore,
    T: TicketService,
{
    let latest = store
        .latest_closed_issue(&template.subject, template.project_id, done)
        .await?;

    let Some(latest) = latest else {
        return Ok(RolloverOutcome::NoCompletedInstance);
    };

    // A done issue normally carries closed_on; created_on is the
    // conservative anchor when it doesn't.
    let closed_on = latest.closed_on.unwrap_or(latest.created_on);

    let pending = store
        .open_successors_since(&template.subject, template.project_id, done, closed_on)
        .await?;

    if pending > 0 {
        return Ok(RolloverOutcome::SuccessorExists);
    }

    let due = match next_due_date(
        now.date_naive(),
        &template.interval_type,
        template.interval_value,
    ) {
        Ok(due) => due,
        Err(e) => return Ok(RolloverOutcome::Failed(e.into())),
    };

    let issue = NewIssue {
        project_id: template.project_id,
        subject: template.subject.clone(),
        description: template.description.clone(),
        tracker_id: template.tracker_id,
        assigned_to_id: template.assigned_to_id,
        priority_id: template.priority_id,
        start_date: now.date_naive(),
        due_date: due,
    };

    match service.create_issue(&issue).await {
        Ok(created) => Ok(RolloverOutcome::Created {
            issue_id: created.id,
        }),
        Err(e) => Ok(RolloverOutcome::Failed(e.into())),
    }
}
