// src/engine/status.rs

//! Status transitions of live assignment rows after a run.
//!
//! Rows of a task that repeats within a cycle form a queue: at most one is
//! `pending`, the rest are `waiting`. Resolving the pending row promotes the
//! oldest waiting one; reopening a row demotes any other pending row.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{ChoreError, Result};
use crate::model::{Assignment, AssignmentId, TaskId, UserId};
use crate::store::TaskStore;
use crate::types::AssignmentStatus;

/// What a status update changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub assignment_id: AssignmentId,
    pub task_id: TaskId,
    pub status: AssignmentStatus,
    /// New assignee, when the row was reassigned.
    pub reassigned_to: Option<UserId>,
    /// Waiting row moved up to `pending`.
    pub promoted: Option<AssignmentId>,
    /// Pending rows moved back to `waiting`.
    pub demoted: Vec<AssignmentId>,
}

/// Set the status of one live assignment, optionally handing it to another
/// user, and keep the task's pending/waiting queue consistent.
///
/// Every check happens before the first write; the writes themselves run in
/// one store transaction.
pub fn set_assignment_status(
    store: &mut dyn TaskStore,
    id: AssignmentId,
    status: AssignmentStatus,
    reassign_to: Option<UserId>,
    now: DateTime<Utc>,
) -> Result<StatusChange> {
    let row = store.assignment(id)?.ok_or(ChoreError::AssignmentNotFound(id))?;
    let task = store
        .task(row.task_id)?
        .ok_or(ChoreError::TaskNotFound(row.task_id))?;

    let allowed = AssignmentStatus::allowed_for(task.recurrence.unit, task.repeats_per_cycle);
    if !allowed.contains(&status) {
        return Err(ChoreError::InvalidStatus {
            status,
            unit: task.recurrence.unit,
            repeats: task.repeats_per_cycle,
        });
    }

    if let Some(user) = reassign_to {
        let active = store.user(user)?.is_some_and(|u| u.is_active());
        if !active {
            return Err(ChoreError::UserNotFound(user));
        }
    }

    store.begin()?;
    match apply(store, &row, status, reassign_to, now) {
        Ok(change) => {
            store.commit()?;
            info!(
                assignment = %id,
                task = %row.task_id,
                from = %row.status,
                to = %status,
                "assignment status updated"
            );
            Ok(change)
        }
        Err(err) => {
            if let Err(rollback_err) = store.rollback() {
                warn!(error = %rollback_err, "rollback after failed status update also failed");
            }
            Err(err)
        }
    }
}

fn apply(
    store: &mut dyn TaskStore,
    row: &Assignment,
    status: AssignmentStatus,
    reassign_to: Option<UserId>,
    now: DateTime<Utc>,
) -> Result<StatusChange> {
    if !store.update_assignment(row.id, status, reassign_to, now)? {
        return Err(ChoreError::AssignmentNotFound(row.id));
    }

    let siblings: Vec<Assignment> = store
        .assignments()?
        .into_iter()
        .filter(|a| a.task_id == row.task_id)
        .collect();

    let mut promoted = None;
    let mut demoted = Vec::new();

    if status.releases_turn() {
        let has_pending = siblings
            .iter()
            .any(|a| a.status == AssignmentStatus::Pending);
        if !has_pending {
            promoted = siblings
                .iter()
                .filter(|a| a.status == AssignmentStatus::Waiting)
                .map(|a| a.id)
                .min();
            if let Some(next) = promoted {
                store.set_assignment_statuses(&[next], AssignmentStatus::Pending, now)?;
                debug!(assignment = %next, task = %row.task_id, "promoted waiting row");
            }
        }
    } else if status == AssignmentStatus::Pending {
        demoted = siblings
            .iter()
            .filter(|a| a.id != row.id && a.status == AssignmentStatus::Pending)
            .map(|a| a.id)
            .collect();
        if !demoted.is_empty() {
            store.set_assignment_statuses(&demoted, AssignmentStatus::Waiting, now)?;
            debug!(count = demoted.len(), task = %row.task_id, "demoted pending rows");
        }
    }

    Ok(StatusChange {
        assignment_id: row.id,
        task_id: row.task_id,
        status,
        reassigned_to: reassign_to,
        promoted,
        demoted,
    })
}
