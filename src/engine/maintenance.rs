// src/engine/maintenance.rs

//! Housekeeping that closes out the previous cycle before allocation.
//!
//! Steps, in order:
//! 1. retire one-shot tasks that were completed
//! 2. fail every assignment still `waiting` or `pending`
//! 3. archive all live assignments into history and clear them
//! 4. correct the penalty ledger so no user holds more points than there
//!    are ledger-eligible tasks
//!
//! The caller is responsible for running this inside a store transaction.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::Result;
use crate::model::{HistoryEntry, PenaltyPoint, TaskDefinition, TaskId, UserId};
use crate::store::TaskStore;
use crate::types::{AssignmentStatus, RecurrenceUnit};

/// What the maintenance phase changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceSummary {
    pub retired_tasks: Vec<TaskId>,
    pub failed_rows: usize,
    pub archived_rows: usize,
    pub ledger: Vec<LedgerAdjustment>,
}

/// One change to the penalty ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LedgerAdjustment {
    /// The entry was fully consumed.
    Delete {
        task_id: TaskId,
        user_id: UserId,
        removed: u32,
    },
    /// The entry keeps `to` points.
    Decrement {
        task_id: TaskId,
        user_id: UserId,
        from: u32,
        to: u32,
    },
}

pub fn run_maintenance(store: &mut dyn TaskStore, now: DateTime<Utc>) -> Result<MaintenanceSummary> {
    let retired_tasks = retire_completed_one_shots(store, now)?;

    let open: Vec<AssignmentStatus> = AssignmentStatus::ALL
        .into_iter()
        .filter(|status| status.is_open())
        .collect();
    let failed_rows = store.bulk_update_status(&open, AssignmentStatus::Failed, now)?;
    if failed_rows > 0 {
        info!(failed_rows, "failed assignments left open from the previous cycle");
    }

    let archived_rows = archive_assignments(store, now)?;

    let tasks = store.tasks()?;
    let points = store.penalty_points()?;
    let ledger = plan_ledger_corrections(ledger_task_count(&tasks), &points);
    apply_ledger_corrections(store, &ledger)?;

    info!(
        retired = retired_tasks.len(),
        failed_rows,
        archived_rows,
        ledger_changes = ledger.len(),
        "maintenance complete"
    );

    Ok(MaintenanceSummary {
        retired_tasks,
        failed_rows,
        archived_rows,
        ledger,
    })
}

fn retire_completed_one_shots(
    store: &mut dyn TaskStore,
    now: DateTime<Utc>,
) -> Result<Vec<TaskId>> {
    let tasks: HashMap<TaskId, TaskDefinition> =
        store.tasks()?.into_iter().map(|t| (t.id, t)).collect();

    let mut retire: Vec<TaskId> = store
        .assignments()?
        .into_iter()
        .filter(|a| a.status == AssignmentStatus::Completed)
        .filter_map(|a| tasks.get(&a.task_id))
        .filter(|t| t.recurrence.unit == RecurrenceUnit::Once && t.is_active)
        .map(|t| t.id)
        .collect();
    retire.sort();
    retire.dedup();

    if !retire.is_empty() {
        store.deactivate_tasks(&retire, now)?;
        for id in &retire {
            debug!(task = %id, "retired completed one-shot task");
        }
    }
    Ok(retire)
}

fn archive_assignments(store: &mut dyn TaskStore, now: DateTime<Utc>) -> Result<usize> {
    let rows = store.assignments()?;
    if rows.is_empty() {
        return Ok(0);
    }
    let tasks: HashMap<TaskId, TaskDefinition> =
        store.tasks()?.into_iter().map(|t| (t.id, t)).collect();

    let entries: Vec<HistoryEntry> = rows
        .iter()
        .map(|a| HistoryEntry::archive(a, tasks.get(&a.task_id), now))
        .collect();

    store.append_history(&entries)?;
    store.clear_assignments()?;
    Ok(entries.len())
}

/// Number of tasks that bound every user's point total.
pub fn ledger_task_count(tasks: &[TaskDefinition]) -> u64 {
    tasks.iter().filter(|t| t.counts_toward_ledger()).count() as u64
}

/// Work out which ledger entries to shrink so each user's total fits within
/// `task_count`.
///
/// Per user, positive entries are consumed largest first (ties by task id).
/// An entry no larger than the remaining deficit is deleted; otherwise it is
/// decremented and the user is done. If a user's entries run out first the
/// deficit is simply left over.
pub fn plan_ledger_corrections(task_count: u64, points: &[PenaltyPoint]) -> Vec<LedgerAdjustment> {
    let mut by_user: BTreeMap<UserId, Vec<&PenaltyPoint>> = BTreeMap::new();
    for p in points {
        by_user.entry(p.user_id).or_default().push(p);
    }

    let mut plan = Vec::new();
    for (user_id, mut entries) in by_user {
        let total: u64 = entries.iter().map(|p| u64::from(p.points)).sum();
        if total <= task_count {
            continue;
        }
        let mut deficit = total - task_count;
        debug!(user = %user_id, total, task_count, deficit, "penalty points over budget");

        entries.retain(|p| p.points > 0);
        entries.sort_by(|a, b| b.points.cmp(&a.points).then(a.task_id.cmp(&b.task_id)));

        for p in entries {
            if deficit == 0 {
                break;
            }
            let points = u64::from(p.points);
            if points <= deficit {
                plan.push(LedgerAdjustment::Delete {
                    task_id: p.task_id,
                    user_id,
                    removed: p.points,
                });
                deficit -= points;
            } else {
                // points > deficit, so the difference fits back into u32.
                let to = (points - deficit) as u32;
                plan.push(LedgerAdjustment::Decrement {
                    task_id: p.task_id,
                    user_id,
                    from: p.points,
                    to,
                });
                deficit = 0;
            }
        }
    }
    plan
}

fn apply_ledger_corrections(store: &mut dyn TaskStore, plan: &[LedgerAdjustment]) -> Result<()> {
    for adj in plan {
        match *adj {
            LedgerAdjustment::Delete {
                task_id, user_id, ..
            } => store.delete_penalty_point(task_id, user_id)?,
            LedgerAdjustment::Decrement {
                task_id,
                user_id,
                to,
                ..
            } => store.set_penalty_points(task_id, user_id, to)?,
        }
    }
    Ok(())
}

/// Apply a plan to an in-memory ledger copy.
pub fn apply_to_points(points: &[PenaltyPoint], plan: &[LedgerAdjustment]) -> Vec<PenaltyPoint> {
    let mut ledger: BTreeMap<(TaskId, UserId), u32> = points
        .iter()
        .map(|p| ((p.task_id, p.user_id), p.points))
        .collect();
    for adj in plan {
        match *adj {
            LedgerAdjustment::Delete {
                task_id, user_id, ..
            } => {
                ledger.remove(&(task_id, user_id));
            }
            LedgerAdjustment::Decrement {
                task_id,
                user_id,
                to,
                ..
            } => {
                ledger.insert((task_id, user_id), to);
            }
        }
    }
    ledger
        .into_iter()
        .map(|((task_id, user_id), points)| PenaltyPoint {
            task_id,
            user_id,
            points,
        })
        .collect()
}
