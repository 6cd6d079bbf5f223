// src/engine/qualify.rs

//! Decides which task definitions are due this cycle.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::model::{HistoryEntry, TaskDefinition, TaskId, UserId};

/// A due task, resolved once into the allocation path it takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualifiedTask {
    /// Bound to a fixed owner; bypasses scoring.
    Static {
        task: TaskDefinition,
        owner: UserId,
    },
    /// Goes through scoring and greedy allocation.
    Dynamic(TaskDefinition),
}

impl QualifiedTask {
    pub fn task(&self) -> &TaskDefinition {
        match self {
            QualifiedTask::Static { task, .. } => task,
            QualifiedTask::Dynamic(task) => task,
        }
    }
}

impl From<TaskDefinition> for QualifiedTask {
    fn from(task: TaskDefinition) -> Self {
        match task.static_user_id {
            Some(owner) => QualifiedTask::Static { task, owner },
            None => QualifiedTask::Dynamic(task),
        }
    }
}

/// Whether `task` is due at `now`, given its newest history entry.
///
/// A live task whose gate has passed is due when it was never handed out,
/// when its last holder postponed or failed it, or when its recurrence
/// interval (less `tolerance`) has elapsed since it was last handed out.
pub fn is_due(
    task: &TaskDefinition,
    latest: Option<&HistoryEntry>,
    now: DateTime<Utc>,
    tolerance: Duration,
) -> bool {
    if !task.is_live() {
        return false;
    }
    if task.eligible_from.is_some_and(|from| from > now) {
        return false;
    }
    let Some(last) = latest else {
        return true;
    };
    if last.status.is_dropped() {
        return true;
    }
    let interval = Duration::days(task.recurrence.interval_days());
    now - last.created_at > interval - tolerance
}

/// Filter `tasks` down to the ones due at `now`.
///
/// `latest` holds at most one (the newest) history entry per task.
pub fn qualify(
    tasks: &[TaskDefinition],
    latest: &[HistoryEntry],
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Vec<QualifiedTask> {
    let latest_by_task: HashMap<TaskId, &HistoryEntry> =
        latest.iter().map(|e| (e.task_id, e)).collect();

    tasks
        .iter()
        .filter(|task| {
            let due = is_due(
                task,
                latest_by_task.get(&task.id).copied(),
                now,
                tolerance,
            );
            if !due && task.is_live() {
                debug!(task = %task.id, name = %task.name, "not due this cycle");
            }
            due
        })
        .cloned()
        .map(QualifiedTask::from)
        .collect()
}

/// Split qualified tasks into `(static, dynamic)`.
pub fn partition(
    qualified: Vec<QualifiedTask>,
) -> (Vec<(TaskDefinition, UserId)>, Vec<TaskDefinition>) {
    let mut statics = Vec::new();
    let mut dynamics = Vec::new();
    for q in qualified {
        match q {
            QualifiedTask::Static { task, owner } => statics.push((task, owner)),
            QualifiedTask::Dynamic(task) => dynamics.push(task),
        }
    }
    (statics, dynamics)
}
