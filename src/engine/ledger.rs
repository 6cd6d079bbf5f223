// src/engine/ledger.rs

//! User-facing side of the penalty ledger.
//!
//! Users spend points on tasks they would rather not get. Every user has a
//! budget of one point per ledger-eligible task (live and without a fixed
//! owner), and a single task takes at most `max_points_per_task`.

use serde::Serialize;
use tracing::{debug, info};

use super::maintenance::ledger_task_count;
use crate::errors::{ChoreError, Result};
use crate::model::{TaskId, UserId};
use crate::store::TaskStore;

/// A user's point budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointBudget {
    pub user_id: UserId,
    /// Ledger-eligible tasks; also the most points a user may hold.
    pub task_count: u64,
    pub spent: u64,
}

impl PointBudget {
    /// Points still free. Negative when tasks went away since the points
    /// were spent; the next maintenance pass trims the excess.
    pub fn available(&self) -> i64 {
        self.task_count as i64 - self.spent as i64
    }
}

/// Points a user holds on one ledger-eligible task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskPoints {
    pub task_id: TaskId,
    pub task_name: String,
    pub points: u32,
}

/// Result of [`grant_penalty_points`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointGrant {
    pub task_id: TaskId,
    pub user_id: UserId,
    pub previous: u32,
    pub points: u32,
    pub budget: PointBudget,
}

pub fn available_points(store: &dyn TaskStore, user: UserId) -> Result<PointBudget> {
    require_active_user(store, user)?;
    let task_count = ledger_task_count(&store.tasks()?);
    let spent = store
        .penalty_points()?
        .iter()
        .filter(|p| p.user_id == user)
        .map(|p| u64::from(p.points))
        .sum();
    Ok(PointBudget {
        user_id: user,
        task_count,
        spent,
    })
}

/// Every ledger-eligible task with the points `user` holds on it (0 if none),
/// ordered by task id.
pub fn points_by_task(store: &dyn TaskStore, user: UserId) -> Result<Vec<TaskPoints>> {
    require_active_user(store, user)?;
    let held = store.penalty_points()?;
    let mut tasks = store.tasks()?;
    tasks.sort_by_key(|t| t.id);
    Ok(tasks
        .into_iter()
        .filter(|t| t.counts_toward_ledger())
        .map(|t| TaskPoints {
            points: held
                .iter()
                .find(|p| p.task_id == t.id && p.user_id == user)
                .map_or(0, |p| p.points),
            task_id: t.id,
            task_name: t.name,
        })
        .collect())
}

/// Set how many points `user` holds on `task`. Zero removes the entry.
///
/// Rejected without writing when the amount is negative or above
/// `max_points_per_task`, when the task has a fixed owner or is inactive, or
/// when the user's total would exceed their budget.
pub fn grant_penalty_points(
    store: &mut dyn TaskStore,
    task: TaskId,
    user: UserId,
    points: i64,
    max_points_per_task: u32,
) -> Result<PointGrant> {
    let points = u32::try_from(points)
        .ok()
        .filter(|p| *p <= max_points_per_task)
        .ok_or(ChoreError::InvalidPoints {
            points,
            max: max_points_per_task,
        })?;

    let definition = store
        .task(task)?
        .filter(|t| t.deleted_at.is_none())
        .ok_or(ChoreError::TaskNotFound(task))?;
    if !definition.counts_toward_ledger() {
        return Err(ChoreError::PointsNotAllowed(task));
    }

    let budget = available_points(&*store, user)?;
    let previous = store
        .penalty_points()?
        .iter()
        .find(|p| p.task_id == task && p.user_id == user)
        .map_or(0, |p| p.points);

    let spent = budget.spent - u64::from(previous) + u64::from(points);
    if points > previous && spent > budget.task_count {
        return Err(ChoreError::PointBudgetExceeded {
            user,
            requested: points,
            available: budget.available() + i64::from(previous),
        });
    }

    if points == 0 {
        store.delete_penalty_point(task, user)?;
    } else {
        store.set_penalty_points(task, user, points)?;
    }
    debug!(task = %task, user = %user, previous, points, "penalty points set");
    info!(user = %user, spent, budget = budget.task_count, "penalty ledger updated");

    Ok(PointGrant {
        task_id: task,
        user_id: user,
        previous,
        points,
        budget: PointBudget { spent, ..budget },
    })
}

fn require_active_user(store: &dyn TaskStore, user: UserId) -> Result<()> {
    if store.user(user)?.is_some_and(|u| u.is_active()) {
        Ok(())
    } else {
        Err(ChoreError::UserNotFound(user))
    }
}
