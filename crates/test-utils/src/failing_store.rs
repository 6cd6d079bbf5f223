//! A store wrapper that fails one chosen write.

use chrono::{DateTime, Utc};
use choreshift::errors::{ChoreError, Result};
use choreshift::model::{
    Assignment, AssignmentId, HistoryEntry, NewAssignment, PenaltyPoint, TaskDefinition, TaskId,
    User, UserId,
};
use choreshift::store::{MemoryStore, TaskStore};
use choreshift::types::AssignmentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    DeactivateTasks,
    BulkUpdateStatus,
    AppendHistory,
    ClearAssignments,
    PenaltyPoints,
    InsertAssignments,
    UpdateAssignment,
    SetAssignmentStatuses,
}

/// Delegates to a [`MemoryStore`] but returns an error from `fail_on`.
///
/// Transactions are delegated too, so a failed run can be checked for
/// rollback through a second handle on the same memory store.
#[derive(Debug)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_on: FailOn,
    broken_rollback: bool,
}

impl FailingStore {
    pub fn new(inner: MemoryStore, fail_on: FailOn) -> Self {
        Self {
            inner,
            fail_on,
            broken_rollback: false,
        }
    }

    /// Make `rollback` fail too, leaving the inner transaction open.
    pub fn with_broken_rollback(mut self) -> Self {
        self.broken_rollback = true;
        self
    }

    fn check(&self, op: FailOn) -> Result<()> {
        if self.fail_on == op {
            return Err(ChoreError::StoreError(format!("injected failure in {op:?}")));
        }
        Ok(())
    }
}

impl TaskStore for FailingStore {
    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        if self.broken_rollback {
            return Err(ChoreError::StoreError("injected rollback failure".to_string()));
        }
        self.inner.rollback()
    }

    fn active_users(&self) -> Result<Vec<User>> {
        self.inner.active_users()
    }

    fn user(&self, id: UserId) -> Result<Option<User>> {
        self.inner.user(id)
    }

    fn tasks(&self) -> Result<Vec<TaskDefinition>> {
        self.inner.tasks()
    }

    fn task(&self, id: TaskId) -> Result<Option<TaskDefinition>> {
        self.inner.task(id)
    }

    fn penalty_points(&self) -> Result<Vec<PenaltyPoint>> {
        self.inner.penalty_points()
    }

    fn history_since(&self, since: DateTime<Utc>) -> Result<Vec<HistoryEntry>> {
        self.inner.history_since(since)
    }

    fn latest_history_per_task(&self) -> Result<Vec<HistoryEntry>> {
        self.inner.latest_history_per_task()
    }

    fn assignments(&self) -> Result<Vec<Assignment>> {
        self.inner.assignments()
    }

    fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>> {
        self.inner.assignment(id)
    }

    fn deactivate_tasks(&mut self, ids: &[TaskId], at: DateTime<Utc>) -> Result<usize> {
        self.check(FailOn::DeactivateTasks)?;
        self.inner.deactivate_tasks(ids, at)
    }

    fn bulk_update_status(
        &mut self,
        from: &[AssignmentStatus],
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        self.check(FailOn::BulkUpdateStatus)?;
        self.inner.bulk_update_status(from, to, at)
    }

    fn append_history(&mut self, entries: &[HistoryEntry]) -> Result<()> {
        self.check(FailOn::AppendHistory)?;
        self.inner.append_history(entries)
    }

    fn clear_assignments(&mut self) -> Result<usize> {
        self.check(FailOn::ClearAssignments)?;
        self.inner.clear_assignments()
    }

    fn delete_penalty_point(&mut self, task: TaskId, user: UserId) -> Result<()> {
        self.check(FailOn::PenaltyPoints)?;
        self.inner.delete_penalty_point(task, user)
    }

    fn set_penalty_points(&mut self, task: TaskId, user: UserId, points: u32) -> Result<()> {
        self.check(FailOn::PenaltyPoints)?;
        self.inner.set_penalty_points(task, user, points)
    }

    fn insert_assignments(&mut self, rows: &[NewAssignment]) -> Result<Vec<AssignmentId>> {
        self.check(FailOn::InsertAssignments)?;
        self.inner.insert_assignments(rows)
    }

    fn update_assignment(
        &mut self,
        id: AssignmentId,
        status: AssignmentStatus,
        user: Option<UserId>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.check(FailOn::UpdateAssignment)?;
        self.inner.update_assignment(id, status, user, at)
    }

    fn set_assignment_statuses(
        &mut self,
        ids: &[AssignmentId],
        status: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        self.check(FailOn::SetAssignmentStatuses)?;
        self.inner.set_assignment_statuses(ids, status, at)
    }
}
