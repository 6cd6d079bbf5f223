// src/store/mod.rs

//! Task store abstraction.
//!
//! The engine talks to a [`TaskStore`] instead of a concrete database. One
//! store is bound to exactly one tenant; picking (and caching) the store for a
//! tenant is the job of a [`StoreFactory`] and the
//! [`TenantRegistry`](crate::tenant::TenantRegistry).
//!
//! - [`sqlite::SqliteStore`] is the production implementation, one SQLite
//!   file per tenant.
//! - [`memory::MemoryStore`] keeps everything in process and is what tests
//!   drive the engine with.

use std::fmt::Debug;

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::model::{
    Assignment, AssignmentId, HistoryEntry, NewAssignment, PenaltyPoint, TaskDefinition, TaskId,
    User, UserId,
};
use crate::types::AssignmentStatus;

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::{MemoryStore, MemoryStoreFactory};
pub use sqlite::{SqliteStore, SqliteStoreFactory};

/// Storage operations the assignment engine needs.
///
/// Calls are synchronous and blocking. Writes between [`begin`](Self::begin)
/// and [`commit`](Self::commit) must become visible all at once or, after
/// [`rollback`](Self::rollback), not at all.
pub trait TaskStore: Send + Debug {
    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    /// Users that are not soft-deleted, ordered by id.
    fn active_users(&self) -> Result<Vec<User>>;
    fn user(&self, id: UserId) -> Result<Option<User>>;

    /// Every task definition, including inactive and soft-deleted ones,
    /// ordered by id.
    fn tasks(&self) -> Result<Vec<TaskDefinition>>;
    fn task(&self, id: TaskId) -> Result<Option<TaskDefinition>>;

    fn penalty_points(&self) -> Result<Vec<PenaltyPoint>>;

    /// History entries created after `since`, newest first.
    fn history_since(&self, since: DateTime<Utc>) -> Result<Vec<HistoryEntry>>;

    /// The newest history entry of every task that has one.
    fn latest_history_per_task(&self) -> Result<Vec<HistoryEntry>>;

    /// Live assignment rows, ordered by id.
    fn assignments(&self) -> Result<Vec<Assignment>>;
    fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>>;

    /// Mark the given tasks inactive. Returns how many rows changed.
    fn deactivate_tasks(&mut self, ids: &[TaskId], at: DateTime<Utc>) -> Result<usize>;

    /// Move every assignment whose status is in `from` to `to`.
    fn bulk_update_status(
        &mut self,
        from: &[AssignmentStatus],
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<usize>;

    fn append_history(&mut self, entries: &[HistoryEntry]) -> Result<()>;

    /// Delete every live assignment. Returns how many rows were removed.
    fn clear_assignments(&mut self) -> Result<usize>;

    fn delete_penalty_point(&mut self, task: TaskId, user: UserId) -> Result<()>;

    /// Insert or overwrite the points a user holds against a task.
    fn set_penalty_points(&mut self, task: TaskId, user: UserId, points: u32) -> Result<()>;

    /// Insert rows in order; returned ids follow the same order.
    fn insert_assignments(&mut self, rows: &[NewAssignment]) -> Result<Vec<AssignmentId>>;

    /// Set the status (and optionally the assignee) of one row.
    /// Returns `false` if the row does not exist.
    fn update_assignment(
        &mut self,
        id: AssignmentId,
        status: AssignmentStatus,
        user: Option<UserId>,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    fn set_assignment_statuses(
        &mut self,
        ids: &[AssignmentId],
        status: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<usize>;
}

/// Opens the store that belongs to a tenant.
pub trait StoreFactory: Send + Sync + Debug {
    /// Open an existing tenant. Unknown tenants are an error, never created.
    fn open(&self, tenant: &str) -> Result<Box<dyn TaskStore>>;

    /// Tenants this factory knows how to open.
    fn tenants(&self) -> Result<Vec<String>>;
}
