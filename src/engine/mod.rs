// src/engine/mod.rs

//! Assignment engine.
//!
//! One run of the engine is:
//! - [`maintenance`]: close out the previous cycle (retire finished one-shot
//!   tasks, fail open rows, archive, correct the penalty ledger)
//! - [`qualify`]: pick the task definitions due this cycle and split them
//!   into static and dynamic tasks
//! - [`scorer`]: score every (dynamic task, user) pair
//! - [`allocator`]: hand static tasks to their owners and greedily hand
//!   dynamic tasks to the best-scoring user under the workload cap
//! - [`persister`]: expand each pick into stored assignment rows
//!
//! Between runs, users spend penalty points through [`ledger`].
//!
//! [`runner::AssignmentEngine`] wires these together against a
//! [`TaskStore`](crate::store::TaskStore). Status changes after a run go
//! through [`status::set_assignment_status`].

use serde::Serialize;

use crate::model::{NewAssignment, TaskId, UserId};
use crate::types::RecurrenceUnit;

pub mod allocator;
pub mod ledger;
pub mod maintenance;
pub mod persister;
pub mod qualify;
pub mod runner;
pub mod scorer;
pub mod status;

pub use allocator::Allocator;
pub use ledger::{
    PointBudget, PointGrant, TaskPoints, available_points, grant_penalty_points, points_by_task,
};
pub use maintenance::{LedgerAdjustment, MaintenanceSummary};
pub use qualify::QualifiedTask;
pub use runner::AssignmentEngine;
pub use scorer::ScoreBoard;
pub use status::{StatusChange, set_assignment_status};

/// Tunables that stay fixed across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// How far back completed history counts against a user.
    pub lookback_days: u32,
    /// Slack subtracted from a task's recurrence interval before it is due again.
    pub qualification_tolerance_hours: u32,
    /// Most penalty points one user may put on a single task.
    pub max_points_per_task: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            lookback_days: 100,
            qualification_tolerance_hours: 6,
            max_points_per_task: 3,
        }
    }
}

/// Per-run switches supplied by whoever triggers the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunOptions {
    /// Read everything, write nothing; maintenance is skipped.
    pub dry_run: bool,
    /// Wipe live assignments and allocate again; maintenance is skipped.
    pub clear_and_reassign: bool,
    /// Allocate weekly tasks fully before monthly ones, then one-shots.
    pub group_by_recurrence: bool,
}

/// How a pick was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PickKind {
    Static,
    Dynamic,
}

/// One task handed to one user for this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pick {
    pub task_id: TaskId,
    pub task_name: String,
    pub unit: RecurrenceUnit,
    pub repeats_per_cycle: u32,
    pub effort: u64,
    pub user_id: UserId,
    pub user_name: String,
    pub kind: PickKind,
    /// Winning score; `None` for static picks.
    pub score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnassignedReason {
    /// The fixed owner is deleted or unknown.
    OwnerMissing { owner: UserId },
    /// Every user is opted out or over their workload cap.
    NoEligibleUser,
}

/// A task that qualified but could not be given to anyone this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unassigned {
    pub task_id: TaskId,
    pub task_name: String,
    #[serde(flatten)]
    pub reason: UnassignedReason,
}

/// Everything one engine run decided.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub options: RunOptions,
    pub picks: Vec<Pick>,
    /// Rows written, or that would have been written on a dry run.
    pub rows: Vec<NewAssignment>,
    pub unassigned: Vec<Unassigned>,
    /// `None` when maintenance was skipped.
    pub maintenance: Option<MaintenanceSummary>,
    /// Live assignments removed by clear-and-reassign.
    pub cleared_rows: usize,
}
