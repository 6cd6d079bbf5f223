//! Entities read and written through a [`TaskStore`](crate::store::TaskStore).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AssignmentStatus, RecurrenceUnit};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Code uniquely identifying a user.
    UserId,
    "u"
);
id_type!(
    /// Code uniquely identifying a task definition.
    TaskId,
    "t"
);
id_type!(
    /// Code uniquely identifying a live assignment row.
    AssignmentId,
    "a"
);

/// A household member who can be given tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Percentage (0..=100) of the total effort this user should carry.
    /// Zero opts the user out of dynamic allocation entirely.
    pub participation_share: u8,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// `{unit, value}`: "every `value` units".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub unit: RecurrenceUnit,
    pub value: u32,
}

impl Recurrence {
    pub fn new(unit: RecurrenceUnit, value: u32) -> Self {
        Self { unit, value }
    }

    /// Length of one recurrence interval in whole days.
    pub fn interval_days(&self) -> i64 {
        i64::from(self.value) * self.unit.days_per_unit()
    }
}

/// A recurring chore template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: TaskId,
    pub name: String,
    /// Fixed owner; such tasks bypass scoring and allocation.
    pub static_user_id: Option<UserId>,
    pub recurrence: Recurrence,
    pub repeats_per_cycle: u32,
    pub effort_minutes: u32,
    pub is_active: bool,
    /// The task may not be allocated before this instant.
    pub eligible_from: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TaskDefinition {
    /// Not soft-deleted and switched on.
    pub fn is_live(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    /// Effort this task adds to its assignee over one cycle.
    pub fn cycle_effort(&self) -> u64 {
        u64::from(self.effort_minutes) * u64::from(self.repeats_per_cycle.max(1))
    }

    /// Counts toward the penalty-ledger budget.
    pub fn counts_toward_ledger(&self) -> bool {
        self.is_live() && self.static_user_id.is_none()
    }
}

/// A stored, current-cycle assignment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An assignment row about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub task_id: TaskId,
    pub user_id: UserId,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
}

/// Opt-out currency a user holds against one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyPoint {
    pub task_id: TaskId,
    pub user_id: UserId,
    pub points: u32,
}

/// An archived assignment together with the task's shape when it was archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub task_id: TaskId,
    pub user_id: UserId,
    pub status: AssignmentStatus,
    /// `None` when the task definition was gone at archive time.
    pub recurrence: Option<Recurrence>,
    pub repeats_per_cycle: Option<u32>,
    pub effort_minutes: Option<u32>,
    /// Creation time of the archived assignment.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Snapshot an assignment into history using the task's current shape.
    pub fn archive(
        assignment: &Assignment,
        task: Option<&TaskDefinition>,
        archived_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: assignment.task_id,
            user_id: assignment.user_id,
            status: assignment.status,
            recurrence: task.map(|t| t.recurrence),
            repeats_per_cycle: task.map(|t| t.repeats_per_cycle),
            effort_minutes: task.map(|t| t.effort_minutes),
            created_at: assignment.created_at,
            updated_at: assignment.updated_at,
            archived_at,
        }
    }
}
