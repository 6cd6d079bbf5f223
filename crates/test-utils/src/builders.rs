#![allow(dead_code)]

use chrono::{DateTime, Utc};
use choreshift::model::{
    HistoryEntry, NewAssignment, PenaltyPoint, Recurrence, TaskDefinition, TaskId, User, UserId,
};
use choreshift::store::MemoryStore;
use choreshift::types::{AssignmentStatus, RecurrenceUnit};

/// An active user.
pub fn user(id: i64, name: &str, share: u8) -> User {
    User {
        id: UserId(id),
        name: name.to_string(),
        participation_share: share,
        deleted_at: None,
    }
}

pub fn points(task: i64, user: i64, points: u32) -> PenaltyPoint {
    PenaltyPoint {
        task_id: TaskId(task),
        user_id: UserId(user),
        points,
    }
}

/// Builder for `TaskDefinition`.
///
/// Defaults to a live, dynamic, weekly task done once per cycle for 10 minutes.
pub struct TaskBuilder {
    task: TaskDefinition,
}

impl TaskBuilder {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            task: TaskDefinition {
                id: TaskId(id),
                name: name.to_string(),
                static_user_id: None,
                recurrence: Recurrence::new(RecurrenceUnit::Weekly, 1),
                repeats_per_cycle: 1,
                effort_minutes: 10,
                is_active: true,
                eligible_from: None,
                deleted_at: None,
            },
        }
    }

    pub fn weekly(mut self, value: u32) -> Self {
        self.task.recurrence = Recurrence::new(RecurrenceUnit::Weekly, value);
        self
    }

    pub fn monthly(mut self, value: u32) -> Self {
        self.task.recurrence = Recurrence::new(RecurrenceUnit::Monthly, value);
        self
    }

    pub fn once(mut self) -> Self {
        self.task.recurrence = Recurrence::new(RecurrenceUnit::Once, 1);
        self
    }

    pub fn repeats(mut self, n: u32) -> Self {
        self.task.repeats_per_cycle = n;
        self
    }

    pub fn effort(mut self, minutes: u32) -> Self {
        self.task.effort_minutes = minutes;
        self
    }

    pub fn owned_by(mut self, user: i64) -> Self {
        self.task.static_user_id = Some(UserId(user));
        self
    }

    pub fn inactive(mut self) -> Self {
        self.task.is_active = false;
        self
    }

    pub fn deleted_at(mut self, at: DateTime<Utc>) -> Self {
        self.task.deleted_at = Some(at);
        self
    }

    pub fn eligible_from(mut self, at: DateTime<Utc>) -> Self {
        self.task.eligible_from = Some(at);
        self
    }

    pub fn build(self) -> TaskDefinition {
        self.task
    }
}

/// Builder for `HistoryEntry`.
pub struct HistoryBuilder {
    entry: HistoryEntry,
}

impl HistoryBuilder {
    pub fn new(task: i64, user: i64, status: AssignmentStatus, created_at: DateTime<Utc>) -> Self {
        Self {
            entry: HistoryEntry {
                task_id: TaskId(task),
                user_id: UserId(user),
                status,
                recurrence: Some(Recurrence::new(RecurrenceUnit::Weekly, 1)),
                repeats_per_cycle: Some(1),
                effort_minutes: Some(10),
                created_at,
                updated_at: created_at,
                archived_at: created_at,
            },
        }
    }

    pub fn repeats(mut self, n: u32) -> Self {
        self.entry.repeats_per_cycle = Some(n);
        self
    }

    /// Snapshot columns empty, as if the task was gone at archive time.
    pub fn without_snapshot(mut self) -> Self {
        self.entry.recurrence = None;
        self.entry.repeats_per_cycle = None;
        self.entry.effort_minutes = None;
        self
    }

    pub fn build(self) -> HistoryEntry {
        self.entry
    }
}

pub fn live_row(
    task: i64,
    user: i64,
    status: AssignmentStatus,
    created_at: DateTime<Utc>,
) -> NewAssignment {
    NewAssignment {
        task_id: TaskId(task),
        user_id: UserId(user),
        status,
        created_at,
    }
}

/// A memory store seeded with the given users and tasks.
pub fn seeded_store(users: Vec<User>, tasks: Vec<TaskDefinition>) -> MemoryStore {
    let store = MemoryStore::new();
    for u in users {
        store.add_user(u);
    }
    for t in tasks {
        store.add_task(t);
    }
    store
}
