// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use super::{StoreFactory, TaskStore};
use crate::errors::{ChoreError, Result};
use crate::model::{
    Assignment, AssignmentId, HistoryEntry, NewAssignment, PenaltyPoint, TaskDefinition, TaskId,
    User, UserId,
};
use crate::types::AssignmentStatus;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    tasks: BTreeMap<TaskId, TaskDefinition>,
    assignments: BTreeMap<AssignmentId, Assignment>,
    points: BTreeMap<(TaskId, UserId), u32>,
    /// Append order is the tie-breaker for equal `created_at`.
    history: Vec<HistoryEntry>,
    next_assignment_id: i64,
}

/// Process-local store.
///
/// Clones share the same underlying state, so a test can keep one handle for
/// seeding and inspection while the engine mutates another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    snapshot: Option<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_user(&self, user: User) {
        self.lock().users.insert(user.id, user);
    }

    pub fn add_task(&self, task: TaskDefinition) {
        self.lock().tasks.insert(task.id, task);
    }

    pub fn add_penalty_point(&self, point: PenaltyPoint) {
        self.lock()
            .points
            .insert((point.task_id, point.user_id), point.points);
    }

    pub fn add_history(&self, entry: HistoryEntry) {
        self.lock().history.push(entry);
    }

    /// Insert one live assignment row directly, bypassing the engine.
    pub fn add_assignment(&self, row: NewAssignment) -> AssignmentId {
        insert_row(&mut self.lock(), &row)
    }

    /// Soft-delete a user.
    pub fn remove_user(&self, id: UserId, at: DateTime<Utc>) {
        if let Some(user) = self.lock().users.get_mut(&id) {
            user.deleted_at = Some(at);
        }
    }

    /// Every history entry in append order.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock().history.clone()
    }
}

fn insert_row(state: &mut MemoryState, row: &NewAssignment) -> AssignmentId {
    state.next_assignment_id += 1;
    let id = AssignmentId(state.next_assignment_id);
    state.assignments.insert(
        id,
        Assignment {
            id,
            task_id: row.task_id,
            user_id: row.user_id,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.created_at,
        },
    );
    id
}

fn newest_first(history: &[HistoryEntry]) -> Vec<HistoryEntry> {
    let mut indexed: Vec<(usize, &HistoryEntry)> = history.iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
    indexed.into_iter().map(|(_, e)| e.clone()).collect()
}

impl TaskStore for MemoryStore {
    fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(ChoreError::StoreError(
                "transaction already in progress".to_string(),
            ));
        }
        let snapshot = self.lock().clone();
        self.snapshot = Some(snapshot);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        match self.snapshot.take() {
            Some(_) => Ok(()),
            None => Err(ChoreError::StoreError("no transaction to commit".to_string())),
        }
    }

    fn rollback(&mut self) -> Result<()> {
        match self.snapshot.take() {
            Some(snapshot) => {
                *self.lock() = snapshot;
                Ok(())
            }
            None => Err(ChoreError::StoreError(
                "no transaction to roll back".to_string(),
            )),
        }
    }

    fn active_users(&self) -> Result<Vec<User>> {
        Ok(self
            .lock()
            .users
            .values()
            .filter(|u| u.is_active())
            .cloned()
            .collect())
    }

    fn user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    fn tasks(&self) -> Result<Vec<TaskDefinition>> {
        Ok(self.lock().tasks.values().cloned().collect())
    }

    fn task(&self, id: TaskId) -> Result<Option<TaskDefinition>> {
        Ok(self.lock().tasks.get(&id).cloned())
    }

    fn penalty_points(&self) -> Result<Vec<PenaltyPoint>> {
        Ok(self
            .lock()
            .points
            .iter()
            .map(|(&(task_id, user_id), &points)| PenaltyPoint {
                task_id,
                user_id,
                points,
            })
            .collect())
    }

    fn history_since(&self, since: DateTime<Utc>) -> Result<Vec<HistoryEntry>> {
        let state = self.lock();
        Ok(newest_first(&state.history)
            .into_iter()
            .filter(|e| e.created_at > since)
            .collect())
    }

    fn latest_history_per_task(&self) -> Result<Vec<HistoryEntry>> {
        let state = self.lock();
        let mut latest: HashMap<TaskId, HistoryEntry> = HashMap::new();
        for entry in newest_first(&state.history) {
            latest.entry(entry.task_id).or_insert(entry);
        }
        let mut out: Vec<_> = latest.into_values().collect();
        out.sort_by_key(|e| e.task_id);
        Ok(out)
    }

    fn assignments(&self) -> Result<Vec<Assignment>> {
        Ok(self.lock().assignments.values().cloned().collect())
    }

    fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>> {
        Ok(self.lock().assignments.get(&id).cloned())
    }

    fn deactivate_tasks(&mut self, ids: &[TaskId], _at: DateTime<Utc>) -> Result<usize> {
        let mut state = self.lock();
        let mut changed = 0;
        for id in ids {
            if let Some(task) = state.tasks.get_mut(id) {
                if task.is_active {
                    task.is_active = false;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    fn bulk_update_status(
        &mut self,
        from: &[AssignmentStatus],
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut state = self.lock();
        let mut changed = 0;
        for row in state.assignments.values_mut() {
            if from.contains(&row.status) {
                row.status = to;
                row.updated_at = at;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn append_history(&mut self, entries: &[HistoryEntry]) -> Result<()> {
        self.lock().history.extend_from_slice(entries);
        Ok(())
    }

    fn clear_assignments(&mut self) -> Result<usize> {
        let mut state = self.lock();
        let removed = state.assignments.len();
        state.assignments.clear();
        Ok(removed)
    }

    fn delete_penalty_point(&mut self, task: TaskId, user: UserId) -> Result<()> {
        self.lock().points.remove(&(task, user));
        Ok(())
    }

    fn set_penalty_points(&mut self, task: TaskId, user: UserId, points: u32) -> Result<()> {
        self.lock().points.insert((task, user), points);
        Ok(())
    }

    fn insert_assignments(&mut self, rows: &[NewAssignment]) -> Result<Vec<AssignmentId>> {
        let mut state = self.lock();
        Ok(rows.iter().map(|row| insert_row(&mut state, row)).collect())
    }

    fn update_assignment(
        &mut self,
        id: AssignmentId,
        status: AssignmentStatus,
        user: Option<UserId>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.lock();
        match state.assignments.get_mut(&id) {
            Some(row) => {
                row.status = status;
                if let Some(user) = user {
                    row.user_id = user;
                }
                row.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn set_assignment_statuses(
        &mut self,
        ids: &[AssignmentId],
        status: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut state = self.lock();
        let mut changed = 0;
        for id in ids {
            if let Some(row) = state.assignments.get_mut(id) {
                row.status = status;
                row.updated_at = at;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// Hands out [`MemoryStore`]s keyed by tenant name.
///
/// Every `open` of the same tenant returns a handle onto the same state.
#[derive(Debug, Default)]
pub struct MemoryStoreFactory {
    tenants: Mutex<BTreeMap<String, MemoryStore>>,
}

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tenant and return a seeding handle for it.
    pub fn tenant(&self, name: &str) -> MemoryStore {
        self.tenants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

impl StoreFactory for MemoryStoreFactory {
    fn open(&self, tenant: &str) -> Result<Box<dyn TaskStore>> {
        let tenants = self.tenants.lock().unwrap_or_else(PoisonError::into_inner);
        match tenants.get(tenant) {
            Some(store) => {
                let handle = MemoryStore {
                    state: Arc::clone(&store.state),
                    snapshot: None,
                };
                Ok(Box::new(handle))
            }
            None => Err(ChoreError::StoreError(format!("unknown tenant '{tenant}'"))),
        }
    }

    fn tenants(&self) -> Result<Vec<String>> {
        Ok(self
            .tenants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }
}
