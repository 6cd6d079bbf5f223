// src/engine/persister.rs

use chrono::{DateTime, Utc};
use tracing::info;

use super::Pick;
use crate::errors::Result;
use crate::model::{AssignmentId, NewAssignment};
use crate::store::TaskStore;
use crate::types::AssignmentStatus;

/// Rows for one pick: the first `pending`, every later repetition `waiting`.
pub fn expand_pick(pick: &Pick, now: DateTime<Utc>) -> Vec<NewAssignment> {
    (0..pick.repeats_per_cycle.max(1))
        .map(|i| NewAssignment {
            task_id: pick.task_id,
            user_id: pick.user_id,
            status: if i == 0 {
                AssignmentStatus::Pending
            } else {
                AssignmentStatus::Waiting
            },
            created_at: now,
        })
        .collect()
}

pub fn expand_picks(picks: &[Pick], now: DateTime<Utc>) -> Vec<NewAssignment> {
    picks.iter().flat_map(|p| expand_pick(p, now)).collect()
}

pub fn persist(store: &mut dyn TaskStore, rows: &[NewAssignment]) -> Result<Vec<AssignmentId>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids = store.insert_assignments(rows)?;
    info!(rows = ids.len(), "stored assignments");
    Ok(ids)
}
