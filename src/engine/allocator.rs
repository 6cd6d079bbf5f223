// src/engine/allocator.rs

//! Who gets what.
//!
//! Static tasks go straight to their owner. Dynamic tasks are handed out one
//! at a time to the highest-scoring user who is still under their share of
//! the cycle's total effort. The allocator is greedy: a pick is never
//! revisited.

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use super::scorer::ScoreBoard;
use super::{Pick, PickKind, Unassigned, UnassignedReason};
use crate::model::{TaskDefinition, User, UserId};
use crate::types::RecurrenceUnit;

/// Hand every static task to its owner.
///
/// A task whose owner is not among `users` (deleted or unknown) is reported
/// unassigned.
pub fn allocate_static(
    statics: &[(TaskDefinition, UserId)],
    users: &[User],
) -> (Vec<Pick>, Vec<Unassigned>) {
    let roster: HashMap<UserId, &User> = users.iter().map(|u| (u.id, u)).collect();
    let mut picks = Vec::new();
    let mut unassigned = Vec::new();

    for (task, owner) in statics {
        match roster.get(owner) {
            Some(user) => {
                debug!(task = %task.id, user = %user.id, "assigned static task");
                picks.push(Pick {
                    task_id: task.id,
                    task_name: task.name.clone(),
                    unit: task.recurrence.unit,
                    repeats_per_cycle: task.repeats_per_cycle,
                    effort: task.cycle_effort(),
                    user_id: user.id,
                    user_name: user.name.clone(),
                    kind: PickKind::Static,
                    score: None,
                });
            }
            None => {
                warn!(
                    task = %task.id,
                    name = %task.name,
                    owner = %owner,
                    "static owner is not an active user; task left unassigned"
                );
                unassigned.push(Unassigned {
                    task_id: task.id,
                    task_name: task.name.clone(),
                    reason: UnassignedReason::OwnerMissing { owner: *owner },
                });
            }
        }
    }
    (picks, unassigned)
}

/// Shuffle dynamic tasks and, if asked, split them into per-unit batches
/// (weekly, then monthly, then once). Order inside a batch stays shuffled.
pub fn order_dynamic<R: Rng + ?Sized>(
    mut tasks: Vec<TaskDefinition>,
    rng: &mut R,
    group_by_recurrence: bool,
) -> Vec<Vec<TaskDefinition>> {
    tasks.shuffle(rng);
    if !group_by_recurrence {
        return vec![tasks];
    }
    let mut groups: BTreeMap<RecurrenceUnit, Vec<TaskDefinition>> = BTreeMap::new();
    for task in tasks {
        groups.entry(task.recurrence.unit).or_default().push(task);
    }
    groups.into_values().collect()
}

/// Greedy allocator for dynamic tasks.
///
/// Running effort is tracked across every batch of one run, starting from
/// the static picks charged with [`Allocator::charge`].
#[derive(Debug)]
pub struct Allocator<'a> {
    users: &'a [User],
    scores: &'a ScoreBoard,
    total_effort: u64,
    effort: HashMap<UserId, u64>,
}

impl<'a> Allocator<'a> {
    /// `users` is the roster in tie-break order; `tasks` is every task due
    /// this cycle, static and dynamic, and fixes the total effort.
    pub fn new<'t, I>(users: &'a [User], scores: &'a ScoreBoard, tasks: I) -> Self
    where
        I: IntoIterator<Item = &'t TaskDefinition>,
    {
        let total_effort = tasks.into_iter().map(TaskDefinition::cycle_effort).sum();
        Self {
            users,
            scores,
            total_effort,
            effort: HashMap::new(),
        }
    }

    /// Count picks made outside the allocator (static owners) against the
    /// users' running effort.
    pub fn charge(&mut self, picks: &[Pick]) {
        for pick in picks {
            *self.effort.entry(pick.user_id).or_insert(0) += pick.effort;
        }
    }

    pub fn total_effort(&self) -> u64 {
        self.total_effort
    }

    /// Effort handed to `user` so far in this run.
    pub fn effort_of(&self, user: UserId) -> u64 {
        self.effort.get(&user).copied().unwrap_or(0)
    }

    /// Whether `user` may take another task right now.
    pub fn is_eligible(&self, user: &User) -> bool {
        if user.participation_share == 0 {
            return false;
        }
        let current = self.effort_of(user.id);
        current == 0
            || u128::from(current) * 100
                <= u128::from(user.participation_share) * u128::from(self.total_effort)
    }

    /// Pick a user for one task and charge them its effort.
    pub fn assign(&mut self, task: &TaskDefinition) -> Result<Pick, Unassigned> {
        let users: &'a [User] = self.users;
        let mut best: Option<(&'a User, i64)> = None;
        for user in users.iter().filter(|u| self.is_eligible(u)) {
            let score = self.scores.get(task.id, user.id);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((user, score));
            }
        }

        let Some((user, score)) = best else {
            warn!(task = %task.id, name = %task.name, "no eligible user; task left unassigned");
            return Err(Unassigned {
                task_id: task.id,
                task_name: task.name.clone(),
                reason: UnassignedReason::NoEligibleUser,
            });
        };

        let effort = task.cycle_effort();
        *self.effort.entry(user.id).or_insert(0) += effort;
        debug!(task = %task.id, user = %user.id, score, effort, "assigned dynamic task");

        Ok(Pick {
            task_id: task.id,
            task_name: task.name.clone(),
            unit: task.recurrence.unit,
            repeats_per_cycle: task.repeats_per_cycle,
            effort,
            user_id: user.id,
            user_name: user.name.clone(),
            kind: PickKind::Dynamic,
            score: Some(score),
        })
    }

    /// Allocate a batch in order.
    pub fn allocate_batch(&mut self, batch: &[TaskDefinition]) -> (Vec<Pick>, Vec<Unassigned>) {
        let mut picks = Vec::new();
        let mut unassigned = Vec::new();
        for task in batch {
            match self.assign(task) {
                Ok(pick) => picks.push(pick),
                Err(skipped) => unassigned.push(skipped),
            }
        }
        (picks, unassigned)
    }
}
