// src/engine/scorer.rs

//! Affinity scores for (dynamic task, user) pairs.
//!
//! Higher is better. A score starts at zero, loses the user's penalty points
//! for the task, loses a decaying amount for every recent completion by the
//! user, and gains a flat bonus when the user's last go at the task was
//! postponed or failed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::{HistoryEntry, PenaltyPoint, TaskDefinition, TaskId, User, UserId};
use crate::types::AssignmentStatus;

/// Completions older than this no longer cost anything.
pub const RECENCY_WINDOW_DAYS: f64 = 60.0;

/// Bonus for a user whose most recent entry for the task was dropped.
pub const DROPPED_BONUS: i64 = 50;

const MILLIS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreBoard {
    scores: HashMap<(TaskId, UserId), i64>,
}

impl ScoreBoard {
    /// Score of a pair; unscored pairs count as zero.
    pub fn get(&self, task: TaskId, user: UserId) -> i64 {
        self.scores.get(&(task, user)).copied().unwrap_or(0)
    }

    pub fn set(&mut self, task: TaskId, user: UserId, score: i64) {
        self.scores.insert((task, user), score);
    }
}

/// Cost of one completed history entry at `now`.
///
/// Decays linearly from 5 (just now) to 1 (60 days ago), divided by how many
/// times the task repeated per cycle back then, and drops to 0 after 60 days.
pub fn recency_penalty(entry: &HistoryEntry, now: DateTime<Utc>) -> i64 {
    let days_ago = (now - entry.created_at).num_milliseconds() as f64 / MILLIS_PER_DAY;
    if days_ago > RECENCY_WINDOW_DAYS {
        return 0;
    }
    let repeats = f64::from(entry.repeats_per_cycle.unwrap_or(1).max(1));
    ((5.0 - (days_ago / RECENCY_WINDOW_DAYS) * 4.0) / repeats).round() as i64
}

/// Score one pair.
///
/// `history` must be the pair's entries only, newest first.
pub fn score_pair(points: u32, history: &[&HistoryEntry], now: DateTime<Utc>) -> i64 {
    let mut score = -i64::from(points);

    for entry in history
        .iter()
        .filter(|e| e.status == AssignmentStatus::Completed)
    {
        score -= recency_penalty(entry, now);
    }

    if history.first().is_some_and(|last| last.status.is_dropped()) {
        score += DROPPED_BONUS;
    }
    score
}

/// Score every (task, user) pair.
///
/// `history` is the lookback window, newest first.
pub fn score_all(
    tasks: &[TaskDefinition],
    users: &[User],
    points: &[PenaltyPoint],
    history: &[HistoryEntry],
    now: DateTime<Utc>,
) -> ScoreBoard {
    let points: HashMap<(TaskId, UserId), u32> = points
        .iter()
        .map(|p| ((p.task_id, p.user_id), p.points))
        .collect();

    let mut by_pair: HashMap<(TaskId, UserId), Vec<&HistoryEntry>> = HashMap::new();
    for entry in history {
        by_pair
            .entry((entry.task_id, entry.user_id))
            .or_default()
            .push(entry);
    }

    let mut board = ScoreBoard::default();
    for task in tasks {
        for user in users {
            let key = (task.id, user.id);
            let held = points.get(&key).copied().unwrap_or(0);
            let entries = by_pair.get(&key).map(Vec::as_slice).unwrap_or(&[]);
            let score = score_pair(held, entries, now);
            debug!(task = %task.id, user = %user.id, points = held, score, "scored pair");
            board.set(task.id, user.id, score);
        }
    }
    board
}
