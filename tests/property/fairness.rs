use std::collections::HashMap;

use proptest::prelude::*;
use choreshift::engine::{Allocator, ScoreBoard};
use choreshift::model::{TaskDefinition, User, UserId};
use choreshift_test_utils::builders::{TaskBuilder, user};

fn roster(shares: Vec<u8>) -> Vec<User> {
    shares
        .into_iter()
        .enumerate()
        .map(|(i, share)| user(i as i64 + 1, &format!("user {i}"), share))
        .collect()
}

/// Shares that add up to exactly 100, some of them possibly zero.
fn household_strategy() -> impl Strategy<Value = Vec<User>> {
    proptest::collection::vec(0u8..=100, 0..4).prop_map(|mut cuts| {
        cuts.sort_unstable();
        let mut shares = Vec::with_capacity(cuts.len() + 1);
        let mut previous = 0u8;
        for cut in cuts {
            shares.push(cut - previous);
            previous = cut;
        }
        shares.push(100 - previous);
        roster(shares)
    })
}

fn any_shares_strategy() -> impl Strategy<Value = Vec<User>> {
    proptest::collection::vec(0u8..=100, 1..5).prop_map(roster)
}

fn tasks_strategy() -> impl Strategy<Value = Vec<TaskDefinition>> {
    proptest::collection::vec((0u32..90, 1u32..4), 1..15).prop_map(|shapes| {
        shapes
            .into_iter()
            .enumerate()
            .map(|(i, (effort, repeats))| {
                TaskBuilder::new(i as i64 + 1, &format!("task {i}"))
                    .effort(effort)
                    .repeats(repeats)
                    .build()
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn no_user_exceeds_their_share_by_more_than_one_task(
        users in household_strategy(),
        tasks in tasks_strategy(),
        raw_scores in proptest::collection::vec(-60i64..60, 60),
    ) {
        let mut scores = ScoreBoard::default();
        let mut k = 0;
        for task in &tasks {
            for u in &users {
                scores.set(task.id, u.id, raw_scores[k % raw_scores.len()]);
                k += 1;
            }
        }

        let mut allocator = Allocator::new(&users, &scores, &tasks);
        let total = allocator.total_effort();
        let (picks, unassigned) = allocator.allocate_batch(&tasks);
        prop_assert_eq!(picks.len() + unassigned.len(), tasks.len());
        // Shares cover the whole household, so someone is always under cap.
        prop_assert!(unassigned.is_empty(), "unassigned: {:?}", unassigned);

        let largest = tasks.iter().map(TaskDefinition::cycle_effort).max().unwrap_or(0);
        let mut assigned: HashMap<UserId, u64> = HashMap::new();
        for pick in &picks {
            *assigned.entry(pick.user_id).or_default() += pick.effort;
        }

        for u in &users {
            let effort = assigned.get(&u.id).copied().unwrap_or(0);
            prop_assert_eq!(effort, allocator.effort_of(u.id));
            if u.participation_share == 0 {
                prop_assert_eq!(effort, 0);
                continue;
            }
            // effort * 100 <= share * total + largest * 100
            prop_assert!(
                u128::from(effort) * 100
                    <= u128::from(u.participation_share) * u128::from(total)
                        + u128::from(largest) * 100,
                "user {} got {} of {} with share {}",
                u.id, effort, total, u.participation_share
            );
        }
    }

    #[test]
    fn someone_always_takes_a_task_while_a_participant_is_idle(
        users in any_shares_strategy(),
        tasks in tasks_strategy(),
    ) {
        let scores = ScoreBoard::default();
        let mut allocator = Allocator::new(&users, &scores, &tasks);
        let any_participant = users.iter().any(|u| u.participation_share > 0);

        for task in &tasks {
            let idle = users
                .iter()
                .any(|u| u.participation_share > 0 && allocator.effort_of(u.id) == 0);
            let result = allocator.assign(task);
            if idle {
                prop_assert!(result.is_ok());
            }
            if !any_participant {
                prop_assert!(result.is_err());
            }
        }
    }
}
