use std::collections::{BTreeMap, HashMap};

use proptest::prelude::*;
use choreshift::engine::maintenance::{apply_to_points, plan_ledger_corrections};
use choreshift::model::{PenaltyPoint, TaskId, UserId};

fn ledger_strategy() -> impl Strategy<Value = Vec<PenaltyPoint>> {
    // Unique (task, user) pairs, like the store's primary key.
    proptest::collection::btree_map((1i64..8, 1i64..5), 0u32..12, 0..20).prop_map(
        |entries: BTreeMap<(i64, i64), u32>| {
            entries
                .into_iter()
                .map(|((task, user), points)| PenaltyPoint {
                    task_id: TaskId(task),
                    user_id: UserId(user),
                    points,
                })
                .collect()
        },
    )
}

fn totals(points: &[PenaltyPoint]) -> HashMap<UserId, u64> {
    let mut out = HashMap::new();
    for p in points {
        *out.entry(p.user_id).or_insert(0) += u64::from(p.points);
    }
    out
}

proptest! {
    #[test]
    fn correction_fits_every_user_into_the_budget(
        ledger in ledger_strategy(),
        task_count in 0u64..10,
    ) {
        let plan = plan_ledger_corrections(task_count, &ledger);
        let corrected = apply_to_points(&ledger, &plan);

        for (user, total) in totals(&corrected) {
            prop_assert!(total <= task_count, "user {} still holds {}", user, total);
        }
    }

    #[test]
    fn correction_is_idempotent(
        ledger in ledger_strategy(),
        task_count in 0u64..10,
    ) {
        let once = apply_to_points(&ledger, &plan_ledger_corrections(task_count, &ledger));
        let again = plan_ledger_corrections(task_count, &once);
        prop_assert!(again.is_empty());
    }

    #[test]
    fn correction_only_shrinks_entries(
        ledger in ledger_strategy(),
        task_count in 0u64..10,
    ) {
        let before: HashMap<(TaskId, UserId), u32> =
            ledger.iter().map(|p| ((p.task_id, p.user_id), p.points)).collect();
        let corrected = apply_to_points(&ledger, &plan_ledger_corrections(task_count, &ledger));

        for p in &corrected {
            let old = before.get(&(p.task_id, p.user_id)).copied();
            prop_assert!(old.is_some_and(|old| p.points <= old));
        }

        // Users already within budget are untouched.
        let after = totals(&corrected);
        for (user, total) in totals(&ledger) {
            if total <= task_count {
                prop_assert_eq!(after.get(&user).copied().unwrap_or(0), total);
            }
        }
    }
}
