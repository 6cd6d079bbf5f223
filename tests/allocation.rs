use choreshift::engine::{
    AssignmentEngine, EngineOptions, PickKind, RunOptions, RunReport, UnassignedReason,
};
use choreshift::errors::ChoreError;
use choreshift::model::{TaskId, UserId};
use choreshift::store::{MemoryStore, TaskStore};
use choreshift::types::{AssignmentStatus, RecurrenceUnit};
use choreshift_test_utils::builders::{
    HistoryBuilder, TaskBuilder, live_row, points, seeded_store, user,
};
use choreshift_test_utils::failing_store::{FailOn, FailingStore};
use choreshift_test_utils::{days_ago, fixed_now, init_tracing};

fn engine(seed: u64) -> AssignmentEngine {
    AssignmentEngine::with_seed(EngineOptions::default(), seed)
}

fn run(store: &MemoryStore, options: RunOptions) -> RunReport {
    let mut handle = store.clone();
    engine(7).run_at(&mut handle, options, fixed_now()).unwrap()
}

fn dry() -> RunOptions {
    RunOptions {
        dry_run: true,
        ..RunOptions::default()
    }
}

#[test]
fn repeated_task_becomes_one_pending_and_waiting_rows() {
    init_tracing();
    let store = seeded_store(
        vec![user(1, "ada", 100)],
        vec![TaskBuilder::new(1, "dishes").repeats(3).build()],
    );

    let report = run(&store, RunOptions::default());

    assert_eq!(report.picks.len(), 1);
    assert_eq!(report.rows.len(), 3);
    let statuses: Vec<AssignmentStatus> =
        store.assignments().unwrap().iter().map(|a| a.status).collect();
    assert_eq!(
        statuses,
        vec![
            AssignmentStatus::Pending,
            AssignmentStatus::Waiting,
            AssignmentStatus::Waiting
        ]
    );
}

#[test]
fn ties_go_to_the_first_user_in_roster_order() {
    init_tracing();
    let store = seeded_store(
        vec![user(2, "bob", 50), user(1, "ada", 50)],
        vec![TaskBuilder::new(1, "dishes").build()],
    );

    let report = run(&store, RunOptions::default());

    assert_eq!(report.picks[0].user_id, UserId(1));
    assert_eq!(report.picks[0].score, Some(0));
}

#[test]
fn user_who_failed_last_time_gets_the_bonus() {
    init_tracing();
    let now = fixed_now();
    let store = seeded_store(
        vec![user(1, "ada", 50), user(2, "bob", 50)],
        vec![TaskBuilder::new(1, "dishes").build()],
    );
    store.add_history(HistoryBuilder::new(1, 2, AssignmentStatus::Failed, days_ago(now, 1)).build());

    let report = run(&store, RunOptions::default());

    let pick = &report.picks[0];
    assert_eq!(pick.user_id, UserId(2));
    assert_eq!(pick.score, Some(50));
}

#[test]
fn open_row_left_from_last_cycle_is_failed_and_handed_back() {
    init_tracing();
    let now = fixed_now();
    let store = seeded_store(
        vec![user(1, "ada", 50), user(2, "bob", 50)],
        vec![TaskBuilder::new(1, "dishes").build()],
    );
    store.add_assignment(live_row(1, 2, AssignmentStatus::Pending, days_ago(now, 7)));

    let report = run(&store, RunOptions::default());

    let maintenance = report.maintenance.as_ref().unwrap();
    assert_eq!(maintenance.failed_rows, 1);
    assert_eq!(maintenance.archived_rows, 1);
    assert_eq!(store.history()[0].status, AssignmentStatus::Failed);

    assert_eq!(report.picks[0].user_id, UserId(2));
    assert_eq!(report.picks[0].score, Some(50));
}

#[test]
fn recent_completion_and_penalty_points_steer_away() {
    init_tracing();
    let now = fixed_now();
    let store = seeded_store(
        vec![user(1, "ada", 50), user(2, "bob", 50)],
        vec![
            TaskBuilder::new(1, "dishes").build(),
            TaskBuilder::new(2, "hoover").build(),
        ],
    );
    // ada: -round(5 - 10/60*4) = -4 on dishes.
    store.add_history(
        HistoryBuilder::new(1, 1, AssignmentStatus::Completed, days_ago(now, 10)).build(),
    );
    // bob holds a point against hoovering.
    store.add_penalty_point(points(2, 2, 1));

    let report = run(&store, RunOptions::default());

    let by_task = |id: i64| {
        report
            .picks
            .iter()
            .find(|p| p.task_id == TaskId(id))
            .unwrap()
    };
    assert_eq!(by_task(1).user_id, UserId(2));
    assert_eq!(by_task(1).score, Some(0));
    assert_eq!(by_task(2).user_id, UserId(1));
}

#[test]
fn static_tasks_skip_scoring_and_report_missing_owners() {
    init_tracing();
    let now = fixed_now();
    let store = seeded_store(
        vec![user(1, "ada", 50), user(2, "bob", 50)],
        vec![
            TaskBuilder::new(1, "bins").owned_by(1).build(),
            TaskBuilder::new(2, "car").owned_by(2).build(),
            TaskBuilder::new(3, "garden").owned_by(9).build(),
        ],
    );
    store.remove_user(UserId(2), days_ago(now, 1));

    let report = run(&store, RunOptions::default());

    assert_eq!(report.picks.len(), 1);
    assert_eq!(report.picks[0].task_id, TaskId(1));
    assert_eq!(report.picks[0].kind, PickKind::Static);
    assert_eq!(report.picks[0].score, None);

    let missing: Vec<(TaskId, UnassignedReason)> = report
        .unassigned
        .iter()
        .map(|u| (u.task_id, u.reason.clone()))
        .collect();
    assert_eq!(
        missing,
        vec![
            (TaskId(2), UnassignedReason::OwnerMissing { owner: UserId(2) }),
            (TaskId(3), UnassignedReason::OwnerMissing { owner: UserId(9) }),
        ]
    );
}

#[test]
fn opted_out_users_only_receive_static_tasks() {
    init_tracing();
    let store = seeded_store(
        vec![user(1, "ada", 0)],
        vec![
            TaskBuilder::new(1, "dishes").build(),
            TaskBuilder::new(2, "bins").owned_by(1).build(),
        ],
    );

    let report = run(&store, RunOptions::default());

    assert_eq!(report.picks.len(), 1);
    assert_eq!(report.picks[0].task_id, TaskId(2));
    assert_eq!(report.unassigned.len(), 1);
    assert_eq!(report.unassigned[0].task_id, TaskId(1));
    assert_eq!(report.unassigned[0].reason, UnassignedReason::NoEligibleUser);
}

#[test]
fn workload_cap_stops_a_user_once_over_their_share() {
    init_tracing();
    let store = seeded_store(
        vec![user(1, "ada", 50), user(2, "bob", 50)],
        (1..=4)
            .map(|i| TaskBuilder::new(i, &format!("chore {i}")).effort(10).build())
            .collect(),
    );

    let report = run(&store, RunOptions::default());

    // ada wins every tie until past 50% of 40 minutes.
    let ada = report.picks.iter().filter(|p| p.user_id == UserId(1)).count();
    let bob = report.picks.iter().filter(|p| p.user_id == UserId(2)).count();
    assert_eq!((ada, bob), (3, 1));
    assert!(report.unassigned.is_empty());
}

#[test]
fn static_work_counts_toward_the_owners_share() {
    init_tracing();
    let store = seeded_store(
        vec![user(1, "ada", 50), user(2, "bob", 50)],
        vec![
            TaskBuilder::new(1, "garden").owned_by(1).effort(100).build(),
            TaskBuilder::new(2, "dishes").effort(10).build(),
            TaskBuilder::new(3, "hoover").effort(10).build(),
        ],
    );

    let report = run(&store, dry());

    // 120 minutes due; ada already carries 100 of them.
    let effort_of = |id: i64| -> u64 {
        report
            .picks
            .iter()
            .filter(|p| p.user_id == UserId(id))
            .map(|p| p.effort)
            .sum()
    };
    assert_eq!(effort_of(1), 100);
    assert_eq!(effort_of(2), 20);
    assert!(
        report
            .picks
            .iter()
            .filter(|p| p.kind == PickKind::Dynamic)
            .all(|p| p.user_id == UserId(2))
    );
    assert!(report.unassigned.is_empty());
}

#[test]
fn dry_run_writes_nothing() {
    init_tracing();
    let now = fixed_now();
    let store = seeded_store(
        vec![user(1, "ada", 100)],
        vec![
            TaskBuilder::new(1, "dishes").build(),
            TaskBuilder::new(2, "fix shelf").once().build(),
        ],
    );
    store.add_assignment(live_row(2, 1, AssignmentStatus::Completed, days_ago(now, 7)));
    store.add_penalty_point(points(1, 1, 5));

    for options in [
        dry(),
        RunOptions {
            clear_and_reassign: true,
            ..dry()
        },
    ] {
        let report = run(&store, options);

        assert!(report.maintenance.is_none());
        assert_eq!(report.cleared_rows, 0);
        assert!(!report.picks.is_empty());
        assert_eq!(report.rows.len(), report.picks.len());

        assert_eq!(store.assignments().unwrap().len(), 1);
        assert!(store.history().is_empty());
        assert_eq!(store.penalty_points().unwrap(), vec![points(1, 1, 5)]);
        assert!(store.task(TaskId(2)).unwrap().unwrap().is_active);
    }
}

#[test]
fn clear_and_reassign_skips_maintenance() {
    init_tracing();
    let now = fixed_now();
    let store = seeded_store(
        vec![user(1, "ada", 100)],
        vec![TaskBuilder::new(1, "dishes").repeats(2).build()],
    );
    store.add_assignment(live_row(1, 1, AssignmentStatus::Pending, days_ago(now, 1)));
    store.add_assignment(live_row(1, 1, AssignmentStatus::Waiting, days_ago(now, 1)));
    store.add_penalty_point(points(1, 1, 4));

    let report = run(
        &store,
        RunOptions {
            clear_and_reassign: true,
            ..RunOptions::default()
        },
    );

    assert!(report.maintenance.is_none());
    assert_eq!(report.cleared_rows, 2);
    assert!(store.history().is_empty());
    assert_eq!(store.penalty_points().unwrap(), vec![points(1, 1, 4)]);

    let rows = store.assignments().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.created_at == now));
}

#[test]
fn failed_write_rolls_back_the_whole_run() {
    init_tracing();
    let now = fixed_now();
    let store = seeded_store(
        vec![user(1, "ada", 100)],
        vec![
            TaskBuilder::new(1, "dishes").build(),
            TaskBuilder::new(2, "fix shelf").once().build(),
        ],
    );
    store.add_assignment(live_row(1, 1, AssignmentStatus::Pending, days_ago(now, 7)));
    store.add_assignment(live_row(2, 1, AssignmentStatus::Completed, days_ago(now, 7)));
    store.add_penalty_point(points(1, 1, 5));

    let mut failing = FailingStore::new(store.clone(), FailOn::InsertAssignments);
    let err = engine(1)
        .run_at(&mut failing, RunOptions::default(), now)
        .unwrap_err();
    assert!(matches!(err, ChoreError::StoreError(_)));

    let rows = store.assignments().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].status, AssignmentStatus::Pending);
    assert!(store.history().is_empty());
    assert_eq!(store.penalty_points().unwrap(), vec![points(1, 1, 5)]);
    assert!(store.task(TaskId(2)).unwrap().unwrap().is_active);
}

#[test]
fn grouped_runs_hand_out_weekly_before_monthly_before_once() {
    init_tracing();
    let mut tasks = Vec::new();
    for i in 1..=3 {
        tasks.push(TaskBuilder::new(i, &format!("weekly {i}")).weekly(1).build());
        tasks.push(TaskBuilder::new(10 + i, &format!("monthly {i}")).monthly(1).build());
    }
    tasks.push(TaskBuilder::new(21, "once a").once().build());
    tasks.push(TaskBuilder::new(22, "once b").once().build());

    for seed in 0..5 {
        let store = seeded_store(vec![user(1, "ada", 100)], tasks.clone());
        let mut handle = store.clone();
        let report = engine(seed)
            .run_at(
                &mut handle,
                RunOptions {
                    group_by_recurrence: true,
                    ..dry()
                },
                fixed_now(),
            )
            .unwrap();

        let units: Vec<RecurrenceUnit> = report.picks.iter().map(|p| p.unit).collect();
        let mut sorted = units.clone();
        sorted.sort();
        assert_eq!(units, sorted, "seed {seed}");
        assert_eq!(units.len(), 8);
    }
}

#[test]
fn tasks_gated_in_the_future_are_left_alone() {
    init_tracing();
    let now = fixed_now();
    let store = seeded_store(
        vec![user(1, "ada", 100)],
        vec![
            TaskBuilder::new(1, "dishes").build(),
            TaskBuilder::new(2, "spring clean")
                .eligible_from(now + chrono::Duration::days(30))
                .build(),
        ],
    );

    let report = run(&store, dry());

    let ids: Vec<TaskId> = report.picks.iter().map(|p| p.task_id).collect();
    assert_eq!(ids, vec![TaskId(1)]);
}
