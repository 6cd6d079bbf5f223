// tests/integration/sqlite_store.rs

use choreshift::engine::{AssignmentEngine, EngineOptions, RunOptions, set_assignment_status};
use choreshift::errors::ChoreError;
use choreshift::model::{AssignmentId, TaskId, UserId};
use choreshift::store::{SqliteStore, SqliteStoreFactory, StoreFactory, TaskStore};
use choreshift::types::AssignmentStatus;
use choreshift_test_utils::builders::{HistoryBuilder, TaskBuilder, live_row, user};
use choreshift_test_utils::{days_ago, fixed_now, init_tracing};
use tempfile::TempDir;

fn seeded_tenant(factory: &SqliteStoreFactory, tenant: &str) -> SqliteStore {
    let mut store = factory.create(tenant).unwrap();
    store.insert_user(&user(1, "ada", 50)).unwrap();
    store.insert_user(&user(2, "bob", 50)).unwrap();
    store
        .insert_task(&TaskBuilder::new(1, "dishes").repeats(2).effort(15).build())
        .unwrap();
    store
        .insert_task(&TaskBuilder::new(2, "bins").owned_by(2).build())
        .unwrap();
    store
}

#[test]
fn schema_is_versioned_and_reapplied_safely() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("database-a.sqlite");

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.schema_version().unwrap(), Some(1));
    assert_eq!(store.path(), Some(path.as_path()));
    drop(store);

    let reopened = SqliteStore::open(&path).unwrap();
    assert_eq!(reopened.schema_version().unwrap(), Some(1));
}

#[test]
fn factory_discovers_tenants_from_file_names() {
    let dir = TempDir::new().unwrap();
    let factory = SqliteStoreFactory::new(dir.path(), "database-");

    assert!(factory.tenants().unwrap().is_empty());

    factory.create("flat").unwrap();
    factory.create("house_2").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a tenant").unwrap();

    assert_eq!(factory.tenants().unwrap(), vec!["flat", "house_2"]);
    assert!(dir.path().join("database-flat.sqlite").exists());
}

#[test]
fn factory_rejects_path_like_tenant_names() {
    let dir = TempDir::new().unwrap();
    let factory = SqliteStoreFactory::new(dir.path(), "database-");

    for bad in ["", "../escape", "a/b", "with space"] {
        let err = factory.open(bad).unwrap_err();
        assert!(matches!(err, ChoreError::StoreError(_)), "{bad:?} accepted");
        assert!(factory.create(bad).is_err(), "{bad:?} created");
    }
}

#[test]
fn opening_an_unknown_tenant_creates_nothing() {
    let dir = TempDir::new().unwrap();
    let factory = SqliteStoreFactory::new(dir.path(), "database-");
    drop(factory.create("flat").unwrap());

    let err = factory.open("falt").unwrap_err();
    match err {
        ChoreError::StoreError(msg) => assert!(msg.contains("unknown tenant 'falt'"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!factory.database_path("falt").exists());
    assert_eq!(factory.tenants().unwrap(), vec!["flat"]);

    let store = factory.open("flat").unwrap();
    assert!(store.active_users().unwrap().is_empty());
}

#[test]
fn engine_run_persists_across_reopen() {
    init_tracing();
    let now = fixed_now();
    let dir = TempDir::new().unwrap();
    let factory = SqliteStoreFactory::new(dir.path(), "database-");
    drop(seeded_tenant(&factory, "flat"));

    let mut store = factory.open("flat").unwrap();
    let report = AssignmentEngine::with_seed(EngineOptions::default(), 11)
        .run_at(store.as_mut(), RunOptions::default(), now)
        .unwrap();
    assert_eq!(report.picks.len(), 2);
    assert_eq!(report.rows.len(), 3);
    drop(store);

    let store = factory.open("flat").unwrap();
    let rows = store.assignments().unwrap();
    assert_eq!(rows.len(), 3);
    let dishes: Vec<AssignmentStatus> = rows
        .iter()
        .filter(|r| r.task_id == TaskId(1))
        .map(|r| r.status)
        .collect();
    assert_eq!(dishes, vec![AssignmentStatus::Pending, AssignmentStatus::Waiting]);
    let bins = rows.iter().find(|r| r.task_id == TaskId(2)).unwrap();
    assert_eq!(bins.user_id, UserId(2));
    assert!(rows.iter().all(|r| r.created_at == now));
}

#[test]
fn second_cycle_archives_and_promotes_through_sqlite() {
    init_tracing();
    let now = fixed_now();
    let dir = TempDir::new().unwrap();
    let factory = SqliteStoreFactory::new(dir.path(), "database-");
    let mut store = seeded_tenant(&factory, "flat");

    let last_week = days_ago(now, 7);
    let ids = store
        .insert_assignments(&[
            live_row(1, 1, AssignmentStatus::Pending, last_week),
            live_row(1, 1, AssignmentStatus::Waiting, last_week),
        ])
        .unwrap();
    assert_eq!(ids.len(), 2);

    let change =
        set_assignment_status(&mut store, ids[0], AssignmentStatus::Completed, None, now).unwrap();
    assert_eq!(change.promoted, Some(ids[1]));

    let report = AssignmentEngine::with_seed(EngineOptions::default(), 5)
        .run_at(&mut store, RunOptions::default(), now)
        .unwrap();
    let maintenance = report.maintenance.unwrap();
    assert_eq!(maintenance.failed_rows, 1);
    assert_eq!(maintenance.archived_rows, 2);

    let history = store.history_since(days_ago(now, 30)).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|h| h.repeats_per_cycle == Some(2)));
    assert!(history.iter().all(|h| h.archived_at == now));

    let latest = store.latest_history_per_task().unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].task_id, TaskId(1));
}

#[test]
fn rollback_discards_writes() {
    let dir = TempDir::new().unwrap();
    let factory = SqliteStoreFactory::new(dir.path(), "database-");
    let mut store = seeded_tenant(&factory, "flat");
    let now = fixed_now();

    store.begin().unwrap();
    store
        .insert_assignments(&[live_row(1, 1, AssignmentStatus::Pending, now)])
        .unwrap();
    store.set_penalty_points(TaskId(1), UserId(1), 3).unwrap();
    store.deactivate_tasks(&[TaskId(1)], now).unwrap();
    store.rollback().unwrap();

    assert!(store.assignments().unwrap().is_empty());
    assert!(store.penalty_points().unwrap().is_empty());
    assert!(store.task(TaskId(1)).unwrap().unwrap().is_active);
}

#[test]
fn penalty_points_upsert_and_delete() {
    let dir = TempDir::new().unwrap();
    let factory = SqliteStoreFactory::new(dir.path(), "database-");
    let mut store = seeded_tenant(&factory, "flat");

    store.set_penalty_points(TaskId(1), UserId(1), 4).unwrap();
    store.set_penalty_points(TaskId(1), UserId(1), 2).unwrap();
    let points = store.penalty_points().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].points, 2);

    store.delete_penalty_point(TaskId(1), UserId(1)).unwrap();
    assert!(store.penalty_points().unwrap().is_empty());
}

#[test]
fn history_reads_are_newest_first_and_keep_missing_snapshots() {
    let now = fixed_now();
    let dir = TempDir::new().unwrap();
    let factory = SqliteStoreFactory::new(dir.path(), "database-");
    let mut store = seeded_tenant(&factory, "flat");

    store
        .append_history(&[
            HistoryBuilder::new(1, 1, AssignmentStatus::Completed, days_ago(now, 20)).build(),
            HistoryBuilder::new(1, 2, AssignmentStatus::Failed, days_ago(now, 5)).build(),
            HistoryBuilder::new(2, 2, AssignmentStatus::Completed, days_ago(now, 200))
                .without_snapshot()
                .build(),
        ])
        .unwrap();

    let recent = store.history_since(days_ago(now, 100)).unwrap();
    let order: Vec<UserId> = recent.iter().map(|h| h.user_id).collect();
    assert_eq!(order, vec![UserId(2), UserId(1)]);

    let latest = store.latest_history_per_task().unwrap();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].status, AssignmentStatus::Failed);
    assert_eq!(latest[1].task_id, TaskId(2));
    assert_eq!(latest[1].recurrence, None);
}

#[test]
fn update_of_missing_row_reports_false() {
    let dir = TempDir::new().unwrap();
    let factory = SqliteStoreFactory::new(dir.path(), "database-");
    let mut store = seeded_tenant(&factory, "flat");
    let updated = store
        .update_assignment(AssignmentId(77), AssignmentStatus::Completed, None, fixed_now())
        .unwrap();
    assert!(!updated);
}
