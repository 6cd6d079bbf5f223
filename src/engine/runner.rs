// src/engine/runner.rs

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use super::allocator::{Allocator, allocate_static, order_dynamic};
use super::maintenance::run_maintenance;
use super::persister::{expand_picks, persist};
use super::qualify::{partition, qualify};
use super::scorer::score_all;
use super::{EngineOptions, RunOptions, RunReport};
use crate::errors::Result;
use crate::store::TaskStore;

/// Runs allocation cycles against one store at a time.
///
/// The engine owns its random source so tests can fix the shuffle order
/// with [`AssignmentEngine::with_seed`].
#[derive(Debug)]
pub struct AssignmentEngine {
    options: EngineOptions,
    rng: StdRng,
}

impl AssignmentEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(options: EngineOptions, seed: u64) -> Self {
        Self {
            options,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn run(&mut self, store: &mut dyn TaskStore, run: RunOptions) -> Result<RunReport> {
        self.run_at(store, run, Utc::now())
    }

    /// Run one cycle as of `now`.
    ///
    /// A dry run only reads. Any other run happens inside one store
    /// transaction and is rolled back as a whole if a step fails.
    pub fn run_at(
        &mut self,
        store: &mut dyn TaskStore,
        run: RunOptions,
        now: DateTime<Utc>,
    ) -> Result<RunReport> {
        info!(
            dry_run = run.dry_run,
            clear_and_reassign = run.clear_and_reassign,
            group_by_recurrence = run.group_by_recurrence,
            "starting assignment run"
        );

        if run.dry_run {
            let report = self.plan(store, run, now)?;
            info!(
                picks = report.picks.len(),
                unassigned = report.unassigned.len(),
                "dry run finished; nothing written"
            );
            return Ok(report);
        }

        store.begin()?;
        match self.run_in_transaction(store, run, now) {
            Ok(report) => {
                store.commit()?;
                info!(
                    picks = report.picks.len(),
                    rows = report.rows.len(),
                    unassigned = report.unassigned.len(),
                    "assignment run committed"
                );
                Ok(report)
            }
            Err(err) => {
                if let Err(rollback_err) = store.rollback() {
                    warn!(error = %rollback_err, "rollback after failed run also failed");
                }
                Err(err)
            }
        }
    }

    fn run_in_transaction(
        &mut self,
        store: &mut dyn TaskStore,
        run: RunOptions,
        now: DateTime<Utc>,
    ) -> Result<RunReport> {
        let (maintenance, cleared_rows) = if run.clear_and_reassign {
            let cleared = store.clear_assignments()?;
            info!(cleared, "cleared live assignments before reassigning");
            (None, cleared)
        } else {
            (Some(run_maintenance(store, now)?), 0)
        };

        let mut report = self.plan(store, run, now)?;
        report.maintenance = maintenance;
        report.cleared_rows = cleared_rows;

        persist(store, &report.rows)?;
        Ok(report)
    }

    /// Qualify, score and allocate without writing anything.
    fn plan(
        &mut self,
        store: &dyn TaskStore,
        run: RunOptions,
        now: DateTime<Utc>,
    ) -> Result<RunReport> {
        let users = store.active_users()?;
        let tasks = store.tasks()?;
        let latest = store.latest_history_per_task()?;

        let tolerance = Duration::hours(i64::from(self.options.qualification_tolerance_hours));
        let (statics, dynamics) = partition(qualify(&tasks, &latest, now, tolerance));
        debug!(
            users = users.len(),
            static_tasks = statics.len(),
            dynamic_tasks = dynamics.len(),
            "qualified tasks"
        );

        let since = now - Duration::days(i64::from(self.options.lookback_days));
        let history = store.history_since(since)?;
        let points = store.penalty_points()?;
        let scores = score_all(&dynamics, &users, &points, &history, now);

        let (mut picks, mut unassigned) = allocate_static(&statics, &users);

        let due = statics.iter().map(|(task, _)| task).chain(&dynamics);
        let mut allocator = Allocator::new(&users, &scores, due);
        allocator.charge(&picks);
        debug!(total_effort = allocator.total_effort(), "allocating dynamic tasks");
        for batch in order_dynamic(dynamics, &mut self.rng, run.group_by_recurrence) {
            let (batch_picks, batch_unassigned) = allocator.allocate_batch(&batch);
            picks.extend(batch_picks);
            unassigned.extend(batch_unassigned);
        }

        let rows = expand_picks(&picks, now);
        Ok(RunReport {
            options: run,
            picks,
            rows,
            unassigned,
            maintenance: None,
            cleared_rows: 0,
        })
    }
}
