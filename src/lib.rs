// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod model;
pub mod store;
pub mod tenant;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{error, info, info_span, warn};

use crate::cli::{CliArgs, Command, GrantPointsArgs, PointsArgs, RunArgs, SetStatusArgs};
use crate::config::model::ConfigFile;
use crate::config::{default_config_path, load_and_validate, load_or_default};
use crate::engine::{
    AssignmentEngine, PointBudget, PointGrant, RunOptions, RunReport, StatusChange, TaskPoints,
    UnassignedReason, available_points, grant_penalty_points, points_by_task,
    set_assignment_status,
};
use crate::model::{AssignmentId, TaskId, UserId};
use crate::store::SqliteStoreFactory;
use crate::tenant::TenantRegistry;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the per-tenant SQLite store registry
/// - the engine run or status update the subcommand asks for
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_config(Path::new(&args.config))?;

    let factory = SqliteStoreFactory::new(
        cfg.store().data_dir.clone(),
        cfg.store().file_prefix.clone(),
    );
    let registry = Arc::new(TenantRegistry::new(Arc::new(factory)));

    let outcome = match args.command {
        Command::Run(run_args) => run_tenants(&cfg, Arc::clone(&registry), run_args).await,
        Command::SetStatus(status_args) => set_status(Arc::clone(&registry), status_args).await,
        Command::Points(points_args) => show_points(Arc::clone(&registry), points_args).await,
        Command::GrantPoints(grant_args) => {
            let max = cfg.engine().max_points_per_task;
            grant_points(Arc::clone(&registry), grant_args, max).await
        }
    };

    registry.evict_all()?;
    outcome
}

/// The default path may be absent; an explicitly named one may not.
fn load_config(path: &Path) -> Result<ConfigFile> {
    let cfg = if path == default_config_path() {
        load_or_default(path)?
    } else {
        load_and_validate(path)?
    };
    Ok(cfg)
}

async fn run_tenants(cfg: &ConfigFile, registry: Arc<TenantRegistry>, args: RunArgs) -> Result<()> {
    let tenants = if args.tenants.is_empty() {
        registry.known_tenants()?
    } else {
        args.tenants.clone()
    };
    if tenants.is_empty() {
        warn!(data_dir = %cfg.store().data_dir.display(), "no tenants to run");
        return Ok(());
    }

    let options = RunOptions {
        dry_run: args.dry_run,
        clear_and_reassign: args.clear_and_reassign,
        group_by_recurrence: args.group_by_recurrence || cfg.engine().group_by_recurrence,
    };
    let engine_options = cfg.engine_options();
    info!(tenants = tenants.len(), ?options, "running assignment cycle");

    // Each tenant runs on the blocking pool; the registry serializes runs
    // for the same tenant.
    let mut handles = Vec::with_capacity(tenants.len());
    for tenant in tenants {
        let registry = Arc::clone(&registry);
        let name = tenant.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _span = info_span!("tenant", tenant = %name).entered();
            let mut engine = AssignmentEngine::new(engine_options);
            registry.with_store(&name, |store| engine.run(store, options))
        });
        handles.push((tenant, handle));
    }

    let mut failed = 0usize;
    for (tenant, handle) in handles {
        match handle.await? {
            Ok(report) => print_report(&tenant, &report, args.json)?,
            Err(err) => {
                error!(tenant = %tenant, error = %err, "assignment run failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} tenant run(s) failed");
    }
    Ok(())
}

async fn set_status(registry: Arc<TenantRegistry>, args: SetStatusArgs) -> Result<()> {
    let SetStatusArgs {
        tenant,
        id,
        status,
        user,
        json,
    } = args;

    let name = tenant.clone();
    let change = tokio::task::spawn_blocking(move || {
        registry.with_store(&name, |store| {
            set_assignment_status(store, AssignmentId(id), status, user.map(UserId), Utc::now())
        })
    })
    .await??;

    print_status_change(&tenant, &change, json)
}

async fn show_points(registry: Arc<TenantRegistry>, args: PointsArgs) -> Result<()> {
    let PointsArgs { tenant, user, json } = args;

    let name = tenant.clone();
    let (budget, tasks) = tokio::task::spawn_blocking(move || {
        registry.with_store(&name, |store| {
            let budget = available_points(&*store, UserId(user))?;
            let tasks = points_by_task(&*store, UserId(user))?;
            Ok((budget, tasks))
        })
    })
    .await??;

    print_points(&tenant, &budget, &tasks, json)
}

async fn grant_points(registry: Arc<TenantRegistry>, args: GrantPointsArgs, max: u32) -> Result<()> {
    let GrantPointsArgs {
        tenant,
        user,
        task,
        points,
        json,
    } = args;

    let name = tenant.clone();
    let grant = tokio::task::spawn_blocking(move || {
        registry.with_store(&name, |store| {
            grant_penalty_points(store, TaskId(task), UserId(user), points, max)
        })
    })
    .await??;

    print_grant(&tenant, &grant, json)
}

fn print_report(tenant: &str, report: &RunReport, json: bool) -> Result<()> {
    if json {
        let doc = serde_json::json!({ "tenant": tenant, "report": report });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    let mode = if report.options.dry_run {
        "dry run"
    } else {
        "committed"
    };
    println!("[{tenant}] {mode}: {} pick(s), {} row(s)", report.picks.len(), report.rows.len());

    if let Some(m) = &report.maintenance {
        println!(
            "  maintenance: {} retired, {} failed, {} archived, {} ledger change(s)",
            m.retired_tasks.len(),
            m.failed_rows,
            m.archived_rows,
            m.ledger.len()
        );
    }
    if report.cleared_rows > 0 {
        println!("  cleared {} live assignment(s)", report.cleared_rows);
    }

    for pick in &report.picks {
        let score = pick
            .score
            .map(|s| format!("score {s}"))
            .unwrap_or_else(|| "static".to_string());
        println!(
            "  {} ({}) -> {} ({})  {} x{}, {} min, {}",
            pick.task_name,
            pick.task_id,
            pick.user_name,
            pick.user_id,
            pick.unit,
            pick.repeats_per_cycle,
            pick.effort,
            score
        );
    }

    for skipped in &report.unassigned {
        let why = match &skipped.reason {
            UnassignedReason::OwnerMissing { owner } => format!("owner {owner} is not active"),
            UnassignedReason::NoEligibleUser => "no eligible user".to_string(),
        };
        println!("  unassigned {} ({}): {why}", skipped.task_name, skipped.task_id);
    }
    Ok(())
}

fn print_status_change(tenant: &str, change: &StatusChange, json: bool) -> Result<()> {
    if json {
        let doc = serde_json::json!({ "tenant": tenant, "change": change });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!(
        "[{tenant}] {} ({}) is now {}",
        change.assignment_id, change.task_id, change.status
    );
    if let Some(user) = change.reassigned_to {
        println!("  reassigned to {user}");
    }
    if let Some(next) = change.promoted {
        println!("  promoted {next} to pending");
    }
    for id in &change.demoted {
        println!("  demoted {id} to waiting");
    }
    Ok(())
}

fn print_points(tenant: &str, budget: &PointBudget, tasks: &[TaskPoints], json: bool) -> Result<()> {
    if json {
        let doc = serde_json::json!({
            "tenant": tenant,
            "budget": budget,
            "available": budget.available(),
            "tasks": tasks,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!(
        "[{tenant}] {}: {} of {} point(s) spent, {} available",
        budget.user_id,
        budget.spent,
        budget.task_count,
        budget.available()
    );
    for task in tasks {
        println!("  {} ({}): {}", task.task_name, task.task_id, task.points);
    }
    Ok(())
}

fn print_grant(tenant: &str, grant: &PointGrant, json: bool) -> Result<()> {
    if json {
        let doc = serde_json::json!({ "tenant": tenant, "grant": grant });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!(
        "[{tenant}] {} on {}: {} -> {} point(s), {} available",
        grant.user_id,
        grant.task_id,
        grant.previous,
        grant.points,
        grant.budget.available()
    );
    Ok(())
}
