// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::AssignmentStatus;

/// Command-line arguments for `choreshift`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "choreshift",
    version,
    about = "Hand out household chores fairly, one cycle at a time.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Choreshift.toml` in the current working directory. A missing
    /// default file means built-in defaults.
    #[arg(long, global = true, value_name = "PATH", default_value = "Choreshift.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CHORESHIFT_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run one assignment cycle.
    Run(RunArgs),
    /// Change the status of one assignment.
    SetStatus(SetStatusArgs),
    /// Show a user's penalty points and how many are still free.
    Points(PointsArgs),
    /// Set how many penalty points a user holds on one task.
    GrantPoints(GrantPointsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Tenant to run for; repeatable. Defaults to every tenant database found.
    #[arg(long = "tenant", value_name = "NAME")]
    pub tenants: Vec<String>,

    /// Compute and print the picks without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Delete the current assignments and allocate again, skipping maintenance.
    #[arg(long)]
    pub clear_and_reassign: bool,

    /// Allocate weekly tasks before monthly ones, then one-shots.
    #[arg(long)]
    pub group_by_recurrence: bool,

    /// Print reports as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SetStatusArgs {
    #[arg(long, value_name = "NAME")]
    pub tenant: String,

    /// Assignment id.
    #[arg(long, value_name = "ID")]
    pub id: i64,

    #[arg(long, value_enum, value_name = "STATUS")]
    pub status: AssignmentStatus,

    /// Hand the assignment to this user.
    #[arg(long, value_name = "USER_ID")]
    pub user: Option<i64>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct PointsArgs {
    #[arg(long, value_name = "NAME")]
    pub tenant: String,

    #[arg(long, value_name = "USER_ID")]
    pub user: i64,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct GrantPointsArgs {
    #[arg(long, value_name = "NAME")]
    pub tenant: String,

    #[arg(long, value_name = "USER_ID")]
    pub user: i64,

    #[arg(long, value_name = "TASK_ID")]
    pub task: i64,

    /// New point total for the task; 0 clears it.
    #[arg(long, value_name = "POINTS", allow_negative_numbers = true)]
    pub points: i64,

    #[arg(long)]
    pub json: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
