// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::model::{AssignmentId, TaskId, UserId};
use crate::types::{AssignmentStatus, RecurrenceUnit};

#[derive(Error, Debug)]
pub enum ChoreError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Assignment not found: {0}")]
    AssignmentNotFound(AssignmentId),

    #[error("User not found or deleted: {0}")]
    UserNotFound(UserId),

    #[error(
        "Invalid status '{status}' for a {unit} task repeating {repeats} time(s) per cycle"
    )]
    InvalidStatus {
        status: AssignmentStatus,
        unit: RecurrenceUnit,
        repeats: u32,
    },

    #[error("Penalty points must be between 0 and {max}, got {points}")]
    InvalidPoints { points: i64, max: u32 },

    #[error("Penalty points cannot be set on task {0}: it has a fixed owner or is inactive")]
    PointsNotAllowed(TaskId),

    #[error("User {user} cannot hold {requested} point(s) on this task; {available} available")]
    PointBudgetExceeded {
        user: UserId,
        requested: u32,
        available: i64,
    },

    #[error("Tenant store in use: {0}")]
    TenantBusy(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Lock poisoned: {0}")]
    LockError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ChoreError>;
