//! SQLite-backed task store.
//!
//! One database file per tenant at `{data_dir}/{file_prefix}{tenant}.sqlite`.
//! Timestamps are stored as Unix epoch milliseconds.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use tracing::debug;

use super::schema::{apply_schema, read_schema_version};
use super::{StoreFactory, TaskStore};
use crate::errors::{ChoreError, Result};
use crate::model::{
    Assignment, AssignmentId, HistoryEntry, NewAssignment, PenaltyPoint, Recurrence,
    TaskDefinition, TaskId, User, UserId,
};
use crate::types::{AssignmentStatus, RecurrenceUnit};

const USER_COLUMNS: &str = "id, name, participation_share, deleted_at";
const TASK_COLUMNS: &str = "id, name, static_user_id, interval_unit, interval_value, \
     repeats_per_cycle, effort_minutes, is_active, eligible_from, deleted_at";
const ASSIGNMENT_COLUMNS: &str = "id, task_id, user_id, status, created_at, updated_at";
const HISTORY_COLUMNS: &str = "task_id, user_id, status, interval_unit, interval_value, \
     repeats_per_cycle, effort_minutes, created_at, updated_at, archived_at";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        debug!(path = %path.display(), "opened tenant database");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open the database at `path` only if it already exists.
    pub fn open_existing(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        apply_schema(&conn)?;
        debug!(path = %path.display(), "opened tenant database");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> Result<Option<u32>> {
        Ok(read_schema_version(&self.conn)?)
    }

    /// Insert a user with an explicit id.
    pub fn insert_user(&mut self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, name, participation_share, deleted_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id.0,
                user.name,
                user.participation_share,
                user.deleted_at.map(to_millis)
            ],
        )?;
        Ok(())
    }

    /// Insert a task definition with an explicit id.
    pub fn insert_task(&mut self, task: &TaskDefinition) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tasks (id, name, static_user_id, interval_unit, interval_value, \
             repeats_per_cycle, effort_minutes, is_active, eligible_from, deleted_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id.0,
                task.name,
                task.static_user_id.map(|u| u.0),
                task.recurrence.unit.as_str(),
                task.recurrence.value,
                task.repeats_per_cycle,
                task.effort_minutes,
                task.is_active,
                task.eligible_from.map(to_millis),
                task.deleted_at.map(to_millis)
            ],
        )?;
        Ok(())
    }

    fn query_all<T>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, map)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn opt_millis(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|ms| from_millis(idx, ms))
        .transpose()
}

fn parse_text<T: FromStr<Err = String>>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        name: row.get(1)?,
        participation_share: row.get(2)?,
        deleted_at: opt_millis(row, 3)?,
    })
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<TaskDefinition> {
    let unit: String = row.get(3)?;
    Ok(TaskDefinition {
        id: TaskId(row.get(0)?),
        name: row.get(1)?,
        static_user_id: row.get::<_, Option<i64>>(2)?.map(UserId),
        recurrence: Recurrence::new(parse_text(3, &unit)?, row.get(4)?),
        repeats_per_cycle: row.get(5)?,
        effort_minutes: row.get(6)?,
        is_active: row.get(7)?,
        eligible_from: opt_millis(row, 8)?,
        deleted_at: opt_millis(row, 9)?,
    })
}

fn row_to_assignment(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    let status: String = row.get(3)?;
    Ok(Assignment {
        id: AssignmentId(row.get(0)?),
        task_id: TaskId(row.get(1)?),
        user_id: UserId(row.get(2)?),
        status: parse_text(3, &status)?,
        created_at: from_millis(4, row.get(4)?)?,
        updated_at: from_millis(5, row.get(5)?)?,
    })
}

fn row_to_history(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let status: String = row.get(2)?;
    let unit: Option<String> = row.get(3)?;
    let value: Option<u32> = row.get(4)?;
    let recurrence = match (unit, value) {
        (Some(unit), Some(value)) => Some(Recurrence::new(
            parse_text::<RecurrenceUnit>(3, &unit)?,
            value,
        )),
        _ => None,
    };
    Ok(HistoryEntry {
        task_id: TaskId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        status: parse_text(2, &status)?,
        recurrence,
        repeats_per_cycle: row.get(5)?,
        effort_minutes: row.get(6)?,
        created_at: from_millis(7, row.get(7)?)?,
        updated_at: from_millis(8, row.get(8)?)?,
        archived_at: from_millis(9, row.get(9)?)?,
    })
}

impl TaskStore for SqliteStore {
    fn begin(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn active_users(&self) -> Result<Vec<User>> {
        self.query_all(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY id"),
            [],
            row_to_user,
        )
    }

    fn user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.0],
                row_to_user,
            )
            .optional()?)
    }

    fn tasks(&self) -> Result<Vec<TaskDefinition>> {
        self.query_all(
            &format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id"),
            [],
            row_to_task,
        )
    }

    fn task(&self, id: TaskId) -> Result<Option<TaskDefinition>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id.0],
                row_to_task,
            )
            .optional()?)
    }

    fn penalty_points(&self) -> Result<Vec<PenaltyPoint>> {
        self.query_all(
            "SELECT task_id, user_id, points FROM penalty_points ORDER BY task_id, user_id",
            [],
            |row| {
                Ok(PenaltyPoint {
                    task_id: TaskId(row.get(0)?),
                    user_id: UserId(row.get(1)?),
                    points: row.get(2)?,
                })
            },
        )
    }

    fn history_since(&self, since: DateTime<Utc>) -> Result<Vec<HistoryEntry>> {
        self.query_all(
            &format!(
                "SELECT {HISTORY_COLUMNS} FROM history WHERE created_at > ?1 \
                 ORDER BY created_at DESC, id DESC"
            ),
            params![to_millis(since)],
            row_to_history,
        )
    }

    fn latest_history_per_task(&self) -> Result<Vec<HistoryEntry>> {
        self.query_all(
            &format!(
                "SELECT {HISTORY_COLUMNS} FROM history h WHERE h.id = ( \
                 SELECT h2.id FROM history h2 WHERE h2.task_id = h.task_id \
                 ORDER BY h2.created_at DESC, h2.id DESC LIMIT 1) \
                 ORDER BY h.task_id"
            ),
            [],
            row_to_history,
        )
    }

    fn assignments(&self) -> Result<Vec<Assignment>> {
        self.query_all(
            &format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments ORDER BY id"),
            [],
            row_to_assignment,
        )
    }

    fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = ?1"),
                params![id.0],
                row_to_assignment,
            )
            .optional()?)
    }

    fn deactivate_tasks(&mut self, ids: &[TaskId], at: DateTime<Utc>) -> Result<usize> {
        let mut changed = 0;
        for id in ids {
            changed += self.conn.execute(
                "UPDATE tasks SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND is_active = 1",
                params![to_millis(at), id.0],
            )?;
        }
        Ok(changed)
    }

    fn bulk_update_status(
        &mut self,
        from: &[AssignmentStatus],
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut changed = 0;
        for status in from {
            changed += self.conn.execute(
                "UPDATE assignments SET status = ?1, updated_at = ?2 WHERE status = ?3",
                params![to.as_str(), to_millis(at), status.as_str()],
            )?;
        }
        Ok(changed)
    }

    fn append_history(&mut self, entries: &[HistoryEntry]) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO history (task_id, user_id, status, interval_unit, interval_value, \
             repeats_per_cycle, effort_minutes, created_at, updated_at, archived_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for e in entries {
            stmt.execute(params![
                e.task_id.0,
                e.user_id.0,
                e.status.as_str(),
                e.recurrence.map(|r| r.unit.as_str()),
                e.recurrence.map(|r| r.value),
                e.repeats_per_cycle,
                e.effort_minutes,
                to_millis(e.created_at),
                to_millis(e.updated_at),
                to_millis(e.archived_at)
            ])?;
        }
        Ok(())
    }

    fn clear_assignments(&mut self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM assignments", [])?)
    }

    fn delete_penalty_point(&mut self, task: TaskId, user: UserId) -> Result<()> {
        self.conn.execute(
            "DELETE FROM penalty_points WHERE task_id = ?1 AND user_id = ?2",
            params![task.0, user.0],
        )?;
        Ok(())
    }

    fn set_penalty_points(&mut self, task: TaskId, user: UserId, points: u32) -> Result<()> {
        self.conn.execute(
            "INSERT INTO penalty_points (task_id, user_id, points) VALUES (?1, ?2, ?3) \
             ON CONFLICT(task_id, user_id) DO UPDATE SET points = excluded.points",
            params![task.0, user.0, points],
        )?;
        Ok(())
    }

    fn insert_assignments(&mut self, rows: &[NewAssignment]) -> Result<Vec<AssignmentId>> {
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let at = to_millis(row.created_at);
            self.conn.execute(
                "INSERT INTO assignments (task_id, user_id, status, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![row.task_id.0, row.user_id.0, row.status.as_str(), at, at],
            )?;
            ids.push(AssignmentId(self.conn.last_insert_rowid()));
        }
        Ok(ids)
    }

    fn update_assignment(
        &mut self,
        id: AssignmentId,
        status: AssignmentStatus,
        user: Option<UserId>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE assignments SET status = ?1, user_id = COALESCE(?2, user_id), updated_at = ?3 \
             WHERE id = ?4",
            params![status.as_str(), user.map(|u| u.0), to_millis(at), id.0],
        )?;
        Ok(changed > 0)
    }

    fn set_assignment_statuses(
        &mut self,
        ids: &[AssignmentId],
        status: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut changed = 0;
        for id in ids {
            changed += self.conn.execute(
                "UPDATE assignments SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), to_millis(at), id.0],
            )?;
        }
        Ok(changed)
    }
}

/// Opens `{data_dir}/{file_prefix}{tenant}.sqlite`.
#[derive(Debug, Clone)]
pub struct SqliteStoreFactory {
    data_dir: PathBuf,
    file_prefix: String,
}

const DB_EXTENSION: &str = ".sqlite";

impl SqliteStoreFactory {
    pub fn new(data_dir: impl Into<PathBuf>, file_prefix: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            file_prefix: file_prefix.into(),
        }
    }

    pub fn database_path(&self, tenant: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}{tenant}{DB_EXTENSION}", self.file_prefix))
    }

    /// Create the tenant's database (or open it if it exists).
    pub fn create(&self, tenant: &str) -> Result<SqliteStore> {
        validate_tenant_name(tenant)?;
        SqliteStore::open(&self.database_path(tenant))
    }
}

fn validate_tenant_name(tenant: &str) -> Result<()> {
    let ok = !tenant.is_empty()
        && tenant
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ChoreError::StoreError(format!(
            "invalid tenant name '{tenant}' (use letters, digits, '-' or '_')"
        )))
    }
}

impl StoreFactory for SqliteStoreFactory {
    fn open(&self, tenant: &str) -> Result<Box<dyn TaskStore>> {
        validate_tenant_name(tenant)?;
        let path = self.database_path(tenant);
        if !path.is_file() {
            return Err(ChoreError::StoreError(format!(
                "unknown tenant '{tenant}' (no database at {})",
                path.display()
            )));
        }
        Ok(Box::new(SqliteStore::open_existing(&path)?))
    }

    fn tenants(&self) -> Result<Vec<String>> {
        if !self.data_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut tenants = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(tenant) = name
                .strip_prefix(self.file_prefix.as_str())
                .and_then(|rest| rest.strip_suffix(DB_EXTENSION))
            {
                if validate_tenant_name(tenant).is_ok() {
                    tenants.push(tenant.to_string());
                }
            }
        }
        tenants.sort();
        Ok(tenants)
    }
}
