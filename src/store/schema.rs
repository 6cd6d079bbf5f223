//! SQLite DDL for a tenant database.
//!
//! Uses `IF NOT EXISTS` throughout so [`apply_schema`] is idempotent.

use rusqlite::Connection;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

pub(crate) const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    name                TEXT NOT NULL UNIQUE,
    participation_share INTEGER NOT NULL DEFAULT 0,
    deleted_at          INTEGER
);

CREATE TABLE IF NOT EXISTS tasks (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    name              TEXT NOT NULL UNIQUE,
    static_user_id    INTEGER REFERENCES users(id),
    interval_unit     TEXT NOT NULL,      -- once | weekly | monthly
    interval_value    INTEGER NOT NULL,
    repeats_per_cycle INTEGER NOT NULL DEFAULT 1,
    effort_minutes    INTEGER NOT NULL DEFAULT 0,
    is_active         INTEGER NOT NULL DEFAULT 1,
    eligible_from     INTEGER,
    deleted_at        INTEGER,
    updated_at        INTEGER
);

CREATE TABLE IF NOT EXISTS assignments (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id    INTEGER NOT NULL REFERENCES tasks(id),
    user_id    INTEGER NOT NULL REFERENCES users(id),
    status     TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_assignments_task ON assignments(task_id, status);

CREATE TABLE IF NOT EXISTS penalty_points (
    task_id INTEGER NOT NULL REFERENCES tasks(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    points  INTEGER NOT NULL CHECK (points >= 0),
    PRIMARY KEY (task_id, user_id)
);

-- Archived assignments; the task columns are a snapshot taken at archive time.
CREATE TABLE IF NOT EXISTS history (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id           INTEGER NOT NULL REFERENCES tasks(id),
    user_id           INTEGER NOT NULL REFERENCES users(id),
    status            TEXT NOT NULL,
    interval_unit     TEXT,
    interval_value    INTEGER,
    repeats_per_cycle INTEGER,
    effort_minutes    INTEGER,
    created_at        INTEGER NOT NULL,
    updated_at        INTEGER NOT NULL,
    archived_at       INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_created ON history(created_at);
CREATE INDEX IF NOT EXISTS idx_history_task    ON history(task_id, created_at);
"#;

/// Apply the full schema to an open connection and seed the version row.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Returns `None` if the version row is missing.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}
