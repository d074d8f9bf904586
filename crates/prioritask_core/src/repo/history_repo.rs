//! Task history recorder and reader.
//!
//! # Responsibility
//! - Append immutable audit entries for task mutations.
//! - Read back the ordered trail for one task.
//!
//! # Invariants
//! - Appends happen through the caller's open transaction, so a failed
//!   task mutation never leaves an orphan entry and vice versa.
//! - Entries are never updated or deleted; replay order is
//!   `timestamp ASC` with insertion order breaking ties.
//! - The recorder stores the diff payload opaquely; it never interprets
//!   the serialized values.

use crate::db::DbError;
use crate::model::history::{HistoryAction, TaskHistoryEntry};
use crate::model::task::TaskId;
use crate::model::user::UserId;
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type HistoryRepoResult<T> = Result<T, HistoryRepoError>;

/// Errors from history read operations.
#[derive(Debug)]
pub enum HistoryRepoError {
    Db(DbError),
    /// Persisted data cannot be converted to a valid entry.
    InvalidData(String),
}

impl Display for HistoryRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid history data: {message}"),
        }
    }
}

impl Error for HistoryRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for HistoryRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for HistoryRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Appends one entry through `conn`, which is expected to be the open
/// transaction of the task mutation being documented.
///
/// Pure append: the only failure mode is a storage error, which the caller
/// propagates and which rolls the whole transaction back.
pub fn record_entry(
    conn: &Connection,
    task_id: TaskId,
    user_id: UserId,
    action: HistoryAction,
    timestamp: i64,
    changes: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO task_history (id, task_id, user_id, action, timestamp, changes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            Uuid::new_v4().to_string(),
            task_id.to_string(),
            user_id.to_string(),
            action.as_str(),
            timestamp,
            changes,
        ],
    )?;
    Ok(())
}

/// Read interface over the audit trail.
pub trait HistoryRepository {
    /// Lists all entries for one task in replay order. An empty result is
    /// not an error at this layer; the service boundary decides.
    fn list_history(&self, task_id: TaskId) -> HistoryRepoResult<Vec<TaskHistoryEntry>>;
}

/// SQLite-backed history reader.
pub struct SqliteHistoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHistoryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl HistoryRepository for SqliteHistoryRepository<'_> {
    fn list_history(&self, task_id: TaskId) -> HistoryRepoResult<Vec<TaskHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, user_id, action, timestamp, changes
             FROM task_history
             WHERE task_id = ?1
             ORDER BY timestamp ASC, rowid ASC;",
        )?;

        let mut rows = stmt.query([task_id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_history_row(row)?);
        }
        Ok(entries)
    }
}

fn parse_history_row(row: &Row<'_>) -> HistoryRepoResult<TaskHistoryEntry> {
    let action_text: String = row.get("action")?;
    let action = HistoryAction::parse(&action_text).ok_or_else(|| {
        HistoryRepoError::InvalidData(format!(
            "invalid action `{action_text}` in task_history.action"
        ))
    })?;

    Ok(TaskHistoryEntry {
        id: parse_uuid(&row.get::<_, String>("id")?, "task_history.id")?,
        task_id: parse_uuid(&row.get::<_, String>("task_id")?, "task_history.task_id")?,
        user_id: parse_uuid(&row.get::<_, String>("user_id")?, "task_history.user_id")?,
        action,
        timestamp: row.get("timestamp")?,
        changes: row.get("changes")?,
    })
}

fn parse_uuid(value: &str, column: &str) -> HistoryRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| HistoryRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
