//! Task assignment repository.
//!
//! # Responsibility
//! - Persist cross-user task assignments with duplicate protection.
//!
//! # Invariants
//! - Existence checks and the insert run in one transaction, so a
//!   concurrent duplicate race resolves to one success and one conflict.
//! - Listings use the sequence id as stable insertion order.

use crate::db::DbError;
use crate::model::assignment::TaskAssignment;
use crate::model::now_epoch_ms;
use crate::model::task::TaskId;
use crate::model::user::UserId;
use crate::repo::is_unique_violation;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type AssignmentRepoResult<T> = Result<T, AssignmentRepoError>;

/// Errors from assignment persistence operations.
#[derive(Debug)]
pub enum AssignmentRepoError {
    Db(DbError),
    /// Target task absent or soft-deleted.
    TaskNotFound(TaskId),
    /// Assignee absent or deactivated.
    UserNotFound(UserId),
    /// The (task, assignee) pair is already assigned.
    Duplicate { task_id: TaskId, user_id: UserId },
    /// No assignment row matches the (task, assignee) pair.
    NotFound { task_id: TaskId, user_id: UserId },
    /// Persisted data cannot be converted to a valid assignment.
    InvalidData(String),
}

impl Display for AssignmentRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::Duplicate { task_id, user_id } => {
                write!(f, "task {task_id} is already assigned to user {user_id}")
            }
            Self::NotFound { task_id, user_id } => {
                write!(f, "no assignment of task {task_id} to user {user_id}")
            }
            Self::InvalidData(message) => {
                write!(f, "invalid persisted assignment data: {message}")
            }
        }
    }
}

impl Error for AssignmentRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for AssignmentRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for AssignmentRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for task assignments.
pub trait AssignmentRepository {
    /// Creates one assignment after task/assignee/duplicate checks.
    fn assign(
        &self,
        task_id: TaskId,
        user_id: UserId,
        asignado_por: UserId,
    ) -> AssignmentRepoResult<TaskAssignment>;
    /// Lists all assignments of one assignee in insertion order.
    fn list_for_user(&self, user_id: UserId) -> AssignmentRepoResult<Vec<TaskAssignment>>;
    /// Removes the (task, assignee) assignment.
    fn remove(&self, task_id: TaskId, user_id: UserId) -> AssignmentRepoResult<()>;
}

/// SQLite-backed assignment repository.
pub struct SqliteAssignmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAssignmentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AssignmentRepository for SqliteAssignmentRepository<'_> {
    fn assign(
        &self,
        task_id: TaskId,
        user_id: UserId,
        asignado_por: UserId,
    ) -> AssignmentRepoResult<TaskAssignment> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !task_is_active(&tx, task_id)? {
            return Err(AssignmentRepoError::TaskNotFound(task_id));
        }
        if !user_is_active(&tx, user_id)? {
            return Err(AssignmentRepoError::UserNotFound(user_id));
        }
        if assignment_exists(&tx, task_id, user_id)? {
            return Err(AssignmentRepoError::Duplicate { task_id, user_id });
        }

        let fecha = now_epoch_ms();
        let inserted = tx.execute(
            "INSERT INTO task_assignments (task_id, user_id, asignado_por, fecha)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                task_id.to_string(),
                user_id.to_string(),
                asignado_por.to_string(),
                fecha,
            ],
        );
        if let Err(err) = inserted {
            if is_unique_violation(&err, "idx_task_assignments_task_user") {
                return Err(AssignmentRepoError::Duplicate { task_id, user_id });
            }
            return Err(err.into());
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(TaskAssignment {
            id,
            task_id,
            user_id,
            asignado_por,
            fecha,
        })
    }

    fn list_for_user(&self, user_id: UserId) -> AssignmentRepoResult<Vec<TaskAssignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, user_id, asignado_por, fecha
             FROM task_assignments
             WHERE user_id = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut assignments = Vec::new();
        while let Some(row) = rows.next()? {
            assignments.push(parse_assignment_row(row)?);
        }
        Ok(assignments)
    }

    fn remove(&self, task_id: TaskId, user_id: UserId) -> AssignmentRepoResult<()> {
        let removed = self.conn.execute(
            "DELETE FROM task_assignments WHERE task_id = ?1 AND user_id = ?2;",
            params![task_id.to_string(), user_id.to_string()],
        )?;
        if removed == 0 {
            return Err(AssignmentRepoError::NotFound { task_id, user_id });
        }
        Ok(())
    }
}

fn task_is_active(conn: &Connection, task_id: TaskId) -> AssignmentRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM tasks WHERE id = ?1 AND deleted_at IS NULL
        );",
        [task_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn user_is_active(conn: &Connection, user_id: UserId) -> AssignmentRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM users WHERE id = ?1 AND is_active = 1
        );",
        [user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn assignment_exists(
    conn: &Connection,
    task_id: TaskId,
    user_id: UserId,
) -> AssignmentRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM task_assignments WHERE task_id = ?1 AND user_id = ?2
        );",
        params![task_id.to_string(), user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_assignment_row(row: &Row<'_>) -> AssignmentRepoResult<TaskAssignment> {
    Ok(TaskAssignment {
        id: row.get("id")?,
        task_id: parse_uuid(&row.get::<_, String>("task_id")?, "task_assignments.task_id")?,
        user_id: parse_uuid(&row.get::<_, String>("user_id")?, "task_assignments.user_id")?,
        asignado_por: parse_uuid(
            &row.get::<_, String>("asignado_por")?,
            "task_assignments.asignado_por",
        )?,
        fecha: row.get("fecha")?,
    })
}

fn parse_uuid(value: &str, column: &str) -> AssignmentRepoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        AssignmentRepoError::InvalidData(format!("invalid uuid `{value}` in {column}"))
    })
}
