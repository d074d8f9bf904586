//! Tag and task-tag association repository.
//!
//! # Responsibility
//! - Provide tag CRUD with per-owner name uniqueness.
//! - Own the task<->tag association rows, including cascade deletes.
//!
//! # Invariants
//! - Deleting a tag removes every association row in the same transaction;
//!   a partial cascade is a correctness failure.
//! - Assigning an already-linked tag is an idempotent skip, not an error.
//! - Unassignment checks task, tag and link existence in that order, each
//!   stage with its own error.

use crate::db::DbError;
use crate::model::tag::{Tag, TagId};
use crate::model::task::TaskId;
use crate::model::user::UserId;
use crate::repo::{is_unique_violation, table_exists};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type TagRepoResult<T> = Result<T, TagRepoError>;

/// Errors from tag persistence and association operations.
#[derive(Debug)]
pub enum TagRepoError {
    Db(DbError),
    /// Tag absent or owned by another user.
    TagNotFound(TagId),
    /// Task absent, soft-deleted, or owned by another user.
    TaskNotFound(TaskId),
    /// No association row links this task and tag.
    LinkNotFound { task_id: TaskId, tag_id: TagId },
    /// A tag with the same nombre already exists for this owner.
    NombreConflict { owner_id: UserId, nombre: String },
    /// Nombre is blank after trim.
    NombreBlank,
    /// Required table is missing from the connection's schema.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid tag.
    InvalidData(String),
}

impl Display for TagRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::TagNotFound(id) => write!(f, "tag not found: {id}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::LinkNotFound { task_id, tag_id } => {
                write!(f, "tag {tag_id} is not assigned to task {task_id}")
            }
            Self::NombreConflict { owner_id, nombre } => write!(
                f,
                "a tag named `{nombre}` already exists for user {owner_id}"
            ),
            Self::NombreBlank => write!(f, "tag nombre must not be blank"),
            Self::MissingRequiredTable(table) => {
                write!(f, "tag repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted tag data: {message}"),
        }
    }
}

impl Error for TagRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for TagRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for TagRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for tags and their task associations.
pub trait TagRepository {
    /// Creates one tag for the owner.
    fn create_tag(&self, owner_id: UserId, nombre: &str) -> TagRepoResult<Tag>;
    /// Renames one owned tag.
    fn rename_tag(&self, tag_id: TagId, owner_id: UserId, nombre: &str) -> TagRepoResult<Tag>;
    /// Deletes one owned tag and cascades its association rows atomically.
    fn delete_tag(&self, tag_id: TagId, owner_id: UserId) -> TagRepoResult<()>;
    /// Lists the owner's tags ordered by nombre.
    fn list_tags(&self, owner_id: UserId) -> TagRepoResult<Vec<Tag>>;
    /// Links the given tags to an owned task, skipping existing links.
    fn assign_tags(&self, task_id: TaskId, tag_ids: &[TagId], owner_id: UserId)
        -> TagRepoResult<()>;
    /// Removes exactly one link after a three-stage existence check.
    fn unassign_tag(&self, task_id: TaskId, tag_id: TagId, owner_id: UserId) -> TagRepoResult<()>;
    /// Lists tags linked to one task, ordered by nombre.
    fn tags_for_task(&self, task_id: TaskId) -> TagRepoResult<Vec<Tag>>;
}

/// SQLite-backed tag repository.
pub struct SqliteTagRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTagRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> TagRepoResult<Self> {
        for table in ["tags", "task_tags", "tasks"] {
            if !table_exists(conn, table)? {
                return Err(TagRepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }
}

impl TagRepository for SqliteTagRepository<'_> {
    fn create_tag(&self, owner_id: UserId, nombre: &str) -> TagRepoResult<Tag> {
        let nombre = nombre.trim();
        if nombre.is_empty() {
            return Err(TagRepoError::NombreBlank);
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if owner_nombre_exists(&tx, owner_id, nombre, None)? {
            return Err(TagRepoError::NombreConflict {
                owner_id,
                nombre: nombre.to_string(),
            });
        }

        let tag = Tag {
            id: Uuid::new_v4(),
            nombre: nombre.to_string(),
            owner_id,
        };
        let inserted = tx.execute(
            "INSERT INTO tags (id, nombre, owner_id) VALUES (?1, ?2, ?3);",
            params![tag.id.to_string(), tag.nombre.as_str(), tag.owner_id.to_string()],
        );
        if let Err(err) = inserted {
            if is_unique_violation(&err, "idx_tags_owner_nombre") {
                return Err(TagRepoError::NombreConflict {
                    owner_id,
                    nombre: nombre.to_string(),
                });
            }
            return Err(err.into());
        }
        tx.commit()?;
        Ok(tag)
    }

    fn rename_tag(&self, tag_id: TagId, owner_id: UserId, nombre: &str) -> TagRepoResult<Tag> {
        let nombre = nombre.trim();
        if nombre.is_empty() {
            return Err(TagRepoError::NombreBlank);
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !tag_owned_by(&tx, tag_id, owner_id)? {
            return Err(TagRepoError::TagNotFound(tag_id));
        }
        if owner_nombre_exists(&tx, owner_id, nombre, Some(tag_id))? {
            return Err(TagRepoError::NombreConflict {
                owner_id,
                nombre: nombre.to_string(),
            });
        }

        tx.execute(
            "UPDATE tags SET nombre = ?2 WHERE id = ?1;",
            params![tag_id.to_string(), nombre],
        )?;
        tx.commit()?;
        Ok(Tag {
            id: tag_id,
            nombre: nombre.to_string(),
            owner_id,
        })
    }

    fn delete_tag(&self, tag_id: TagId, owner_id: UserId) -> TagRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !tag_owned_by(&tx, tag_id, owner_id)? {
            return Err(TagRepoError::TagNotFound(tag_id));
        }

        tx.execute(
            "DELETE FROM task_tags WHERE tag_id = ?1;",
            [tag_id.to_string()],
        )?;
        tx.execute("DELETE FROM tags WHERE id = ?1;", [tag_id.to_string()])?;
        tx.commit()?;
        Ok(())
    }

    fn list_tags(&self, owner_id: UserId) -> TagRepoResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, nombre, owner_id
             FROM tags
             WHERE owner_id = ?1
             ORDER BY nombre ASC, id ASC;",
        )?;
        let mut rows = stmt.query([owner_id.to_string()])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(parse_tag_row(row)?);
        }
        Ok(tags)
    }

    fn assign_tags(
        &self,
        task_id: TaskId,
        tag_ids: &[TagId],
        owner_id: UserId,
    ) -> TagRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !task_active_and_owned(&tx, task_id, owner_id)? {
            return Err(TagRepoError::TaskNotFound(task_id));
        }

        // Validate the whole batch before inserting anything, so a bad tag
        // id cannot leave a partial assignment behind.
        for tag_id in tag_ids {
            if !tag_owned_by(&tx, *tag_id, owner_id)? {
                return Err(TagRepoError::TagNotFound(*tag_id));
            }
        }
        for tag_id in tag_ids {
            tx.execute(
                "INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?1, ?2);",
                params![task_id.to_string(), tag_id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn unassign_tag(&self, task_id: TaskId, tag_id: TagId, owner_id: UserId) -> TagRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !task_active_and_owned(&tx, task_id, owner_id)? {
            return Err(TagRepoError::TaskNotFound(task_id));
        }
        if !tag_owned_by(&tx, tag_id, owner_id)? {
            return Err(TagRepoError::TagNotFound(tag_id));
        }

        let removed = tx.execute(
            "DELETE FROM task_tags WHERE task_id = ?1 AND tag_id = ?2;",
            params![task_id.to_string(), tag_id.to_string()],
        )?;
        if removed == 0 {
            return Err(TagRepoError::LinkNotFound { task_id, tag_id });
        }
        tx.commit()?;
        Ok(())
    }

    fn tags_for_task(&self, task_id: TaskId) -> TagRepoResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.nombre, t.owner_id
             FROM task_tags tt
             INNER JOIN tags t ON t.id = tt.tag_id
             WHERE tt.task_id = ?1
             ORDER BY t.nombre ASC;",
        )?;
        let mut rows = stmt.query([task_id.to_string()])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(parse_tag_row(row)?);
        }
        Ok(tags)
    }
}

fn owner_nombre_exists(
    conn: &Connection,
    owner_id: UserId,
    nombre: &str,
    exclude: Option<TagId>,
) -> TagRepoResult<bool> {
    let exclude_text = exclude.map_or_else(String::new, |id| id.to_string());
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM tags
            WHERE owner_id = ?1 AND nombre = ?2 AND id <> ?3
        );",
        params![owner_id.to_string(), nombre, exclude_text],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn tag_owned_by(conn: &Connection, tag_id: TagId, owner_id: UserId) -> TagRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM tags WHERE id = ?1 AND owner_id = ?2
        );",
        params![tag_id.to_string(), owner_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn task_active_and_owned(
    conn: &Connection,
    task_id: TaskId,
    owner_id: UserId,
) -> TagRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM tasks
            WHERE id = ?1 AND owner_id = ?2 AND deleted_at IS NULL
        );",
        params![task_id.to_string(), owner_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_tag_row(row: &Row<'_>) -> TagRepoResult<Tag> {
    Ok(Tag {
        id: parse_uuid(&row.get::<_, String>("id")?, "tags.id")?,
        nombre: row.get("nombre")?,
        owner_id: parse_uuid(&row.get::<_, String>("owner_id")?, "tags.owner_id")?,
    })
}

fn parse_uuid(value: &str, column: &str) -> TagRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| TagRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
