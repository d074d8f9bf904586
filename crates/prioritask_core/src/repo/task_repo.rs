//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide task CRUD, soft-delete and listing APIs.
//! - Keep uniqueness checks, room resolution, diffing and history appends
//!   inside one transaction per mutation.
//!
//! # Invariants
//! - Active-task listings and uniqueness checks never see soft-deleted rows.
//! - Every accepted mutation appends exactly one history entry in the same
//!   transaction; a no-op update appends none and leaves `updated_at`
//!   untouched.
//! - Mutation paths collapse "absent", "foreign" and "already deleted" into
//!   `NotFound`; only [`TaskRepository::get_task`] distinguishes
//!   `Forbidden`.

use crate::db::DbError;
use crate::model::history::{diff_task, estado_change, ChangeSet, HistoryAction};
use crate::model::now_epoch_ms;
use crate::model::room::RoomId;
use crate::model::tag::Tag;
use crate::model::task::{
    CategoriaTarea, EstadoTarea, Task, TaskDraft, TaskId, TaskPatch, TaskValidationError,
};
use crate::model::user::UserId;
use crate::repo::history_repo::record_entry;
use crate::repo::room_repo::resolve_default_room;
use crate::repo::{is_unique_violation, table_exists};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    titulo,
    descripcion,
    categoria,
    estado,
    peso,
    due_date,
    owner_id,
    room_id,
    created_at,
    updated_at,
    deleted_at
FROM tasks";

const TASKS_DEFAULT_LIMIT: u32 = 100;
const TASKS_LIMIT_MAX: u32 = 500;

pub type TaskRepoResult<T> = Result<T, TaskRepoError>;

/// Errors from task persistence and query operations.
#[derive(Debug)]
pub enum TaskRepoError {
    Db(DbError),
    Validation(TaskValidationError),
    /// Task absent, soft-deleted, or owned by another user (mutation paths).
    NotFound(TaskId),
    /// Task exists and is active but belongs to another user (read path).
    Forbidden(TaskId),
    /// Referenced room is missing or not owned by the caller.
    RoomNotFound(RoomId),
    /// An active task with the same (owner, titulo) already exists.
    TituloConflict { owner_id: UserId, titulo: String },
    /// Required table is missing from the connection's schema.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid task.
    InvalidData(String),
}

impl Display for TaskRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::Forbidden(id) => write!(f, "task not accessible: {id}"),
            Self::RoomNotFound(id) => write!(f, "room not found: {id}"),
            Self::TituloConflict { owner_id, titulo } => write!(
                f,
                "an active task titled `{titulo}` already exists for user {owner_id}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "task repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
        }
    }
}

impl Error for TaskRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for TaskRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for TaskRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<TaskValidationError> for TaskRepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Sort key options for task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOrderBy {
    DueDate,
    Peso,
    CreatedAt,
}

impl TaskOrderBy {
    fn column(self) -> &'static str {
        match self {
            Self::DueDate => "due_date",
            Self::Peso => "peso",
            Self::CreatedAt => "created_at",
        }
    }
}

/// Sort direction for task listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDir {
    Asc,
    Desc,
}

impl OrderDir {
    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Composable filter/ordering options shared by owner-wide and room-scoped
/// task listings. The owner predicate itself is a separate mandatory
/// argument.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskListQuery {
    pub estado: Option<EstadoTarea>,
    pub categoria: Option<CategoriaTarea>,
    /// `Some(true)` keeps only DONE tasks, `Some(false)` everything else.
    pub completed: Option<bool>,
    /// Inclusive due-date lower bound, epoch ms.
    pub due_from: Option<i64>,
    /// Inclusive due-date upper bound, epoch ms.
    pub due_to: Option<i64>,
    /// Tag membership via the association table.
    pub tag_id: Option<Uuid>,
    /// Direct room foreign-key filter.
    pub room_id: Option<RoomId>,
    /// Case-sensitive substring match over titulo and descripcion.
    pub search: Option<String>,
    pub order_by: TaskOrderBy,
    pub order_dir: OrderDir,
    /// Maximum rows to return. Defaults to 100 and clamps to 500.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

impl Default for TaskListQuery {
    fn default() -> Self {
        Self {
            estado: None,
            categoria: None,
            completed: None,
            due_from: None,
            due_to: None,
            tag_id: None,
            room_id: None,
            search: None,
            order_by: TaskOrderBy::CreatedAt,
            order_dir: OrderDir::Desc,
            limit: None,
            offset: 0,
        }
    }
}

/// Single-task read model: the task plus its tag list.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDetail {
    pub task: Task,
    /// Tags linked to the task, ordered by nombre.
    pub etiquetas: Vec<Tag>,
}

/// Repository interface for task operations.
pub trait TaskRepository {
    /// Creates one task in estado TODO plus its CREATED history entry.
    fn create_task(&self, owner_id: UserId, draft: &TaskDraft) -> TaskRepoResult<Task>;
    /// Applies a partial update; a no-diff patch is an idempotent no-op.
    fn update_task(&self, task_id: TaskId, owner_id: UserId, patch: &TaskPatch)
        -> TaskRepoResult<Task>;
    /// Sets the task state, always recording one STATUS_UPDATED entry.
    fn patch_estado(
        &self,
        task_id: TaskId,
        owner_id: UserId,
        estado: EstadoTarea,
    ) -> TaskRepoResult<Task>;
    /// Tombstones the task and records its DELETED entry.
    fn soft_delete_task(&self, task_id: TaskId, owner_id: UserId) -> TaskRepoResult<()>;
    /// Loads one active task with its tags. The only path that reveals
    /// existence to non-owners, via `Forbidden`.
    fn get_task(&self, task_id: TaskId, owner_id: UserId) -> TaskRepoResult<TaskDetail>;
    /// Lists active tasks for one owner using filter/order/pagination.
    fn list_tasks(&self, owner_id: UserId, query: &TaskListQuery) -> TaskRepoResult<Vec<Task>>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> TaskRepoResult<Self> {
        for table in ["tasks", "task_history", "rooms"] {
            if !table_exists(conn, table)? {
                return Err(TaskRepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, owner_id: UserId, draft: &TaskDraft) -> TaskRepoResult<Task> {
        draft.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if active_titulo_exists(&tx, owner_id, &draft.titulo, None)? {
            return Err(TaskRepoError::TituloConflict {
                owner_id,
                titulo: draft.titulo.clone(),
            });
        }

        let now = now_epoch_ms();
        let room_id = match draft.room_id {
            Some(room_id) => {
                if !room_owned_by(&tx, room_id, owner_id)? {
                    return Err(TaskRepoError::RoomNotFound(room_id));
                }
                room_id
            }
            None => resolve_default_room(&tx, owner_id, now)
                .map_err(|err| TaskRepoError::Db(DbError::Sqlite(err)))?,
        };

        let task = Task {
            id: Uuid::new_v4(),
            titulo: draft.titulo.clone(),
            descripcion: draft.descripcion.clone(),
            categoria: draft.categoria,
            estado: EstadoTarea::Todo,
            peso: draft.peso,
            due_date: draft.due_date,
            owner_id,
            room_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let inserted = tx.execute(
            "INSERT INTO tasks (
                id, titulo, descripcion, categoria, estado, peso,
                due_date, owner_id, room_id, created_at, updated_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL);",
            params![
                task.id.to_string(),
                task.titulo.as_str(),
                task.descripcion.as_deref(),
                task.categoria.as_str(),
                task.estado.as_str(),
                task.peso,
                task.due_date,
                task.owner_id.to_string(),
                task.room_id.to_string(),
                task.created_at,
                task.updated_at,
            ],
        );
        if let Err(err) = inserted {
            if is_unique_violation(&err, "idx_tasks_owner_titulo_active") {
                return Err(TaskRepoError::TituloConflict {
                    owner_id,
                    titulo: draft.titulo.clone(),
                });
            }
            return Err(err.into());
        }

        record_entry(&tx, task.id, owner_id, HistoryAction::Created, now, None)?;
        tx.commit()?;
        Ok(task)
    }

    fn update_task(
        &self,
        task_id: TaskId,
        owner_id: UserId,
        patch: &TaskPatch,
    ) -> TaskRepoResult<Task> {
        patch.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let stored = load_active_owned(&tx, task_id, owner_id)?;

        let changes = diff_task(&stored, patch);
        if changes.is_empty() {
            return Ok(stored);
        }

        if let Some(titulo) = &patch.titulo {
            if *titulo != stored.titulo
                && active_titulo_exists(&tx, owner_id, titulo, Some(task_id))?
            {
                return Err(TaskRepoError::TituloConflict {
                    owner_id,
                    titulo: titulo.clone(),
                });
            }
        }

        let mut task = stored;
        patch.apply(&mut task);
        task.validate()?;
        let now = now_epoch_ms();
        task.updated_at = now;

        write_task_fields(&tx, &task)?;
        record_entry(
            &tx,
            task.id,
            owner_id,
            HistoryAction::Updated,
            now,
            Some(encode_changes(&changes)?.as_str()),
        )?;
        tx.commit()?;
        Ok(task)
    }

    fn patch_estado(
        &self,
        task_id: TaskId,
        owner_id: UserId,
        estado: EstadoTarea,
    ) -> TaskRepoResult<Task> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let stored = load_active_owned(&tx, task_id, owner_id)?;

        // One STATUS_UPDATED entry per call, even when the state is
        // unchanged. Callers polling a task into the same state still show
        // up in the audit trail.
        let changes = estado_change(&stored, estado);
        let mut task = stored;
        task.estado = estado;
        let now = now_epoch_ms();
        task.updated_at = now;

        write_task_fields(&tx, &task)?;
        record_entry(
            &tx,
            task.id,
            owner_id,
            HistoryAction::StatusUpdated,
            now,
            Some(encode_changes(&changes)?.as_str()),
        )?;
        tx.commit()?;
        Ok(task)
    }

    fn soft_delete_task(&self, task_id: TaskId, owner_id: UserId) -> TaskRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let stored = load_active_owned(&tx, task_id, owner_id)?;

        let now = now_epoch_ms();
        tx.execute(
            "UPDATE tasks SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1;",
            params![stored.id.to_string(), now],
        )?;
        record_entry(&tx, stored.id, owner_id, HistoryAction::Deleted, now, None)?;
        tx.commit()?;
        Ok(())
    }

    fn get_task(&self, task_id: TaskId, owner_id: UserId) -> TaskRepoResult<TaskDetail> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1 AND deleted_at IS NULL;"))?;
        let mut rows = stmt.query([task_id.to_string()])?;
        let row = match rows.next()? {
            Some(row) => row,
            None => return Err(TaskRepoError::NotFound(task_id)),
        };

        let task = parse_task_row(row)?;
        if task.owner_id != owner_id {
            return Err(TaskRepoError::Forbidden(task_id));
        }

        let etiquetas = load_tags_for_task(self.conn, task_id)?;
        Ok(TaskDetail { task, etiquetas })
    }

    fn list_tasks(&self, owner_id: UserId, query: &TaskListQuery) -> TaskRepoResult<Vec<Task>> {
        if let Some(room_id) = query.room_id {
            if !room_owned_by(self.conn, room_id, owner_id)? {
                return Err(TaskRepoError::RoomNotFound(room_id));
            }
        }

        let mut sql = format!("{TASK_SELECT_SQL} WHERE owner_id = ? AND deleted_at IS NULL");
        let mut bind_values: Vec<Value> = vec![Value::Text(owner_id.to_string())];

        if let Some(estado) = query.estado {
            sql.push_str(" AND estado = ?");
            bind_values.push(Value::Text(estado.as_str().to_string()));
        }
        if let Some(categoria) = query.categoria {
            sql.push_str(" AND categoria = ?");
            bind_values.push(Value::Text(categoria.as_str().to_string()));
        }
        if let Some(completed) = query.completed {
            if completed {
                sql.push_str(" AND estado = 'DONE'");
            } else {
                sql.push_str(" AND estado <> 'DONE'");
            }
        }
        if let Some(due_from) = query.due_from {
            sql.push_str(" AND due_date >= ?");
            bind_values.push(Value::Integer(due_from));
        }
        if let Some(due_to) = query.due_to {
            sql.push_str(" AND due_date <= ?");
            bind_values.push(Value::Integer(due_to));
        }
        if let Some(tag_id) = query.tag_id {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1
                    FROM task_tags tt
                    WHERE tt.task_id = tasks.id
                      AND tt.tag_id = ?
                )",
            );
            bind_values.push(Value::Text(tag_id.to_string()));
        }
        if let Some(room_id) = query.room_id {
            sql.push_str(" AND room_id = ?");
            bind_values.push(Value::Text(room_id.to_string()));
        }
        if let Some(search) = query.search.as_deref() {
            sql.push_str(
                " AND (titulo LIKE ? ESCAPE '\\' OR descripcion LIKE ? ESCAPE '\\')",
            );
            let pattern = like_pattern(search);
            bind_values.push(Value::Text(pattern.clone()));
            bind_values.push(Value::Text(pattern));
        }

        // Stable secondary sort keeps pagination deterministic.
        sql.push_str(&format!(
            " ORDER BY {} {}, id ASC",
            query.order_by.column(),
            query.order_dir.keyword()
        ));

        let limit = normalize_task_limit(query.limit);
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }
}

/// Normalizes the list limit according to the tasks contract.
pub fn normalize_task_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) => TASKS_DEFAULT_LIMIT,
        Some(value) if value > TASKS_LIMIT_MAX => TASKS_LIMIT_MAX,
        Some(value) => value,
        None => TASKS_DEFAULT_LIMIT,
    }
}

/// Escapes LIKE wildcards in `term` and wraps it for substring matching.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn encode_changes(changes: &ChangeSet) -> TaskRepoResult<String> {
    serde_json::to_string(changes)
        .map_err(|err| TaskRepoError::InvalidData(format!("failed to encode diff payload: {err}")))
}

fn load_active_owned(
    conn: &Connection,
    task_id: TaskId,
    owner_id: UserId,
) -> TaskRepoResult<Task> {
    let mut stmt = conn.prepare(&format!(
        "{TASK_SELECT_SQL}
         WHERE id = ?1
           AND owner_id = ?2
           AND deleted_at IS NULL;"
    ))?;
    let mut rows = stmt.query(params![task_id.to_string(), owner_id.to_string()])?;
    match rows.next()? {
        Some(row) => parse_task_row(row),
        None => Err(TaskRepoError::NotFound(task_id)),
    }
}

fn write_task_fields(conn: &Connection, task: &Task) -> TaskRepoResult<()> {
    let changed = conn.execute(
        "UPDATE tasks
         SET
            titulo = ?2,
            descripcion = ?3,
            categoria = ?4,
            estado = ?5,
            peso = ?6,
            due_date = ?7,
            updated_at = ?8
         WHERE id = ?1
           AND deleted_at IS NULL;",
        params![
            task.id.to_string(),
            task.titulo.as_str(),
            task.descripcion.as_deref(),
            task.categoria.as_str(),
            task.estado.as_str(),
            task.peso,
            task.due_date,
            task.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(TaskRepoError::NotFound(task.id));
    }
    Ok(())
}

fn active_titulo_exists(
    conn: &Connection,
    owner_id: UserId,
    titulo: &str,
    exclude: Option<TaskId>,
) -> TaskRepoResult<bool> {
    let exists: i64 = match exclude {
        Some(task_id) => conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM tasks
                WHERE owner_id = ?1 AND titulo = ?2 AND deleted_at IS NULL AND id <> ?3
            );",
            params![owner_id.to_string(), titulo, task_id.to_string()],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM tasks
                WHERE owner_id = ?1 AND titulo = ?2 AND deleted_at IS NULL
            );",
            params![owner_id.to_string(), titulo],
            |row| row.get(0),
        )?,
    };
    Ok(exists == 1)
}

fn room_owned_by(conn: &Connection, room_id: RoomId, owner_id: UserId) -> TaskRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM rooms WHERE id = ?1 AND owner_id = ?2
        );",
        params![room_id.to_string(), owner_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn load_tags_for_task(conn: &Connection, task_id: TaskId) -> TaskRepoResult<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.nombre, t.owner_id
         FROM task_tags tt
         INNER JOIN tags t ON t.id = tt.tag_id
         WHERE tt.task_id = ?1
         ORDER BY t.nombre ASC;",
    )?;
    let mut rows = stmt.query([task_id.to_string()])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(Tag {
            id: parse_uuid(&row.get::<_, String>("id")?, "tags.id")?,
            nombre: row.get("nombre")?,
            owner_id: parse_uuid(&row.get::<_, String>("owner_id")?, "tags.owner_id")?,
        });
    }
    Ok(tags)
}

fn parse_task_row(row: &Row<'_>) -> TaskRepoResult<Task> {
    let categoria_text: String = row.get("categoria")?;
    let categoria = CategoriaTarea::parse(&categoria_text).ok_or_else(|| {
        TaskRepoError::InvalidData(format!(
            "invalid categoria `{categoria_text}` in tasks.categoria"
        ))
    })?;

    let estado_text: String = row.get("estado")?;
    let estado = EstadoTarea::parse(&estado_text).ok_or_else(|| {
        TaskRepoError::InvalidData(format!("invalid estado `{estado_text}` in tasks.estado"))
    })?;

    let task = Task {
        id: parse_uuid(&row.get::<_, String>("id")?, "tasks.id")?,
        titulo: row.get("titulo")?,
        descripcion: row.get("descripcion")?,
        categoria,
        estado,
        peso: row.get("peso")?,
        due_date: row.get("due_date")?,
        owner_id: parse_uuid(&row.get::<_, String>("owner_id")?, "tasks.owner_id")?,
        room_id: parse_uuid(&row.get::<_, String>("room_id")?, "tasks.room_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    };
    task.validate()?;
    Ok(task)
}

fn parse_uuid(value: &str, column: &str) -> TaskRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| TaskRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
