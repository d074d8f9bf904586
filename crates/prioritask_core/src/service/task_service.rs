//! Task use-case service.
//!
//! # Responsibility
//! - Provide task create/update/status/delete/get/list entry points.
//! - Enforce clock-dependent validation (past due dates) above the
//!   repository layer.
//! - Expose the audit trail with the documented not-found boundary.
//!
//! # Invariants
//! - Service APIs never bypass repository transaction/uniqueness contracts.
//! - A patch that changes nothing returns the stored task without touching
//!   storage.

use crate::model::history::TaskHistoryEntry;
use crate::model::now_epoch_ms;
use crate::model::room::RoomId;
use crate::model::task::{
    EstadoTarea, Task, TaskDraft, TaskId, TaskPatch, TaskValidationError,
};
use crate::model::user::UserId;
use crate::repo::history_repo::{HistoryRepoError, HistoryRepository};
use crate::repo::task_repo::{TaskDetail, TaskListQuery, TaskRepoError, TaskRepository};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Behavior toggles for task writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskServiceOptions {
    /// Accept due dates in the past at creation time. Off outside of
    /// backfill/test scenarios.
    pub allow_past_due_dates: bool,
}

impl Default for TaskServiceOptions {
    fn default() -> Self {
        Self {
            allow_past_due_dates: false,
        }
    }
}

impl TaskServiceOptions {
    /// Reads the `ALLOW_PAST_DUE_DATES` override from the environment.
    pub fn from_env() -> Self {
        let allow_past_due_dates = std::env::var("ALLOW_PAST_DUE_DATES")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            allow_past_due_dates,
        }
    }
}

/// Service error for task use-cases.
#[derive(Debug)]
pub enum TaskServiceError {
    /// Field-level validation failure.
    Validation(TaskValidationError),
    /// Due date lies in the past and the override is off.
    DueDateInPast(i64),
    /// Task absent, soft-deleted, or owned by another user.
    NotFound(TaskId),
    /// Task exists but belongs to another user (single-read path only).
    Forbidden(TaskId),
    /// Referenced room is missing or not owned by the caller.
    RoomNotFound(RoomId),
    /// An active task with the same titulo already exists for the owner.
    TituloConflict { owner_id: UserId, titulo: String },
    /// The task has no history entries at all.
    HistoryNotFound(TaskId),
    /// Persistence-layer failure.
    Repo(TaskRepoError),
    /// History-read failure.
    History(HistoryRepoError),
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DueDateInPast(due_date) => {
                write!(f, "due date {due_date} is in the past")
            }
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::Forbidden(id) => write!(f, "task not accessible: {id}"),
            Self::RoomNotFound(id) => write!(f, "room not found: {id}"),
            Self::TituloConflict { owner_id, titulo } => write!(
                f,
                "an active task titled `{titulo}` already exists for user {owner_id}"
            ),
            Self::HistoryNotFound(id) => write!(f, "no history for task: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::History(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::History(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskRepoError> for TaskServiceError {
    fn from(value: TaskRepoError) -> Self {
        match value {
            TaskRepoError::Validation(err) => Self::Validation(err),
            TaskRepoError::NotFound(id) => Self::NotFound(id),
            TaskRepoError::Forbidden(id) => Self::Forbidden(id),
            TaskRepoError::RoomNotFound(id) => Self::RoomNotFound(id),
            TaskRepoError::TituloConflict { owner_id, titulo } => {
                Self::TituloConflict { owner_id, titulo }
            }
            other => Self::Repo(other),
        }
    }
}

impl From<HistoryRepoError> for TaskServiceError {
    fn from(value: HistoryRepoError) -> Self {
        Self::History(value)
    }
}

/// Task service facade over repository implementations.
pub struct TaskService<R: TaskRepository, H: HistoryRepository> {
    tasks: R,
    history: H,
    options: TaskServiceOptions,
}

impl<R: TaskRepository, H: HistoryRepository> TaskService<R, H> {
    /// Creates a service with default options.
    pub fn new(tasks: R, history: H) -> Self {
        Self::with_options(tasks, history, TaskServiceOptions::default())
    }

    /// Creates a service with explicit options.
    pub fn with_options(tasks: R, history: H, options: TaskServiceOptions) -> Self {
        Self {
            tasks,
            history,
            options,
        }
    }

    /// Creates one task in estado TODO.
    ///
    /// # Errors
    /// - `Validation` for blank titulo or out-of-range peso.
    /// - `DueDateInPast` unless the override option is set.
    /// - `TituloConflict` when an active task already uses the titulo.
    /// - `RoomNotFound` when the draft names a foreign/missing room.
    pub fn create_task(
        &self,
        owner_id: UserId,
        draft: &TaskDraft,
    ) -> Result<Task, TaskServiceError> {
        draft.validate().map_err(TaskServiceError::Validation)?;
        if !self.options.allow_past_due_dates {
            if let Some(due_date) = draft.due_date {
                if due_date < now_epoch_ms() {
                    return Err(TaskServiceError::DueDateInPast(due_date));
                }
            }
        }

        let task = self.tasks.create_task(owner_id, draft)?;
        info!(
            "event=task_create module=task_service status=ok task_id={} owner_id={owner_id}",
            task.id
        );
        Ok(task)
    }

    /// Applies a partial update. A patch whose values all match storage is
    /// an idempotent no-op: no history entry, no `updated_at` bump.
    pub fn update_task(
        &self,
        task_id: TaskId,
        owner_id: UserId,
        patch: &TaskPatch,
    ) -> Result<Task, TaskServiceError> {
        patch.validate().map_err(TaskServiceError::Validation)?;
        if !self.options.allow_past_due_dates {
            if let Some(Some(due_date)) = patch.due_date {
                if due_date < now_epoch_ms() {
                    return Err(TaskServiceError::DueDateInPast(due_date));
                }
            }
        }

        let task = self.tasks.update_task(task_id, owner_id, patch)?;
        Ok(task)
    }

    /// Sets the task state. Every call records one STATUS_UPDATED entry.
    pub fn patch_estado(
        &self,
        task_id: TaskId,
        owner_id: UserId,
        estado: EstadoTarea,
    ) -> Result<Task, TaskServiceError> {
        let task = self.tasks.patch_estado(task_id, owner_id, estado)?;
        info!(
            "event=task_status module=task_service status=ok task_id={task_id} estado={}",
            estado.as_str()
        );
        Ok(task)
    }

    /// Soft-deletes one owned task.
    pub fn delete_task(&self, task_id: TaskId, owner_id: UserId) -> Result<(), TaskServiceError> {
        self.tasks.soft_delete_task(task_id, owner_id)?;
        info!(
            "event=task_delete module=task_service status=ok task_id={task_id} owner_id={owner_id}"
        );
        Ok(())
    }

    /// Loads one active task with its tags.
    pub fn get_task(
        &self,
        task_id: TaskId,
        owner_id: UserId,
    ) -> Result<TaskDetail, TaskServiceError> {
        Ok(self.tasks.get_task(task_id, owner_id)?)
    }

    /// Lists the owner's active tasks using filter/order/pagination.
    pub fn list_tasks(
        &self,
        owner_id: UserId,
        query: &TaskListQuery,
    ) -> Result<Vec<Task>, TaskServiceError> {
        Ok(self.tasks.list_tasks(owner_id, query)?)
    }

    /// Lists the active tasks of one owned room. Shares the same filter
    /// engine as [`Self::list_tasks`]; the room predicate is the direct
    /// foreign key, never a name lookup.
    pub fn list_room_tasks(
        &self,
        owner_id: UserId,
        room_id: RoomId,
        query: &TaskListQuery,
    ) -> Result<Vec<Task>, TaskServiceError> {
        let mut scoped = query.clone();
        scoped.room_id = Some(room_id);
        Ok(self.tasks.list_tasks(owner_id, &scoped)?)
    }

    /// Reads the ordered audit trail of one task.
    ///
    /// # Errors
    /// - `HistoryNotFound` when the task has no entries at all (which also
    ///   covers tasks that never existed).
    pub fn get_task_history(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<TaskHistoryEntry>, TaskServiceError> {
        let entries = self.history.list_history(task_id)?;
        if entries.is_empty() {
            return Err(TaskServiceError::HistoryNotFound(task_id));
        }
        Ok(entries)
    }
}
