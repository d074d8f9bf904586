//! Task assignment use-case service.
//!
//! # Responsibility
//! - Validate assignment rules that do not belong to storage
//!   (self-assignment rejection).
//! - Delegate existence and duplicate checks to the repository
//!   transaction.

use crate::model::assignment::TaskAssignment;
use crate::model::task::TaskId;
use crate::model::user::UserId;
use crate::repo::assignment_repo::{AssignmentRepoError, AssignmentRepository};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for assignment use-cases.
#[derive(Debug)]
pub enum AssignmentServiceError {
    /// Users cannot assign tasks to themselves.
    SelfAssignment(UserId),
    /// Target task absent or soft-deleted.
    TaskNotFound(TaskId),
    /// Assignee absent or deactivated.
    UserNotFound(UserId),
    /// The (task, assignee) pair is already assigned.
    Duplicate { task_id: TaskId, user_id: UserId },
    /// No assignment row matches the (task, assignee) pair.
    NotFound { task_id: TaskId, user_id: UserId },
    /// Persistence-layer failure.
    Repo(AssignmentRepoError),
}

impl Display for AssignmentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfAssignment(user_id) => {
                write!(f, "user {user_id} cannot assign a task to themselves")
            }
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::Duplicate { task_id, user_id } => {
                write!(f, "task {task_id} is already assigned to user {user_id}")
            }
            Self::NotFound { task_id, user_id } => {
                write!(f, "no assignment of task {task_id} to user {user_id}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AssignmentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AssignmentRepoError> for AssignmentServiceError {
    fn from(value: AssignmentRepoError) -> Self {
        match value {
            AssignmentRepoError::TaskNotFound(id) => Self::TaskNotFound(id),
            AssignmentRepoError::UserNotFound(id) => Self::UserNotFound(id),
            AssignmentRepoError::Duplicate { task_id, user_id } => {
                Self::Duplicate { task_id, user_id }
            }
            AssignmentRepoError::NotFound { task_id, user_id } => {
                Self::NotFound { task_id, user_id }
            }
            other => Self::Repo(other),
        }
    }
}

/// Assignment service facade over repository implementations.
pub struct AssignmentService<R: AssignmentRepository> {
    repo: R,
}

impl<R: AssignmentRepository> AssignmentService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Assigns one task to a collaborator.
    ///
    /// # Errors
    /// - `SelfAssignment` when assignee and assigner are the same user.
    /// - `TaskNotFound` / `UserNotFound` for missing endpoints.
    /// - `Duplicate` when the pair is already assigned.
    pub fn assign(
        &self,
        task_id: TaskId,
        user_id: UserId,
        asignado_por: UserId,
    ) -> Result<TaskAssignment, AssignmentServiceError> {
        if user_id == asignado_por {
            return Err(AssignmentServiceError::SelfAssignment(user_id));
        }

        let assignment = self.repo.assign(task_id, user_id, asignado_por)?;
        info!(
            "event=task_assign module=assignment_service status=ok task_id={task_id} user_id={user_id} asignado_por={asignado_por}"
        );
        Ok(assignment)
    }

    /// Lists all assignments of one assignee in insertion order.
    pub fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TaskAssignment>, AssignmentServiceError> {
        Ok(self.repo.list_for_user(user_id)?)
    }

    /// Removes the (task, assignee) assignment.
    pub fn remove(&self, task_id: TaskId, user_id: UserId) -> Result<(), AssignmentServiceError> {
        self.repo.remove(task_id, user_id)?;
        Ok(())
    }
}
