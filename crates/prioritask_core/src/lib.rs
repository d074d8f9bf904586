//! Core domain logic for Prioritask.
//! This crate is the single source of truth for business invariants:
//! task lifecycle, the immutable audit trail, tag/room associations and
//! cross-user assignments.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::assignment::TaskAssignment;
pub use model::history::{ChangeSet, FieldChange, HistoryAction, TaskHistoryEntry};
pub use model::room::{Room, RoomId, DEFAULT_ROOM_NOMBRE};
pub use model::tag::{Tag, TagId};
pub use model::task::{
    CategoriaTarea, EstadoTarea, Task, TaskDraft, TaskId, TaskPatch, TaskValidationError,
};
pub use model::user::{User, UserId};
pub use repo::assignment_repo::{
    AssignmentRepoError, AssignmentRepository, SqliteAssignmentRepository,
};
pub use repo::history_repo::{HistoryRepoError, HistoryRepository, SqliteHistoryRepository};
pub use repo::room_repo::{RoomRepoError, RoomRepository, SqliteRoomRepository};
pub use repo::tag_repo::{SqliteTagRepository, TagRepoError, TagRepository};
pub use repo::task_repo::{
    OrderDir, SqliteTaskRepository, TaskDetail, TaskListQuery, TaskOrderBy, TaskRepoError,
    TaskRepository,
};
pub use repo::user_repo::{SqliteUserRepository, UserRepoError, UserRepository};
pub use service::assignment_service::{AssignmentService, AssignmentServiceError};
pub use service::room_service::RoomService;
pub use service::tag_service::TagService;
pub use service::task_service::{TaskService, TaskServiceError, TaskServiceOptions};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
