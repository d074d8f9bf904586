//! Task assignment model.

use crate::model::task::TaskId;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

/// Cross-user assignment of one task to one collaborator.
///
/// The integer id is a storage sequence and doubles as stable insertion
/// order for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub id: i64,
    pub task_id: TaskId,
    /// Assignee.
    pub user_id: UserId,
    /// User who created the assignment.
    pub asignado_por: UserId,
    /// Epoch milliseconds.
    pub fecha: i64,
}
