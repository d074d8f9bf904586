//! Tag domain model.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable tag identifier.
pub type TagId = Uuid;

/// Per-user label attachable to any number of tasks.
///
/// `nombre` is unique per owner; the association rows live in `task_tags`
/// and are owned jointly by the task and the tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub nombre: String,
    pub owner_id: UserId,
}
