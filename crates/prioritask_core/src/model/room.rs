//! Room domain model.
//!
//! Rooms form a self-referential tree per owner. `parent_id = None` marks a
//! root-level room; cycle prevention happens at write time in the room
//! repository, not here.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable room identifier.
pub type RoomId = Uuid;

/// Name of the room lazily created when a task is filed without one.
pub const DEFAULT_ROOM_NOMBRE: &str = "General";

/// Container grouping tasks, optionally nested under a parent room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    /// Unique per owner among siblings, not globally.
    pub nombre: String,
    pub owner_id: UserId,
    pub parent_id: Option<RoomId>,
    pub created_at: i64,
}
