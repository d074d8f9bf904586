//! Room use-case service.
//!
//! Thin facade over the room repository. Hierarchy invariants (sibling
//! name uniqueness, acyclicity) are enforced inside the repository write
//! transactions.

use crate::model::room::{Room, RoomId};
use crate::model::user::UserId;
use crate::repo::room_repo::{RoomRepoResult, RoomRepository};
use log::info;

/// Room service facade over repository implementations.
pub struct RoomService<R: RoomRepository> {
    repo: R,
}

impl<R: RoomRepository> RoomService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one room, optionally nested under an owned parent.
    pub fn create_room(
        &self,
        owner_id: UserId,
        nombre: &str,
        parent_id: Option<RoomId>,
    ) -> RoomRepoResult<Room> {
        let room = self.repo.create_room(owner_id, nombre, parent_id)?;
        info!(
            "event=room_create module=room_service status=ok room_id={} owner_id={owner_id}",
            room.id
        );
        Ok(room)
    }

    /// Loads one owned room.
    pub fn get_room(&self, room_id: RoomId, owner_id: UserId) -> RoomRepoResult<Option<Room>> {
        self.repo.get_room(room_id, owner_id)
    }

    /// Lists every room of the owner.
    pub fn list_rooms(&self, owner_id: UserId) -> RoomRepoResult<Vec<Room>> {
        self.repo.list_rooms(owner_id)
    }

    /// Lists direct children of one parent (`None` = root-level rooms).
    pub fn list_children(
        &self,
        owner_id: UserId,
        parent_id: Option<RoomId>,
    ) -> RoomRepoResult<Vec<Room>> {
        self.repo.list_children(owner_id, parent_id)
    }

    /// Moves one room under a new parent (or to root), rejecting cycles.
    pub fn move_room(
        &self,
        room_id: RoomId,
        owner_id: UserId,
        new_parent_id: Option<RoomId>,
    ) -> RoomRepoResult<Room> {
        self.repo.move_room(room_id, owner_id, new_parent_id)
    }

    /// Returns the owner's default room id, creating it on first use.
    pub fn ensure_default_room(&self, owner_id: UserId) -> RoomRepoResult<RoomId> {
        self.repo.ensure_default_room(owner_id)
    }
}
