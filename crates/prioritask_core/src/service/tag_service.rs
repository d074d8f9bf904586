//! Tag use-case service.
//!
//! Thin facade over the tag repository; name validation, uniqueness and
//! cascade semantics live in the repository transaction. The service adds
//! the diagnostic events.

use crate::model::tag::{Tag, TagId};
use crate::model::task::TaskId;
use crate::model::user::UserId;
use crate::repo::tag_repo::{TagRepoResult, TagRepository};
use log::info;

/// Tag service facade over repository implementations.
pub struct TagService<R: TagRepository> {
    repo: R,
}

impl<R: TagRepository> TagService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one tag for the owner.
    pub fn create_tag(&self, owner_id: UserId, nombre: &str) -> TagRepoResult<Tag> {
        let tag = self.repo.create_tag(owner_id, nombre)?;
        info!(
            "event=tag_create module=tag_service status=ok tag_id={} owner_id={owner_id}",
            tag.id
        );
        Ok(tag)
    }

    /// Renames one owned tag.
    pub fn rename_tag(&self, tag_id: TagId, owner_id: UserId, nombre: &str) -> TagRepoResult<Tag> {
        self.repo.rename_tag(tag_id, owner_id, nombre)
    }

    /// Deletes one owned tag, cascading its task links atomically.
    pub fn delete_tag(&self, tag_id: TagId, owner_id: UserId) -> TagRepoResult<()> {
        self.repo.delete_tag(tag_id, owner_id)?;
        info!("event=tag_delete module=tag_service status=ok tag_id={tag_id}");
        Ok(())
    }

    /// Lists the owner's tags ordered by nombre.
    pub fn list_tags(&self, owner_id: UserId) -> TagRepoResult<Vec<Tag>> {
        self.repo.list_tags(owner_id)
    }

    /// Links tags to an owned task; tags already linked are skipped.
    pub fn assign_tags(
        &self,
        task_id: TaskId,
        tag_ids: &[TagId],
        owner_id: UserId,
    ) -> TagRepoResult<()> {
        self.repo.assign_tags(task_id, tag_ids, owner_id)
    }

    /// Removes one task<->tag link.
    pub fn unassign_tag(
        &self,
        task_id: TaskId,
        tag_id: TagId,
        owner_id: UserId,
    ) -> TagRepoResult<()> {
        self.repo.unassign_tag(task_id, tag_id, owner_id)
    }

    /// Lists tags linked to one task, ordered by nombre.
    pub fn tags_for_task(&self, task_id: TaskId) -> TagRepoResult<Vec<Tag>> {
        self.repo.tags_for_task(task_id)
    }
}
