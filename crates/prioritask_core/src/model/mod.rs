//! Domain model for tasks, tags, rooms, users and the audit trail.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own field-level validation and mutation diffing.
//!
//! # Invariants
//! - Every entity is identified by a stable id that is never reused.
//! - Task deletion is represented by soft-delete tombstones, not hard delete.
//! - History diffs are computed from an explicit field table, never from
//!   runtime reflection.

pub mod assignment;
pub mod history;
pub mod room;
pub mod tag;
pub mod task;
pub mod user;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in epoch milliseconds.
///
/// All persisted timestamps in the core use this unit.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
