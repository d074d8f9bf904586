//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Every read-check-write sequence runs inside one `IMMEDIATE`
//!   transaction, so concurrent duplicate races resolve to exactly one
//!   success and one domain-level conflict.
//! - Repository APIs return semantic errors (`NotFound`, conflicts) in
//!   addition to DB transport errors.
//! - Soft-deleted task rows are excluded from listings and uniqueness
//!   checks unless an API explicitly asks for them.

pub mod assignment_repo;
pub mod history_repo;
pub mod room_repo;
pub mod tag_repo;
pub mod task_repo;
pub mod user_repo;

use rusqlite::Connection;

/// Returns whether `err` is a UNIQUE constraint violation whose message
/// mentions `needle` (a column list or index name).
pub(crate) fn is_unique_violation(err: &rusqlite::Error, needle: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, Some(message)) => {
            failure.code == rusqlite::ErrorCode::ConstraintViolation && message.contains(needle)
        }
        _ => false,
    }
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
