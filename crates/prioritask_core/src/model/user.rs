//! Minimal user record.
//!
//! Authentication lives outside the core; this record exists so ownership
//! and assignment checks have a real registry to validate against.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable user identifier, supplied opaquely by the identity layer.
pub type UserId = Uuid;

/// Registered account as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub is_active: bool,
    pub created_at: i64,
}
