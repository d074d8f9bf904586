//! Minimal user registry.
//!
//! Authentication and token issuance live outside the core; this
//! repository only materializes accounts so ownership and assignment
//! checks have rows to validate against.

use crate::db::DbError;
use crate::model::now_epoch_ms;
use crate::model::user::{User, UserId};
use crate::repo::is_unique_violation;
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type UserRepoResult<T> = Result<T, UserRepoError>;

/// Errors from user registry operations.
#[derive(Debug)]
pub enum UserRepoError {
    Db(DbError),
    /// An account with the same email already exists.
    EmailConflict(String),
    /// Persisted data cannot be converted to a valid user.
    InvalidData(String),
}

impl Display for UserRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::EmailConflict(email) => {
                write!(f, "an account with email `{email}` already exists")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted user data: {message}"),
        }
    }
}

impl Error for UserRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for UserRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for UserRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the user registry.
pub trait UserRepository {
    /// Registers one account.
    fn create_user(&self, email: &str) -> UserRepoResult<User>;
    /// Loads one account by id.
    fn get_user(&self, user_id: UserId) -> UserRepoResult<Option<User>>;
}

/// SQLite-backed user registry.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, email: &str) -> UserRepoResult<User> {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            is_active: true,
            created_at: now_epoch_ms(),
        };
        let inserted = self.conn.execute(
            "INSERT INTO users (id, email, is_active, created_at)
             VALUES (?1, ?2, 1, ?3);",
            params![user.id.to_string(), user.email.as_str(), user.created_at],
        );
        if let Err(err) = inserted {
            if is_unique_violation(&err, "users.email") {
                return Err(UserRepoError::EmailConflict(email.to_string()));
            }
            return Err(err.into());
        }
        Ok(user)
    }

    fn get_user(&self, user_id: UserId) -> UserRepoResult<Option<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, is_active, created_at FROM users WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }
}

fn parse_user_row(row: &Row<'_>) -> UserRepoResult<User> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text)
        .map_err(|_| UserRepoError::InvalidData(format!("invalid uuid `{id_text}` in users.id")))?;
    let is_active = row.get::<_, i64>("is_active")? != 0;
    Ok(User {
        id,
        email: row.get("email")?,
        is_active,
        created_at: row.get("created_at")?,
    })
}
