//! Room repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide persistence APIs for the per-owner room hierarchy.
//! - Keep sibling-name uniqueness and acyclicity checks inside the write
//!   transaction.
//!
//! # Invariants
//! - `nombre` is unique per owner among siblings, not globally.
//! - A room's ancestor chain never revisits a node; re-parent operations
//!   verify this explicitly before writing.
//! - The default room upsert is idempotent under concurrent creation.

use crate::db::DbError;
use crate::model::now_epoch_ms;
use crate::model::room::{Room, RoomId, DEFAULT_ROOM_NOMBRE};
use crate::model::user::UserId;
use crate::repo::is_unique_violation;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ROOM_SELECT_SQL: &str = "SELECT id, nombre, owner_id, parent_id, created_at FROM rooms";

pub type RoomRepoResult<T> = Result<T, RoomRepoError>;

/// Errors from room persistence operations.
#[derive(Debug)]
pub enum RoomRepoError {
    Db(DbError),
    /// Room absent or owned by another user.
    NotFound(RoomId),
    /// Requested parent absent or owned by another user.
    ParentNotFound(RoomId),
    /// A sibling with the same nombre already exists for this owner.
    NombreConflict { owner_id: UserId, nombre: String },
    /// Re-parenting would make the room its own ancestor.
    CycleDetected(RoomId),
    /// Nombre is blank after trim.
    NombreBlank,
    /// Persisted data cannot be converted to a valid room.
    InvalidData(String),
}

impl Display for RoomRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "room not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent room not found: {id}"),
            Self::NombreConflict { owner_id, nombre } => write!(
                f,
                "a sibling room named `{nombre}` already exists for user {owner_id}"
            ),
            Self::CycleDetected(id) => {
                write!(f, "re-parenting room {id} would create a cycle")
            }
            Self::NombreBlank => write!(f, "room nombre must not be blank"),
            Self::InvalidData(message) => write!(f, "invalid persisted room data: {message}"),
        }
    }
}

impl Error for RoomRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RoomRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RoomRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for room operations.
pub trait RoomRepository {
    /// Creates one room, optionally nested under an owned parent.
    fn create_room(
        &self,
        owner_id: UserId,
        nombre: &str,
        parent_id: Option<RoomId>,
    ) -> RoomRepoResult<Room>;
    /// Loads one owned room.
    fn get_room(&self, room_id: RoomId, owner_id: UserId) -> RoomRepoResult<Option<Room>>;
    /// Lists every room of one owner, ordered by nombre.
    fn list_rooms(&self, owner_id: UserId) -> RoomRepoResult<Vec<Room>>;
    /// Lists direct children of one parent (`None` = root-level rooms).
    fn list_children(
        &self,
        owner_id: UserId,
        parent_id: Option<RoomId>,
    ) -> RoomRepoResult<Vec<Room>>;
    /// Moves one room under a new parent (or to root), rejecting cycles.
    fn move_room(
        &self,
        room_id: RoomId,
        owner_id: UserId,
        new_parent_id: Option<RoomId>,
    ) -> RoomRepoResult<Room>;
    /// Returns the owner's default room id, creating the room on first use.
    fn ensure_default_room(&self, owner_id: UserId) -> RoomRepoResult<RoomId>;
}

/// SQLite-backed room repository.
pub struct SqliteRoomRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRoomRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RoomRepository for SqliteRoomRepository<'_> {
    fn create_room(
        &self,
        owner_id: UserId,
        nombre: &str,
        parent_id: Option<RoomId>,
    ) -> RoomRepoResult<Room> {
        let nombre = nombre.trim();
        if nombre.is_empty() {
            return Err(RoomRepoError::NombreBlank);
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Some(parent_id) = parent_id {
            if load_owned_room(&tx, parent_id, owner_id)?.is_none() {
                return Err(RoomRepoError::ParentNotFound(parent_id));
            }
        }
        if sibling_nombre_exists(&tx, owner_id, parent_id, nombre, None)? {
            return Err(RoomRepoError::NombreConflict {
                owner_id,
                nombre: nombre.to_string(),
            });
        }

        let room = Room {
            id: Uuid::new_v4(),
            nombre: nombre.to_string(),
            owner_id,
            parent_id,
            created_at: now_epoch_ms(),
        };
        let inserted = tx.execute(
            "INSERT INTO rooms (id, nombre, owner_id, parent_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                room.id.to_string(),
                room.nombre.as_str(),
                room.owner_id.to_string(),
                room.parent_id.map(|id| id.to_string()),
                room.created_at,
            ],
        );
        if let Err(err) = inserted {
            if is_unique_violation(&err, "idx_rooms_owner") {
                return Err(RoomRepoError::NombreConflict {
                    owner_id,
                    nombre: nombre.to_string(),
                });
            }
            return Err(err.into());
        }
        tx.commit()?;
        Ok(room)
    }

    fn get_room(&self, room_id: RoomId, owner_id: UserId) -> RoomRepoResult<Option<Room>> {
        load_owned_room(self.conn, room_id, owner_id)
    }

    fn list_rooms(&self, owner_id: UserId) -> RoomRepoResult<Vec<Room>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ROOM_SELECT_SQL} WHERE owner_id = ?1 ORDER BY nombre ASC, id ASC;"))?;
        let mut rows = stmt.query([owner_id.to_string()])?;
        collect_rooms(&mut rows)
    }

    fn list_children(
        &self,
        owner_id: UserId,
        parent_id: Option<RoomId>,
    ) -> RoomRepoResult<Vec<Room>> {
        match parent_id {
            Some(parent_id) => {
                let mut stmt = self.conn.prepare(&format!(
                    "{ROOM_SELECT_SQL}
                     WHERE owner_id = ?1 AND parent_id = ?2
                     ORDER BY nombre ASC, id ASC;"
                ))?;
                let mut rows = stmt.query(params![owner_id.to_string(), parent_id.to_string()])?;
                collect_rooms(&mut rows)
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "{ROOM_SELECT_SQL}
                     WHERE owner_id = ?1 AND parent_id IS NULL
                     ORDER BY nombre ASC, id ASC;"
                ))?;
                let mut rows = stmt.query([owner_id.to_string()])?;
                collect_rooms(&mut rows)
            }
        }
    }

    fn move_room(
        &self,
        room_id: RoomId,
        owner_id: UserId,
        new_parent_id: Option<RoomId>,
    ) -> RoomRepoResult<Room> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut room = match load_owned_room(&tx, room_id, owner_id)? {
            Some(room) => room,
            None => return Err(RoomRepoError::NotFound(room_id)),
        };

        if let Some(parent_id) = new_parent_id {
            if load_owned_room(&tx, parent_id, owner_id)?.is_none() {
                return Err(RoomRepoError::ParentNotFound(parent_id));
            }
            ensure_no_cycle(&tx, room_id, parent_id)?;
        }
        if sibling_nombre_exists(&tx, owner_id, new_parent_id, &room.nombre, Some(room_id))? {
            return Err(RoomRepoError::NombreConflict {
                owner_id,
                nombre: room.nombre.clone(),
            });
        }

        tx.execute(
            "UPDATE rooms SET parent_id = ?2 WHERE id = ?1;",
            params![room_id.to_string(), new_parent_id.map(|id| id.to_string())],
        )?;
        tx.commit()?;
        room.parent_id = new_parent_id;
        Ok(room)
    }

    fn ensure_default_room(&self, owner_id: UserId) -> RoomRepoResult<RoomId> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let room_id = resolve_default_room(&tx, owner_id, now_epoch_ms())?;
        tx.commit()?;
        Ok(room_id)
    }
}

/// Returns the owner's root-level default room, inserting it on first use.
///
/// Modeled as attempt-insert-then-read so a concurrent creation race
/// reconciles instead of raising: `INSERT OR IGNORE` hits the partial
/// unique index and the follow-up read sees whichever row won.
pub(crate) fn resolve_default_room(
    conn: &Connection,
    owner_id: UserId,
    now: i64,
) -> rusqlite::Result<RoomId> {
    conn.execute(
        "INSERT OR IGNORE INTO rooms (id, nombre, owner_id, parent_id, created_at)
         VALUES (?1, ?2, ?3, NULL, ?4);",
        params![
            Uuid::new_v4().to_string(),
            DEFAULT_ROOM_NOMBRE,
            owner_id.to_string(),
            now,
        ],
    )?;
    let id_text: String = conn.query_row(
        "SELECT id FROM rooms
         WHERE owner_id = ?1 AND nombre = ?2 AND parent_id IS NULL;",
        params![owner_id.to_string(), DEFAULT_ROOM_NOMBRE],
        |row| row.get(0),
    )?;
    Uuid::parse_str(&id_text).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
    })
}

/// Walks the would-be ancestor chain of `room_id` starting at
/// `new_parent_id` and fails when the chain reaches the room itself.
///
/// The visited set also terminates the walk on pre-existing corrupt chains
/// instead of looping forever.
fn ensure_no_cycle(
    conn: &Connection,
    room_id: RoomId,
    new_parent_id: RoomId,
) -> RoomRepoResult<()> {
    let mut visited: HashSet<RoomId> = HashSet::new();
    let mut cursor = Some(new_parent_id);
    while let Some(current) = cursor {
        if current == room_id {
            return Err(RoomRepoError::CycleDetected(room_id));
        }
        if !visited.insert(current) {
            break;
        }
        cursor = parent_of(conn, current)?;
    }
    Ok(())
}

fn parent_of(conn: &Connection, room_id: RoomId) -> RoomRepoResult<Option<RoomId>> {
    let parent_text: Option<Option<String>> = conn
        .query_row(
            "SELECT parent_id FROM rooms WHERE id = ?1;",
            [room_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match parent_text.flatten() {
        Some(value) => Ok(Some(parse_uuid(&value, "rooms.parent_id")?)),
        None => Ok(None),
    }
}

fn sibling_nombre_exists(
    conn: &Connection,
    owner_id: UserId,
    parent_id: Option<RoomId>,
    nombre: &str,
    exclude: Option<RoomId>,
) -> RoomRepoResult<bool> {
    let exclude_text = exclude.map_or_else(String::new, |id| id.to_string());
    let exists: i64 = match parent_id {
        Some(parent_id) => conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM rooms
                WHERE owner_id = ?1 AND parent_id = ?2 AND nombre = ?3 AND id <> ?4
            );",
            params![
                owner_id.to_string(),
                parent_id.to_string(),
                nombre,
                exclude_text,
            ],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM rooms
                WHERE owner_id = ?1 AND parent_id IS NULL AND nombre = ?2 AND id <> ?3
            );",
            params![owner_id.to_string(), nombre, exclude_text],
            |row| row.get(0),
        )?,
    };
    Ok(exists == 1)
}

fn load_owned_room(
    conn: &Connection,
    room_id: RoomId,
    owner_id: UserId,
) -> RoomRepoResult<Option<Room>> {
    let mut stmt = conn.prepare(&format!(
        "{ROOM_SELECT_SQL} WHERE id = ?1 AND owner_id = ?2;"
    ))?;
    let mut rows = stmt.query(params![room_id.to_string(), owner_id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_room_row(row)?)),
        None => Ok(None),
    }
}

fn collect_rooms(rows: &mut rusqlite::Rows<'_>) -> RoomRepoResult<Vec<Room>> {
    let mut rooms = Vec::new();
    while let Some(row) = rows.next()? {
        rooms.push(parse_room_row(row)?);
    }
    Ok(rooms)
}

fn parse_room_row(row: &Row<'_>) -> RoomRepoResult<Room> {
    let parent_id = match row.get::<_, Option<String>>("parent_id")? {
        Some(value) => Some(parse_uuid(&value, "rooms.parent_id")?),
        None => None,
    };
    Ok(Room {
        id: parse_uuid(&row.get::<_, String>("id")?, "rooms.id")?,
        nombre: row.get("nombre")?,
        owner_id: parse_uuid(&row.get::<_, String>("owner_id")?, "rooms.owner_id")?,
        parent_id,
        created_at: row.get("created_at")?,
    })
}

fn parse_uuid(value: &str, column: &str) -> RoomRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RoomRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
