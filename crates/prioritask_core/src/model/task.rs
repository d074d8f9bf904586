//! Task domain model.
//!
//! # Responsibility
//! - Define the task record, its category/state enums and write requests.
//! - Provide field-level validation shared by create and update paths.
//!
//! # Invariants
//! - `titulo` is never blank after trim.
//! - `peso` stays inside the open interval (0, 100).
//! - `deleted_at` is the source of truth for tombstone state.

use crate::model::room::RoomId;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable task identifier.
pub type TaskId = Uuid;

/// Task category as exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoriaTarea {
    Limpieza,
    Compra,
    Mantenimiento,
    Otro,
}

impl CategoriaTarea {
    /// Canonical storage/wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Limpieza => "LIMPIEZA",
            Self::Compra => "COMPRA",
            Self::Mantenimiento => "MANTENIMIENTO",
            Self::Otro => "OTRO",
        }
    }

    /// Parses the storage spelling back into the enum.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LIMPIEZA" => Some(Self::Limpieza),
            "COMPRA" => Some(Self::Compra),
            "MANTENIMIENTO" => Some(Self::Mantenimiento),
            "OTRO" => Some(Self::Otro),
            _ => None,
        }
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstadoTarea {
    Todo,
    InProgress,
    Done,
}

impl EstadoTarea {
    /// Canonical storage/wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }

    /// Parses the storage spelling back into the enum.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TODO" => Some(Self::Todo),
            "IN_PROGRESS" => Some(Self::InProgress),
            "DONE" => Some(Self::Done),
            _ => None,
        }
    }
}

/// Canonical task record.
///
/// `deleted_at = None` marks the row as active; tombstoned rows stay in
/// storage for audit and history reads but are excluded from listings and
/// uniqueness checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable global id used for linking and auditing.
    pub id: TaskId,
    pub titulo: String,
    pub descripcion: Option<String>,
    pub categoria: CategoriaTarea,
    pub estado: EstadoTarea,
    pub peso: f64,
    /// Epoch milliseconds. `None` means no deadline.
    pub due_date: Option<i64>,
    pub owner_id: UserId,
    /// Every task lives in exactly one room.
    pub room_id: RoomId,
    pub created_at: i64,
    pub updated_at: i64,
    /// Soft-delete tombstone timestamp.
    pub deleted_at: Option<i64>,
}

impl Task {
    /// Returns whether this task should be considered visible/active.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Validates stored field invariants.
    ///
    /// Write paths must call this before SQL mutations; read paths use it to
    /// reject invalid persisted state instead of masking it.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_titulo(&self.titulo)?;
        validate_peso(self.peso)?;
        Ok(())
    }
}

/// Write request for task creation.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub titulo: String,
    pub descripcion: Option<String>,
    pub categoria: CategoriaTarea,
    pub peso: f64,
    pub due_date: Option<i64>,
    /// Target room. `None` resolves to the owner's default room.
    pub room_id: Option<RoomId>,
}

impl TaskDraft {
    /// Creates a draft with the documented defaults (`peso = 1.0`, no
    /// description, no deadline, default room).
    pub fn new(titulo: impl Into<String>, categoria: CategoriaTarea) -> Self {
        Self {
            titulo: titulo.into(),
            descripcion: None,
            categoria,
            peso: 1.0,
            due_date: None,
            room_id: None,
        }
    }

    /// Validates the draft's field invariants.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_titulo(&self.titulo)?;
        validate_peso(self.peso)?;
        Ok(())
    }
}

/// Partial update request.
///
/// `None` means "field not present in the patch". Nullable fields use a
/// nested `Option` so a patch can distinguish "leave unchanged" from
/// "clear to null".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub titulo: Option<String>,
    pub descripcion: Option<Option<String>>,
    pub categoria: Option<CategoriaTarea>,
    pub estado: Option<EstadoTarea>,
    pub peso: Option<f64>,
    pub due_date: Option<Option<i64>>,
}

impl TaskPatch {
    /// Returns whether the patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validates the fields present in the patch.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if let Some(titulo) = &self.titulo {
            validate_titulo(titulo)?;
        }
        if let Some(peso) = self.peso {
            validate_peso(peso)?;
        }
        Ok(())
    }

    /// Applies every present field onto `task`, without touching timestamps.
    pub fn apply(&self, task: &mut Task) {
        if let Some(titulo) = &self.titulo {
            task.titulo = titulo.clone();
        }
        if let Some(descripcion) = &self.descripcion {
            task.descripcion = descripcion.clone();
        }
        if let Some(categoria) = self.categoria {
            task.categoria = categoria;
        }
        if let Some(estado) = self.estado {
            task.estado = estado;
        }
        if let Some(peso) = self.peso {
            task.peso = peso;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
    }
}

/// Field-level validation failure for task writes.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskValidationError {
    /// `titulo` is empty after trimming.
    TituloBlank,
    /// `peso` falls outside the open interval (0, 100).
    PesoOutOfRange(f64),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TituloBlank => write!(f, "titulo must not be blank"),
            Self::PesoOutOfRange(peso) => {
                write!(f, "peso {peso} must be greater than 0 and less than 100")
            }
        }
    }
}

impl Error for TaskValidationError {}

fn validate_titulo(titulo: &str) -> Result<(), TaskValidationError> {
    if titulo.trim().is_empty() {
        return Err(TaskValidationError::TituloBlank);
    }
    Ok(())
}

fn validate_peso(peso: f64) -> Result<(), TaskValidationError> {
    if !(peso > 0.0 && peso < 100.0) {
        return Err(TaskValidationError::PesoOutOfRange(peso));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_peso, CategoriaTarea, EstadoTarea, TaskDraft, TaskValidationError};

    #[test]
    fn enum_spellings_round_trip() {
        for categoria in [
            CategoriaTarea::Limpieza,
            CategoriaTarea::Compra,
            CategoriaTarea::Mantenimiento,
            CategoriaTarea::Otro,
        ] {
            assert_eq!(CategoriaTarea::parse(categoria.as_str()), Some(categoria));
        }
        for estado in [EstadoTarea::Todo, EstadoTarea::InProgress, EstadoTarea::Done] {
            assert_eq!(EstadoTarea::parse(estado.as_str()), Some(estado));
        }
    }

    #[test]
    fn peso_interval_is_open() {
        assert!(validate_peso(0.0).is_err());
        assert!(validate_peso(100.0).is_err());
        assert!(validate_peso(0.1).is_ok());
        assert!(validate_peso(99.9).is_ok());
    }

    #[test]
    fn blank_titulo_is_rejected() {
        let draft = TaskDraft::new("   ", CategoriaTarea::Otro);
        assert_eq!(draft.validate(), Err(TaskValidationError::TituloBlank));
    }
}
