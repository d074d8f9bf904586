//! Task audit trail model and mutation diffing.
//!
//! # Responsibility
//! - Define the append-only history entry and its diff payload shape.
//! - Compute field-level diffs from an explicit comparison table.
//!
//! # Invariants
//! - History entries are never mutated or deleted once written.
//! - A diff contains exactly the fields whose new value differs from the
//!   stored value, compared by exact equality.

use crate::model::task::{EstadoTarea, Task, TaskId, TaskPatch};
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Action tag recorded with every history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Created,
    Updated,
    StatusUpdated,
    Deleted,
}

impl HistoryAction {
    /// Canonical storage/wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::StatusUpdated => "STATUS_UPDATED",
            Self::Deleted => "DELETED",
        }
    }

    /// Parses the storage spelling back into the enum.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATED" => Some(Self::Created),
            "UPDATED" => Some(Self::Updated),
            "STATUS_UPDATED" => Some(Self::StatusUpdated),
            "DELETED" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Old/new value pair for one changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Field name → old/new pairs for one accepted mutation.
///
/// A `BTreeMap` keeps the serialized payload deterministic.
pub type ChangeSet = BTreeMap<String, FieldChange>;

/// One immutable audit record for a task mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHistoryEntry {
    pub id: Uuid,
    pub task_id: TaskId,
    /// Actor that performed the mutation.
    pub user_id: UserId,
    pub action: HistoryAction,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Serialized [`ChangeSet`]; stored opaquely, decoded on demand.
    pub changes: Option<String>,
}

impl TaskHistoryEntry {
    /// Decodes the serialized diff payload, if any.
    pub fn decoded_changes(&self) -> Result<Option<ChangeSet>, serde_json::Error> {
        match &self.changes {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }
}

/// Computes the field diff between a stored task and a partial patch.
///
/// Only fields present in the patch participate. Equality is exact value
/// equality; no normalization is applied.
pub fn diff_task(stored: &Task, patch: &TaskPatch) -> ChangeSet {
    let mut changes = ChangeSet::new();

    if let Some(titulo) = &patch.titulo {
        if *titulo != stored.titulo {
            record(&mut changes, "titulo", &stored.titulo, titulo);
        }
    }
    if let Some(descripcion) = &patch.descripcion {
        if *descripcion != stored.descripcion {
            record(&mut changes, "descripcion", &stored.descripcion, descripcion);
        }
    }
    if let Some(categoria) = patch.categoria {
        if categoria != stored.categoria {
            record(&mut changes, "categoria", &stored.categoria, &categoria);
        }
    }
    if let Some(estado) = patch.estado {
        if estado != stored.estado {
            record(&mut changes, "estado", &stored.estado, &estado);
        }
    }
    if let Some(peso) = patch.peso {
        if peso != stored.peso {
            record(&mut changes, "peso", &stored.peso, &peso);
        }
    }
    if let Some(due_date) = patch.due_date {
        if due_date != stored.due_date {
            record(&mut changes, "due_date", &stored.due_date, &due_date);
        }
    }

    changes
}

/// Builds the single-field diff recorded by status patches.
pub fn estado_change(stored: &Task, new_estado: EstadoTarea) -> ChangeSet {
    let mut changes = ChangeSet::new();
    record(&mut changes, "estado", &stored.estado, &new_estado);
    changes
}

fn record<O: Serialize, N: Serialize>(changes: &mut ChangeSet, field: &str, old: &O, new: &N) {
    changes.insert(
        field.to_string(),
        FieldChange {
            old: serde_json::to_value(old).unwrap_or(Value::Null),
            new: serde_json::to_value(new).unwrap_or(Value::Null),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::{diff_task, HistoryAction};
    use crate::model::task::{CategoriaTarea, EstadoTarea, Task, TaskPatch};
    use serde_json::json;
    use uuid::Uuid;

    fn stored_task() -> Task {
        Task {
            id: Uuid::new_v4(),
            titulo: "Lavar platos".to_string(),
            descripcion: Some("Usar jabon".to_string()),
            categoria: CategoriaTarea::Limpieza,
            estado: EstadoTarea::Todo,
            peso: 1.0,
            due_date: None,
            owner_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            created_at: 1_000,
            updated_at: 1_000,
            deleted_at: None,
        }
    }

    #[test]
    fn diff_contains_exactly_the_changed_fields() {
        let stored = stored_task();
        let patch = TaskPatch {
            titulo: Some("Lavar platos".to_string()),
            peso: Some(3.5),
            ..TaskPatch::default()
        };

        let changes = diff_task(&stored, &patch);
        assert_eq!(changes.len(), 1);
        let peso = changes.get("peso").expect("peso change");
        assert_eq!(peso.old, json!(1.0));
        assert_eq!(peso.new, json!(3.5));
    }

    #[test]
    fn identical_patch_produces_empty_diff() {
        let stored = stored_task();
        let patch = TaskPatch {
            titulo: Some(stored.titulo.clone()),
            descripcion: Some(stored.descripcion.clone()),
            categoria: Some(stored.categoria),
            estado: Some(stored.estado),
            peso: Some(stored.peso),
            due_date: Some(stored.due_date),
        };
        assert!(diff_task(&stored, &patch).is_empty());
    }

    #[test]
    fn clearing_a_nullable_field_is_a_change() {
        let stored = stored_task();
        let patch = TaskPatch {
            descripcion: Some(None),
            ..TaskPatch::default()
        };
        let changes = diff_task(&stored, &patch);
        let descripcion = changes.get("descripcion").expect("descripcion change");
        assert_eq!(descripcion.old, json!("Usar jabon"));
        assert_eq!(descripcion.new, json!(null));
    }

    #[test]
    fn action_spellings_round_trip() {
        for action in [
            HistoryAction::Created,
            HistoryAction::Updated,
            HistoryAction::StatusUpdated,
            HistoryAction::Deleted,
        ] {
            assert_eq!(HistoryAction::parse(action.as_str()), Some(action));
        }
    }
}
