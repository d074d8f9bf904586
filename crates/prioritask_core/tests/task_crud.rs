use prioritask_core::db::open_db_in_memory;
use prioritask_core::{
    CategoriaTarea, EstadoTarea, SqliteHistoryRepository, SqliteRoomRepository,
    SqliteTaskRepository, SqliteUserRepository, TaskDraft, TaskPatch, TaskService,
    TaskServiceError, TaskServiceOptions, TaskValidationError, UserId, UserRepository,
    DEFAULT_ROOM_NOMBRE,
};
use prioritask_core::{RoomRepository, TaskListQuery};
use rusqlite::Connection;
use uuid::Uuid;

fn create_user(conn: &Connection, email: &str) -> UserId {
    SqliteUserRepository::new(conn)
        .create_user(email)
        .unwrap()
        .id
}

fn service(conn: &Connection) -> TaskService<SqliteTaskRepository<'_>, SqliteHistoryRepository<'_>> {
    TaskService::new(
        SqliteTaskRepository::try_new(conn).unwrap(),
        SqliteHistoryRepository::new(conn),
    )
}

#[test]
fn create_starts_in_todo_and_files_into_default_room() {
    let conn = open_db_in_memory().unwrap();
    let owner = create_user(&conn, "ana@example.com");
    let service = service(&conn);

    let task = service
        .create_task(owner, &TaskDraft::new("Lavar platos", CategoriaTarea::Limpieza))
        .unwrap();
    assert_eq!(task.estado, EstadoTarea::Todo);
    assert_eq!(task.peso, 1.0);
    assert!(task.deleted_at.is_none());

    let rooms = SqliteRoomRepository::new(&conn);
    let default_room = rooms.get_room(task.room_id, owner).unwrap().unwrap();
    assert_eq!(default_room.nombre, DEFAULT_ROOM_NOMBRE);

    // A second room-less task reuses the same default room.
    let second = service
        .create_task(owner, &TaskDraft::new("Pasear al perro", CategoriaTarea::Otro))
        .unwrap();
    assert_eq!(second.room_id, task.room_id);
}

#[test]
fn duplicate_active_titulo_is_a_conflict_per_owner() {
    let conn = open_db_in_memory().unwrap();
    let owner = create_user(&conn, "ana@example.com");
    let other = create_user(&conn, "ben@example.com");
    let service = service(&conn);

    let draft = TaskDraft::new("Hacer la compra", CategoriaTarea::Compra);
    service.create_task(owner, &draft).unwrap();

    let err = service.create_task(owner, &draft).unwrap_err();
    assert!(matches!(err, TaskServiceError::TituloConflict { .. }));

    // The same titulo is fine for a different owner.
    service.create_task(other, &draft).unwrap();
}

#[test]
fn soft_deleting_frees_the_titulo_for_reuse() {
    let conn = open_db_in_memory().unwrap();
    let owner = create_user(&conn, "ana@example.com");
    let service = service(&conn);

    let draft = TaskDraft::new("Regar las plantas", CategoriaTarea::Otro);
    let task = service.create_task(owner, &draft).unwrap();
    service.delete_task(task.id, owner).unwrap();

    let replacement = service.create_task(owner, &draft).unwrap();
    assert_ne!(replacement.id, task.id);
}

#[test]
fn deleted_and_unknown_tasks_are_indistinguishable_on_mutation_paths() {
    let conn = open_db_in_memory().unwrap();
    let owner = create_user(&conn, "ana@example.com");
    let service = service(&conn);

    let task = service
        .create_task(owner, &TaskDraft::new("Ordenar garaje", CategoriaTarea::Limpieza))
        .unwrap();
    service.delete_task(task.id, owner).unwrap();

    let patch = TaskPatch {
        peso: Some(2.0),
        ..TaskPatch::default()
    };
    assert!(matches!(
        service.update_task(task.id, owner, &patch).unwrap_err(),
        TaskServiceError::NotFound(_)
    ));
    assert!(matches!(
        service.delete_task(task.id, owner).unwrap_err(),
        TaskServiceError::NotFound(_)
    ));
    assert!(matches!(
        service
            .update_task(Uuid::new_v4(), owner, &patch)
            .unwrap_err(),
        TaskServiceError::NotFound(_)
    ));
}

#[test]
fn get_distinguishes_foreign_tasks_from_missing_ones() {
    let conn = open_db_in_memory().unwrap();
    let owner = create_user(&conn, "ana@example.com");
    let intruder = create_user(&conn, "ben@example.com");
    let service = service(&conn);

    let task = service
        .create_task(owner, &TaskDraft::new("Limpiar patio", CategoriaTarea::Limpieza))
        .unwrap();

    let detail = service.get_task(task.id, owner).unwrap();
    assert_eq!(detail.task.id, task.id);
    assert!(detail.etiquetas.is_empty());

    assert!(matches!(
        service.get_task(task.id, intruder).unwrap_err(),
        TaskServiceError::Forbidden(_)
    ));
    assert!(matches!(
        service.get_task(Uuid::new_v4(), owner).unwrap_err(),
        TaskServiceError::NotFound(_)
    ));

    // Once deleted, even the owner sees plain not-found.
    service.delete_task(task.id, owner).unwrap();
    assert!(matches!(
        service.get_task(task.id, owner).unwrap_err(),
        TaskServiceError::NotFound(_)
    ));
}

#[test]
fn foreign_owner_mutations_read_as_not_found() {
    let conn = open_db_in_memory().unwrap();
    let owner = create_user(&conn, "ana@example.com");
    let intruder = create_user(&conn, "ben@example.com");
    let service = service(&conn);

    let task = service
        .create_task(owner, &TaskDraft::new("Cambiar bombilla", CategoriaTarea::Mantenimiento))
        .unwrap();

    let patch = TaskPatch {
        titulo: Some("Cambiar dos bombillas".to_string()),
        ..TaskPatch::default()
    };
    assert!(matches!(
        service.update_task(task.id, intruder, &patch).unwrap_err(),
        TaskServiceError::NotFound(_)
    ));
    assert!(matches!(
        service.delete_task(task.id, intruder).unwrap_err(),
        TaskServiceError::NotFound(_)
    ));

    // The owner's task is untouched.
    let detail = service.get_task(task.id, owner).unwrap();
    assert_eq!(detail.task.titulo, "Cambiar bombilla");
}

#[test]
fn field_validation_rejects_bad_peso_and_blank_titulo() {
    let conn = open_db_in_memory().unwrap();
    let owner = create_user(&conn, "ana@example.com");
    let service = service(&conn);

    let mut draft = TaskDraft::new("Tarea pesada", CategoriaTarea::Otro);
    draft.peso = 0.0;
    assert!(matches!(
        service.create_task(owner, &draft).unwrap_err(),
        TaskServiceError::Validation(TaskValidationError::PesoOutOfRange(_))
    ));
    draft.peso = 100.0;
    assert!(matches!(
        service.create_task(owner, &draft).unwrap_err(),
        TaskServiceError::Validation(TaskValidationError::PesoOutOfRange(_))
    ));

    let blank = TaskDraft::new("   ", CategoriaTarea::Otro);
    assert!(matches!(
        service.create_task(owner, &blank).unwrap_err(),
        TaskServiceError::Validation(TaskValidationError::TituloBlank)
    ));
}

#[test]
fn past_due_dates_need_the_override_option() {
    let conn = open_db_in_memory().unwrap();
    let owner = create_user(&conn, "ana@example.com");

    let strict = service(&conn);
    let mut draft = TaskDraft::new("Pagar recibo", CategoriaTarea::Otro);
    draft.due_date = Some(1); // long past
    assert!(matches!(
        strict.create_task(owner, &draft).unwrap_err(),
        TaskServiceError::DueDateInPast(1)
    ));

    let permissive = TaskService::with_options(
        SqliteTaskRepository::try_new(&conn).unwrap(),
        SqliteHistoryRepository::new(&conn),
        TaskServiceOptions {
            allow_past_due_dates: true,
        },
    );
    let task = permissive.create_task(owner, &draft).unwrap();
    assert_eq!(task.due_date, Some(1));
}

#[test]
fn create_rejects_foreign_and_missing_rooms() {
    let conn = open_db_in_memory().unwrap();
    let owner = create_user(&conn, "ana@example.com");
    let other = create_user(&conn, "ben@example.com");
    let service = service(&conn);

    let rooms = SqliteRoomRepository::new(&conn);
    let foreign_room = rooms.create_room(other, "Casa", None).unwrap();

    let mut draft = TaskDraft::new("Tarea sin hogar", CategoriaTarea::Otro);
    draft.room_id = Some(foreign_room.id);
    assert!(matches!(
        service.create_task(owner, &draft).unwrap_err(),
        TaskServiceError::RoomNotFound(_)
    ));

    draft.room_id = Some(Uuid::new_v4());
    assert!(matches!(
        service.create_task(owner, &draft).unwrap_err(),
        TaskServiceError::RoomNotFound(_)
    ));
}

#[test]
fn deleted_tasks_disappear_from_listings() {
    let conn = open_db_in_memory().unwrap();
    let owner = create_user(&conn, "ana@example.com");
    let service = service(&conn);

    let keep = service
        .create_task(owner, &TaskDraft::new("Queda", CategoriaTarea::Otro))
        .unwrap();
    let gone = service
        .create_task(owner, &TaskDraft::new("Se va", CategoriaTarea::Otro))
        .unwrap();
    service.delete_task(gone.id, owner).unwrap();

    let listed = service.list_tasks(owner, &TaskListQuery::default()).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, keep.id);
}
