use prioritask_core::db::open_db_in_memory;
use prioritask_core::{
    CategoriaTarea, SqliteHistoryRepository, SqliteTagRepository, SqliteTaskRepository,
    SqliteUserRepository, TagRepoError, TagService, TaskDraft, TaskService, UserId, UserRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn create_user(conn: &Connection, email: &str) -> UserId {
    SqliteUserRepository::new(conn)
        .create_user(email)
        .unwrap()
        .id
}

fn tag_service(conn: &Connection) -> TagService<SqliteTagRepository<'_>> {
    TagService::new(SqliteTagRepository::try_new(conn).unwrap())
}

fn task_service(
    conn: &Connection,
) -> TaskService<SqliteTaskRepository<'_>, SqliteHistoryRepository<'_>> {
    TaskService::new(
        SqliteTaskRepository::try_new(conn).unwrap(),
        SqliteHistoryRepository::new(conn),
    )
}

#[test]
fn tag_names_are_unique_per_owner_only() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let ben = create_user(&conn, "ben@example.com");
    let tags = tag_service(&conn);

    tags.create_tag(ana, "urgente").unwrap();
    let err = tags.create_tag(ana, "urgente").unwrap_err();
    assert!(matches!(err, TagRepoError::NombreConflict { .. }));

    // Same nombre under another owner is fine.
    tags.create_tag(ben, "urgente").unwrap();
}

#[test]
fn rename_checks_ownership_and_uniqueness() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let ben = create_user(&conn, "ben@example.com");
    let tags = tag_service(&conn);

    let urgente = tags.create_tag(ana, "urgente").unwrap();
    tags.create_tag(ana, "casa").unwrap();

    assert!(matches!(
        tags.rename_tag(urgente.id, ben, "robada").unwrap_err(),
        TagRepoError::TagNotFound(_)
    ));
    assert!(matches!(
        tags.rename_tag(urgente.id, ana, "casa").unwrap_err(),
        TagRepoError::NombreConflict { .. }
    ));

    let renamed = tags.rename_tag(urgente.id, ana, "muy urgente").unwrap();
    assert_eq!(renamed.nombre, "muy urgente");
}

#[test]
fn assigning_tags_is_idempotent_and_validates_every_reference() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let ben = create_user(&conn, "ben@example.com");
    let tags = tag_service(&conn);
    let tasks = task_service(&conn);

    let task = tasks
        .create_task(ana, &TaskDraft::new("Comprar leche", CategoriaTarea::Compra))
        .unwrap();
    let errands = tags.create_tag(ana, "recados").unwrap();
    let foreign = tags.create_tag(ben, "ajena").unwrap();

    tags.assign_tags(task.id, &[errands.id], ana).unwrap();
    // Repeating the link is a silent skip, not an error.
    tags.assign_tags(task.id, &[errands.id], ana).unwrap();
    assert_eq!(tags.tags_for_task(task.id).unwrap().len(), 1);

    assert!(matches!(
        tags.assign_tags(task.id, &[foreign.id], ana).unwrap_err(),
        TagRepoError::TagNotFound(_)
    ));
    assert!(matches!(
        tags.assign_tags(Uuid::new_v4(), &[errands.id], ana).unwrap_err(),
        TagRepoError::TaskNotFound(_)
    ));
    assert!(matches!(
        tags.assign_tags(task.id, &[errands.id], ben).unwrap_err(),
        TagRepoError::TaskNotFound(_)
    ));
}

#[test]
fn a_bad_tag_in_the_batch_assigns_nothing() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let tags = tag_service(&conn);
    let tasks = task_service(&conn);

    let task = tasks
        .create_task(ana, &TaskDraft::new("Ordenar", CategoriaTarea::Limpieza))
        .unwrap();
    let valid = tags.create_tag(ana, "valida").unwrap();

    let err = tags
        .assign_tags(task.id, &[valid.id, Uuid::new_v4()], ana)
        .unwrap_err();
    assert!(matches!(err, TagRepoError::TagNotFound(_)));
    assert!(tags.tags_for_task(task.id).unwrap().is_empty());
}

#[test]
fn unassign_reports_each_missing_stage_distinctly() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let tags = tag_service(&conn);
    let tasks = task_service(&conn);

    let task = tasks
        .create_task(ana, &TaskDraft::new("Barrer", CategoriaTarea::Limpieza))
        .unwrap();
    let casa = tags.create_tag(ana, "casa").unwrap();

    assert!(matches!(
        tags.unassign_tag(Uuid::new_v4(), casa.id, ana).unwrap_err(),
        TagRepoError::TaskNotFound(_)
    ));
    assert!(matches!(
        tags.unassign_tag(task.id, Uuid::new_v4(), ana).unwrap_err(),
        TagRepoError::TagNotFound(_)
    ));
    assert!(matches!(
        tags.unassign_tag(task.id, casa.id, ana).unwrap_err(),
        TagRepoError::LinkNotFound { .. }
    ));

    tags.assign_tags(task.id, &[casa.id], ana).unwrap();
    tags.unassign_tag(task.id, casa.id, ana).unwrap();
    assert!(tags.tags_for_task(task.id).unwrap().is_empty());
}

#[test]
fn deleting_a_tag_cascades_all_links_atomically() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let tags = tag_service(&conn);
    let tasks = task_service(&conn);

    let first = tasks
        .create_task(ana, &TaskDraft::new("Primera", CategoriaTarea::Otro))
        .unwrap();
    let second = tasks
        .create_task(ana, &TaskDraft::new("Segunda", CategoriaTarea::Otro))
        .unwrap();
    let shared = tags.create_tag(ana, "compartida").unwrap();
    tags.assign_tags(first.id, &[shared.id], ana).unwrap();
    tags.assign_tags(second.id, &[shared.id], ana).unwrap();

    tags.delete_tag(shared.id, ana).unwrap();

    assert!(tags.tags_for_task(first.id).unwrap().is_empty());
    assert!(tags.tags_for_task(second.id).unwrap().is_empty());
    assert!(tags.list_tags(ana).unwrap().is_empty());

    let orphan_links: i64 = conn
        .query_row("SELECT COUNT(*) FROM task_tags;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(orphan_links, 0);
}

#[test]
fn task_detail_reflects_tag_lifecycle_end_to_end() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let tags = tag_service(&conn);
    let tasks = task_service(&conn);

    let task = tasks
        .create_task(ana, &TaskDraft::new("Buy milk", CategoriaTarea::Otro))
        .unwrap();
    let errands = tags.create_tag(ana, "errands").unwrap();
    tags.assign_tags(task.id, &[errands.id], ana).unwrap();

    let detail = tasks.get_task(task.id, ana).unwrap();
    assert_eq!(detail.etiquetas.len(), 1);
    assert_eq!(detail.etiquetas[0].nombre, "errands");

    tags.delete_tag(errands.id, ana).unwrap();
    let detail = tasks.get_task(task.id, ana).unwrap();
    assert!(detail.etiquetas.is_empty());
}

#[test]
fn blank_tag_names_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let tags = tag_service(&conn);

    assert!(matches!(
        tags.create_tag(ana, "   ").unwrap_err(),
        TagRepoError::NombreBlank
    ));
}
