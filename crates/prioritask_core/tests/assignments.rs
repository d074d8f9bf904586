use prioritask_core::db::open_db_in_memory;
use prioritask_core::{
    AssignmentService, AssignmentServiceError, CategoriaTarea, SqliteAssignmentRepository,
    SqliteHistoryRepository, SqliteTaskRepository, SqliteUserRepository, Task, TaskDraft,
    TaskService, UserId, UserRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn create_user(conn: &Connection, email: &str) -> UserId {
    SqliteUserRepository::new(conn)
        .create_user(email)
        .unwrap()
        .id
}

fn assignment_service(conn: &Connection) -> AssignmentService<SqliteAssignmentRepository<'_>> {
    AssignmentService::new(SqliteAssignmentRepository::new(conn))
}

fn create_task(conn: &Connection, owner: UserId, titulo: &str) -> Task {
    TaskService::new(
        SqliteTaskRepository::try_new(conn).unwrap(),
        SqliteHistoryRepository::new(conn),
    )
    .create_task(owner, &TaskDraft::new(titulo, CategoriaTarea::Otro))
    .unwrap()
}

#[test]
fn assigning_records_assignee_assigner_and_timestamp() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let ben = create_user(&conn, "ben@example.com");
    let task = create_task(&conn, ana, "Preparar cena");
    let assignments = assignment_service(&conn);

    let assignment = assignments.assign(task.id, ben, ana).unwrap();
    assert_eq!(assignment.task_id, task.id);
    assert_eq!(assignment.user_id, ben);
    assert_eq!(assignment.asignado_por, ana);
    assert!(assignment.fecha > 0);
}

#[test]
fn self_assignment_is_always_rejected() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let task = create_task(&conn, ana, "Preparar cena");
    let assignments = assignment_service(&conn);

    assert!(matches!(
        assignments.assign(task.id, ana, ana).unwrap_err(),
        AssignmentServiceError::SelfAssignment(_)
    ));
}

#[test]
fn the_second_identical_assignment_is_a_conflict() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let ben = create_user(&conn, "ben@example.com");
    let task = create_task(&conn, ana, "Preparar cena");
    let assignments = assignment_service(&conn);

    assignments.assign(task.id, ben, ana).unwrap();
    assert!(matches!(
        assignments.assign(task.id, ben, ana).unwrap_err(),
        AssignmentServiceError::Duplicate { .. }
    ));
}

#[test]
fn both_assignment_endpoints_must_exist() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let ben = create_user(&conn, "ben@example.com");
    let task = create_task(&conn, ana, "Preparar cena");
    let assignments = assignment_service(&conn);

    assert!(matches!(
        assignments.assign(Uuid::new_v4(), ben, ana).unwrap_err(),
        AssignmentServiceError::TaskNotFound(_)
    ));
    assert!(matches!(
        assignments.assign(task.id, Uuid::new_v4(), ana).unwrap_err(),
        AssignmentServiceError::UserNotFound(_)
    ));
}

#[test]
fn listings_keep_insertion_order_per_assignee() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let ben = create_user(&conn, "ben@example.com");
    let assignments = assignment_service(&conn);

    let first = create_task(&conn, ana, "Primera");
    let second = create_task(&conn, ana, "Segunda");
    let third = create_task(&conn, ana, "Tercera");
    for task in [&first, &second, &third] {
        assignments.assign(task.id, ben, ana).unwrap();
    }

    let listed = assignments.list_for_user(ben).unwrap();
    let task_ids: Vec<_> = listed.iter().map(|assignment| assignment.task_id).collect();
    assert_eq!(task_ids, vec![first.id, second.id, third.id]);

    assert!(assignments.list_for_user(ana).unwrap().is_empty());
}

#[test]
fn removal_deletes_the_pair_and_reports_missing_ones() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let ben = create_user(&conn, "ben@example.com");
    let task = create_task(&conn, ana, "Preparar cena");
    let assignments = assignment_service(&conn);

    assignments.assign(task.id, ben, ana).unwrap();
    assignments.remove(task.id, ben).unwrap();
    assert!(assignments.list_for_user(ben).unwrap().is_empty());

    assert!(matches!(
        assignments.remove(task.id, ben).unwrap_err(),
        AssignmentServiceError::NotFound { .. }
    ));

    // Removal frees the pair for re-assignment.
    assignments.assign(task.id, ben, ana).unwrap();
}

#[test]
fn soft_deleted_tasks_cannot_be_assigned() {
    let conn = open_db_in_memory().unwrap();
    let ana = create_user(&conn, "ana@example.com");
    let ben = create_user(&conn, "ben@example.com");
    let task = create_task(&conn, ana, "Preparar cena");

    TaskService::new(
        SqliteTaskRepository::try_new(&conn).unwrap(),
        SqliteHistoryRepository::new(&conn),
    )
    .delete_task(task.id, ana)
    .unwrap();

    let assignments = assignment_service(&conn);
    assert!(matches!(
        assignments.assign(task.id, ben, ana).unwrap_err(),
        AssignmentServiceError::TaskNotFound(_)
    ));
}
