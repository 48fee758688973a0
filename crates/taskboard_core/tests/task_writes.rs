use rusqlite::Connection;
use taskboard_core::db::open_db_in_memory;
use taskboard_core::notify::NoopPublisher;
use taskboard_core::validation::ViolationCode;
use taskboard_core::{
    AssignmentRole, BoardService, Column, CreateTaskRequest, Lane, MoveTaskRequest,
    MutationOutcome, ProjectId, ProjectService, SqliteBoardStore, TaskItem, TaskListQuery,
    TaskService, User, UserService, WriteContext, WriteError,
};
use uuid::Uuid;

struct Board<'a> {
    ctx: WriteContext,
    project_id: ProjectId,
    lane: Lane,
    column: Column,
    users: UserService<SqliteBoardStore<'a>, NoopPublisher>,
    board: BoardService<SqliteBoardStore<'a>, NoopPublisher>,
    tasks: TaskService<SqliteBoardStore<'a>, NoopPublisher>,
}

impl Board<'_> {
    fn task(&self, title: &str) -> TaskItem {
        self.tasks
            .create_task(&self.ctx, &self.request(self.lane.id, self.column.id, title))
            .unwrap()
            .into_record()
            .unwrap()
    }

    fn request(&self, lane_id: Uuid, column_id: Uuid, title: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            project_id: self.project_id,
            lane_id,
            column_id,
            title: title.to_string(),
            description: None,
            sort_order: None,
        }
    }

    fn user(&self, email: &str) -> User {
        self.users
            .create_user(&self.ctx, email, "Helper")
            .unwrap()
            .into_record()
            .unwrap()
    }
}

fn board(conn: &Connection) -> Board<'_> {
    let store = SqliteBoardStore::try_new(conn).unwrap();
    let users = UserService::new(store, NoopPublisher);
    let owner = users
        .create_user(&WriteContext::new(Uuid::new_v4()), "owner@example.com", "Owner")
        .unwrap()
        .into_record()
        .unwrap();
    let ctx = WriteContext::new(owner.id);
    let project = ProjectService::new(store, NoopPublisher)
        .create_project(&ctx, "Board", None)
        .unwrap()
        .into_record()
        .unwrap();
    let board = BoardService::new(store, NoopPublisher);
    let lane = board
        .create_lane(&ctx, project.id, "Main", None)
        .unwrap()
        .into_record()
        .unwrap();
    let column = board
        .create_column(&ctx, project.id, "Todo", None, None)
        .unwrap()
        .into_record()
        .unwrap();
    Board {
        ctx,
        project_id: project.id,
        lane,
        column,
        users,
        board,
        tasks: TaskService::new(store, NoopPublisher),
    }
}

#[test]
fn tasks_append_within_their_cell() {
    let conn = open_db_in_memory().unwrap();
    let b = board(&conn);

    let first = b.task("first");
    let second = b.task("second");
    assert_eq!(first.sort_order, 0);
    assert_eq!(second.sort_order, 1);

    let listed = b
        .tasks
        .list_tasks(&TaskListQuery::for_project(b.project_id))
        .unwrap();
    let titles: Vec<_> = listed.iter().map(|task| task.title.as_str()).collect();
    assert_eq!(titles, vec!["first", "second"]);
}

#[test]
fn create_with_foreign_or_missing_cell_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let b = board(&conn);
    let other = ProjectService::new(SqliteBoardStore::try_new(&conn).unwrap(), NoopPublisher)
        .create_project(&b.ctx, "Other", None)
        .unwrap()
        .into_record()
        .unwrap();
    let foreign_lane = b
        .board
        .create_lane(&b.ctx, other.id, "Elsewhere", None)
        .unwrap()
        .into_record()
        .unwrap();

    let foreign = b
        .tasks
        .create_task(&b.ctx, &b.request(foreign_lane.id, b.column.id, "x"))
        .unwrap();
    assert_eq!(foreign.outcome(), MutationOutcome::NotFound);

    let missing = b
        .tasks
        .create_task(&b.ctx, &b.request(b.lane.id, Uuid::new_v4(), "x"))
        .unwrap();
    assert_eq!(missing.outcome(), MutationOutcome::NotFound);
    assert!(b
        .tasks
        .list_tasks(&TaskListQuery::for_project(b.project_id))
        .unwrap()
        .is_empty());
}

#[test]
fn blank_title_is_rejected_before_storage() {
    let conn = open_db_in_memory().unwrap();
    let b = board(&conn);

    let err = b
        .tasks
        .create_task(&b.ctx, &b.request(b.lane.id, b.column.id, "   "))
        .unwrap_err();
    assert!(matches!(err, WriteError::Validation(ref e) if e.has("title", ViolationCode::Required)));
}

#[test]
fn description_is_set_and_cleared() {
    let conn = open_db_in_memory().unwrap();
    let b = board(&conn);
    let task = b.task("task");

    let set = b
        .tasks
        .update_task_description(&b.ctx, task.id, Some(&task.version), Some(" details "))
        .unwrap();
    assert_eq!(set.outcome(), MutationOutcome::Updated);
    assert_eq!(set.record().unwrap().description.as_deref(), Some("details"));

    let cleared = b
        .tasks
        .update_task_description(&b.ctx, task.id, set.version(), Some(""))
        .unwrap();
    assert_eq!(cleared.outcome(), MutationOutcome::Updated);
    assert_eq!(b.tasks.get_task(task.id).unwrap().unwrap().description, None);
}

#[test]
fn move_to_other_cell_appends_and_same_place_is_noop() {
    let conn = open_db_in_memory().unwrap();
    let b = board(&conn);
    let done = b
        .board
        .create_column(&b.ctx, b.project_id, "Done", None, None)
        .unwrap()
        .into_record()
        .unwrap();
    let resident = b
        .tasks
        .create_task(&b.ctx, &b.request(b.lane.id, done.id, "already done"))
        .unwrap()
        .into_record()
        .unwrap();
    assert_eq!(resident.sort_order, 0);
    let task = b.task("moving");

    let target = MoveTaskRequest {
        lane_id: b.lane.id,
        column_id: done.id,
        sort_order: None,
    };
    let moved = b
        .tasks
        .move_task(&b.ctx, task.id, Some(&task.version), &target)
        .unwrap();
    assert_eq!(moved.outcome(), MutationOutcome::Updated);
    let after = moved.record().unwrap();
    assert_eq!(after.column_id, done.id);
    assert_eq!(after.sort_order, 1);

    let again = b
        .tasks
        .move_task(&b.ctx, task.id, moved.version(), &target)
        .unwrap();
    assert_eq!(again.outcome(), MutationOutcome::NoOp);
}

#[test]
fn move_within_cell_keeps_order_unless_given() {
    let conn = open_db_in_memory().unwrap();
    let b = board(&conn);
    let task = b.task("only");

    let stay = MoveTaskRequest {
        lane_id: b.lane.id,
        column_id: b.column.id,
        sort_order: None,
    };
    let result = b
        .tasks
        .move_task(&b.ctx, task.id, Some(&task.version), &stay)
        .unwrap();
    assert_eq!(result.outcome(), MutationOutcome::NoOp);

    let reorder = MoveTaskRequest {
        sort_order: Some(7),
        ..stay
    };
    let result = b
        .tasks
        .move_task(&b.ctx, task.id, Some(&task.version), &reorder)
        .unwrap();
    assert_eq!(result.outcome(), MutationOutcome::Updated);
    assert_eq!(result.record().unwrap().sort_order, 7);
}

#[test]
fn move_checks_precondition_then_target() {
    let conn = open_db_in_memory().unwrap();
    let b = board(&conn);
    let task = b.task("task");
    let nowhere = MoveTaskRequest {
        lane_id: Uuid::new_v4(),
        column_id: b.column.id,
        sort_order: None,
    };

    let err = b.tasks.move_task(&b.ctx, task.id, None, &nowhere).unwrap_err();
    assert!(matches!(err, WriteError::PreconditionMissing(_)));

    let missing_target = b
        .tasks
        .move_task(&b.ctx, task.id, Some(&task.version), &nowhere)
        .unwrap();
    assert_eq!(missing_target.outcome(), MutationOutcome::NotFound);

    let missing_task = b
        .tasks
        .move_task(&b.ctx, Uuid::new_v4(), Some(&task.version), &nowhere)
        .unwrap();
    assert_eq!(missing_task.outcome(), MutationOutcome::NotFound);
}

#[test]
fn notes_are_authored_edited_and_deleted() {
    let conn = open_db_in_memory().unwrap();
    let b = board(&conn);
    let task = b.task("task");

    let note = b
        .tasks
        .add_note(&b.ctx, task.id, "  looks good  ")
        .unwrap()
        .into_record()
        .unwrap();
    assert_eq!(note.body, "looks good");
    assert_eq!(note.author_id, b.ctx.actor_id);
    assert_eq!(note.project_id, b.project_id);

    let unchanged = b
        .tasks
        .edit_note(&b.ctx, note.id, Some(&note.version), "looks good")
        .unwrap();
    assert_eq!(unchanged.outcome(), MutationOutcome::NoOp);

    let edited = b
        .tasks
        .edit_note(&b.ctx, note.id, Some(&note.version), "ship it")
        .unwrap();
    assert_eq!(edited.outcome(), MutationOutcome::Updated);

    let stale = b
        .tasks
        .delete_note(&b.ctx, note.id, Some(&note.version))
        .unwrap();
    assert_eq!(stale.outcome(), MutationOutcome::Conflict);
    assert_eq!(stale.current_version(), edited.version());

    let deleted = b
        .tasks
        .delete_note(&b.ctx, note.id, edited.version())
        .unwrap();
    assert_eq!(deleted.outcome(), MutationOutcome::Deleted);
    assert!(b.tasks.list_notes(task.id).unwrap().is_empty());
}

#[test]
fn note_on_missing_task_or_by_unknown_actor_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let b = board(&conn);
    let task = b.task("task");

    let missing_task = b.tasks.add_note(&b.ctx, Uuid::new_v4(), "hello").unwrap();
    assert_eq!(missing_task.outcome(), MutationOutcome::NotFound);

    let ghost = WriteContext::new(Uuid::new_v4());
    let ghost_note = b.tasks.add_note(&ghost, task.id, "hello").unwrap();
    assert_eq!(ghost_note.outcome(), MutationOutcome::NotFound);
}

#[test]
fn assignments_are_unique_per_user_and_task() {
    let conn = open_db_in_memory().unwrap();
    let b = board(&conn);
    let task = b.task("task");
    let helper = b.user("helper@example.com");

    let assigned = b
        .tasks
        .assign_user(&b.ctx, task.id, helper.id, "Contributor")
        .unwrap();
    assert_eq!(assigned.outcome(), MutationOutcome::Created);
    let assignment = assigned.into_record().unwrap();
    assert_eq!(assignment.role, AssignmentRole::Contributor);

    let duplicate = b
        .tasks
        .assign_user(&b.ctx, task.id, helper.id, "reviewer")
        .unwrap();
    assert_eq!(duplicate.outcome(), MutationOutcome::Conflict);
    assert_eq!(b.tasks.list_assignments(task.id).unwrap().len(), 1);

    let err = b
        .tasks
        .assign_user(&b.ctx, task.id, helper.id, "boss")
        .unwrap_err();
    assert!(matches!(err, WriteError::Validation(ref e) if e.has("role", ViolationCode::UnknownValue)));

    let changed = b
        .tasks
        .change_assignment_role(&b.ctx, assignment.id, Some(&assignment.version), "reviewer")
        .unwrap();
    assert_eq!(changed.outcome(), MutationOutcome::Updated);

    let removed = b
        .tasks
        .remove_assignment(&b.ctx, assignment.id, changed.version())
        .unwrap();
    assert_eq!(removed.outcome(), MutationOutcome::Deleted);

    let reassigned = b
        .tasks
        .assign_user(&b.ctx, task.id, helper.id, "owner")
        .unwrap();
    assert_eq!(reassigned.outcome(), MutationOutcome::Created);
}

#[test]
fn assigning_unknown_user_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let b = board(&conn);
    let task = b.task("task");

    let result = b
        .tasks
        .assign_user(&b.ctx, task.id, Uuid::new_v4(), "owner")
        .unwrap();
    assert_eq!(result.outcome(), MutationOutcome::NotFound);
}

#[test]
fn deleting_task_removes_notes_and_assignments() {
    let conn = open_db_in_memory().unwrap();
    let b = board(&conn);
    let task = b.task("task");
    let helper = b.user("helper@example.com");
    b.tasks.add_note(&b.ctx, task.id, "note").unwrap();
    b.tasks
        .assign_user(&b.ctx, task.id, helper.id, "owner")
        .unwrap();

    let deleted = b
        .tasks
        .delete_task(&b.ctx, task.id, Some(&task.version))
        .unwrap();
    assert_eq!(deleted.outcome(), MutationOutcome::Deleted);
    assert!(b.tasks.list_notes(task.id).unwrap().is_empty());
    assert!(b.tasks.list_assignments(task.id).unwrap().is_empty());
}

#[test]
fn list_filters_by_lane_and_column() {
    let conn = open_db_in_memory().unwrap();
    let b = board(&conn);
    let second_lane = b
        .board
        .create_lane(&b.ctx, b.project_id, "Second", None)
        .unwrap()
        .into_record()
        .unwrap();
    b.task("main lane");
    b.tasks
        .create_task(&b.ctx, &b.request(second_lane.id, b.column.id, "second lane"))
        .unwrap();

    let query = TaskListQuery {
        lane_id: Some(second_lane.id),
        ..TaskListQuery::for_project(b.project_id)
    };
    let listed = b.tasks.list_tasks(&query).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "second lane");

    let by_column = TaskListQuery {
        column_id: Some(b.column.id),
        ..TaskListQuery::for_project(b.project_id)
    };
    assert_eq!(b.tasks.list_tasks(&by_column).unwrap().len(), 2);
}
