use rusqlite::Connection;
use std::sync::mpsc;
use taskboard_core::db::open_db_in_memory;
use taskboard_core::notify::{ChannelPublisher, InMemoryPublisher};
use taskboard_core::{
    BoardService, CreateTaskRequest, DomainEvent, EventPayload, EventPublisher, MutationOutcome,
    Project, ProjectService, PublishError, SqliteActivityLog, SqliteBoardStore, TaskItem,
    TaskService, UserService, WriteContext,
};
use uuid::Uuid;

/// Publisher whose sink is always down.
struct BrokenSink;

impl EventPublisher for BrokenSink {
    fn publish(&self, _event: &DomainEvent) -> Result<(), PublishError> {
        Err(PublishError::Rejected("sink offline".to_string()))
    }
}

fn actor<P: EventPublisher>(conn: &Connection, publisher: P) -> WriteContext {
    let user = UserService::new(SqliteBoardStore::try_new(conn).unwrap(), publisher)
        .create_user(&WriteContext::new(Uuid::new_v4()), "ada@example.com", "Ada")
        .unwrap()
        .into_record()
        .unwrap();
    WriteContext::new(user.id).with_request_id("req-7")
}

fn seed_board<P: EventPublisher + Copy>(
    conn: &Connection,
    ctx: &WriteContext,
    publisher: P,
) -> (Project, TaskItem) {
    let store = SqliteBoardStore::try_new(conn).unwrap();
    let project = ProjectService::new(store, publisher)
        .create_project(ctx, "Events", None)
        .unwrap()
        .into_record()
        .unwrap();
    let board = BoardService::new(store, publisher);
    let lane = board
        .create_lane(ctx, project.id, "Lane", None)
        .unwrap()
        .into_record()
        .unwrap();
    let column = board
        .create_column(ctx, project.id, "Column", None, None)
        .unwrap()
        .into_record()
        .unwrap();
    let task = TaskService::new(store, publisher)
        .create_task(
            ctx,
            &CreateTaskRequest {
                project_id: project.id,
                lane_id: lane.id,
                column_id: column.id,
                title: "Task".to_string(),
                description: None,
                sort_order: None,
            },
        )
        .unwrap()
        .into_record()
        .unwrap();
    (project, task)
}

#[test]
fn applied_writes_publish_in_commit_order() {
    let conn = open_db_in_memory().unwrap();
    let events = InMemoryPublisher::new();
    let ctx = actor(&conn, &events);
    let (project, _) = seed_board(&conn, &ctx, &events);

    assert_eq!(
        events.kinds(),
        vec![
            "user_created",
            "project_created",
            "member_added",
            "lane_created",
            "column_created",
            "task_created",
        ]
    );
    let recorded = events.events();
    assert_eq!(recorded[0].project_id, None);
    assert!(recorded[1..]
        .iter()
        .all(|event| event.project_id == Some(project.id)));
    assert!(recorded[1..]
        .iter()
        .all(|event| event.actor_id == ctx.actor_id && event.request_id.as_deref() == Some("req-7")));
}

#[test]
fn noop_conflict_and_not_found_publish_nothing() {
    let conn = open_db_in_memory().unwrap();
    let events = InMemoryPublisher::new();
    let ctx = actor(&conn, &events);
    let (_, task) = seed_board(&conn, &ctx, &events);
    let tasks = TaskService::new(SqliteBoardStore::try_new(&conn).unwrap(), &events);
    let before = events.events().len();

    let renamed = tasks
        .rename_task(&ctx, task.id, Some(&task.version), "Renamed")
        .unwrap();
    assert_eq!(renamed.outcome(), MutationOutcome::Updated);
    let noop = tasks
        .rename_task(&ctx, task.id, renamed.version(), "Renamed")
        .unwrap();
    assert_eq!(noop.outcome(), MutationOutcome::NoOp);
    let conflict = tasks
        .rename_task(&ctx, task.id, Some(&task.version), "Other")
        .unwrap();
    assert_eq!(conflict.outcome(), MutationOutcome::Conflict);
    let missing = tasks
        .rename_task(&ctx, Uuid::new_v4(), Some(&task.version), "Other")
        .unwrap();
    assert_eq!(missing.outcome(), MutationOutcome::NotFound);

    let published = events.events();
    assert_eq!(published.len(), before + 1);
    assert_eq!(
        published.last().map(|event| &event.payload),
        Some(&EventPayload::TaskUpdated { task_id: task.id })
    );
}

#[test]
fn publish_failure_does_not_fail_the_write() {
    let conn = open_db_in_memory().unwrap();
    let ctx = actor(&conn, BrokenSink);
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let projects = ProjectService::new(store, BrokenSink);

    let created = projects.create_project(&ctx, "Still saved", None).unwrap();
    assert_eq!(created.outcome(), MutationOutcome::Created);
    let project = created.into_record().unwrap();
    assert!(projects.get_project(project.id).unwrap().is_some());
}

#[test]
fn activity_log_records_project_events_newest_first() {
    let conn = open_db_in_memory().unwrap();
    let activity = SqliteActivityLog::try_new(&conn).unwrap();
    let ctx = actor(&conn, activity);
    let (project, task) = seed_board(&conn, &ctx, activity);
    TaskService::new(SqliteBoardStore::try_new(&conn).unwrap(), activity)
        .delete_task(&ctx, task.id, Some(&task.version))
        .unwrap();

    let entries = activity.list_activity(project.id, None).unwrap();
    let kinds: Vec<_> = entries.iter().map(|entry| entry.event_kind.as_str()).collect();
    assert_eq!(
        kinds,
        vec![
            "task_deleted",
            "task_created",
            "column_created",
            "lane_created",
            "member_added",
            "project_created",
        ]
    );
    assert_eq!(entries[0].payload, EventPayload::TaskDeleted { task_id: task.id });
    assert!(entries.iter().all(|entry| entry.actor_id == ctx.actor_id));

    let limited = activity.list_activity(project.id, Some(2)).unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].id, entries[0].id);
}

#[test]
fn fan_out_reaches_every_sink() {
    let conn = open_db_in_memory().unwrap();
    let activity = SqliteActivityLog::try_new(&conn).unwrap();
    let (sender, receiver) = mpsc::channel();
    let fan_out = (activity, ChannelPublisher::new(sender));
    let ctx = actor(&conn, &fan_out);

    let project = ProjectService::new(SqliteBoardStore::try_new(&conn).unwrap(), &fan_out)
        .create_project(&ctx, "Fan out", None)
        .unwrap()
        .into_record()
        .unwrap();

    let streamed: Vec<_> = receiver.try_iter().map(|event| event.kind()).collect();
    assert_eq!(streamed, vec!["user_created", "project_created", "member_added"]);
    assert_eq!(activity.list_activity(project.id, None).unwrap().len(), 2);
}

#[test]
fn closed_channel_is_reported_to_caller_of_publish() {
    let (sender, receiver) = mpsc::channel();
    drop(receiver);
    let publisher = ChannelPublisher::new(sender);
    let event = DomainEvent::new(
        &WriteContext::new(Uuid::new_v4()),
        None,
        EventPayload::UserRenamed {
            user_id: Uuid::new_v4(),
            display_name: "x".to_string(),
        },
    );

    assert!(matches!(
        publisher.publish(&event),
        Err(PublishError::ChannelClosed)
    ));
}
