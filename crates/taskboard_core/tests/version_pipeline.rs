use rusqlite::Connection;
use std::sync::{Arc, Barrier};
use std::thread;
use taskboard_core::db::{open_db, open_db_in_memory};
use taskboard_core::model::mutation::MutationKind;
use taskboard_core::notify::NoopPublisher;
use taskboard_core::repo::SaveOutcome;
use taskboard_core::service::pipeline::{execute_update, Change};
use taskboard_core::{
    BoardService, CancellationSignal, CreateTaskRequest, MutationOutcome, ProjectService,
    RecordGateway, RepoResult, SqliteBoardStore, TaskId, TaskItem, TaskService, UserService,
    VersionToken, WriteContext, WriteError,
};

struct Seed {
    ctx: WriteContext,
    task: TaskItem,
}

fn seed_task(conn: &Connection) -> Seed {
    let store = SqliteBoardStore::try_new(conn).unwrap();
    let users = UserService::new(store, NoopPublisher);
    let user = users
        .create_user(
            &WriteContext::new(uuid::Uuid::new_v4()),
            "ada@example.com",
            "Ada",
        )
        .unwrap()
        .into_record()
        .unwrap();
    let ctx = WriteContext::new(user.id);

    let project = ProjectService::new(store, NoopPublisher)
        .create_project(&ctx, "Launch", None)
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
    let task = TaskService::new(store, NoopPublisher)
        .create_task(
            &ctx,
            &CreateTaskRequest {
                project_id: project.id,
                lane_id: lane.id,
                column_id: column.id,
                title: "Draft".to_string(),
                description: None,
                sort_order: None,
            },
        )
        .unwrap()
        .into_record()
        .unwrap();
    Seed { ctx, task }
}

fn tasks(conn: &Connection) -> TaskService<SqliteBoardStore<'_>, NoopPublisher> {
    TaskService::new(SqliteBoardStore::try_new(conn).unwrap(), NoopPublisher)
}

#[test]
fn scenario_create_rename_stale_noop_delete_delete() {
    let conn = open_db_in_memory().unwrap();
    let Seed { ctx, task } = seed_task(&conn);
    let service = tasks(&conn);
    let v1 = task.version.clone();
    assert!(!v1.is_empty());

    let renamed = service
        .rename_task(&ctx, task.id, Some(&v1), "Final")
        .unwrap();
    assert_eq!(renamed.outcome(), MutationOutcome::Updated);
    let v2 = renamed.version().cloned().unwrap();
    assert_ne!(v1, v2);

    let stale = service
        .rename_task(&ctx, task.id, Some(&v1), "Other")
        .unwrap();
    assert_eq!(stale.outcome(), MutationOutcome::Conflict);
    assert_eq!(stale.current_version(), Some(&v2));
    assert!(stale.version().is_none());

    let same = service
        .rename_task(&ctx, task.id, Some(&v2), "Final")
        .unwrap();
    assert_eq!(same.outcome(), MutationOutcome::NoOp);
    assert!(same.version().is_none());

    let deleted = service.delete_task(&ctx, task.id, Some(&v2)).unwrap();
    assert_eq!(deleted.outcome(), MutationOutcome::Deleted);
    assert!(deleted.version().is_some());

    let again = service
        .delete_task(&ctx, task.id, Some(&VersionToken::initial()))
        .unwrap();
    assert_eq!(again.outcome(), MutationOutcome::NoOp);
    assert!(service.get_task(task.id).unwrap().is_none());
}

#[test]
fn identical_rename_is_updated_then_noop_and_leaves_version_alone() {
    let conn = open_db_in_memory().unwrap();
    let Seed { ctx, task } = seed_task(&conn);
    let service = tasks(&conn);

    let first = service
        .rename_task(&ctx, task.id, Some(&task.version), "Same")
        .unwrap();
    assert_eq!(first.outcome(), MutationOutcome::Updated);
    let fresh = first.version().cloned().unwrap();

    let second = service
        .rename_task(&ctx, task.id, Some(&fresh), "Same")
        .unwrap();
    assert_eq!(second.outcome(), MutationOutcome::NoOp);

    let stored = service.get_task(task.id).unwrap().unwrap();
    assert_eq!(stored.title, "Same");
    assert_eq!(stored.version, fresh);
}

#[test]
fn stale_token_with_noop_change_is_conflict() {
    let conn = open_db_in_memory().unwrap();
    let Seed { ctx, task } = seed_task(&conn);
    let service = tasks(&conn);
    let v0 = task.version.clone();

    let v1 = service
        .rename_task(&ctx, task.id, Some(&v0), "Renamed")
        .unwrap()
        .version()
        .cloned()
        .unwrap();

    let stale = service
        .rename_task(&ctx, task.id, Some(&v0), "Renamed")
        .unwrap();
    assert_eq!(stale.outcome(), MutationOutcome::Conflict);
    assert_eq!(stale.current_version(), Some(&v1));
}

#[test]
fn delete_of_absent_record_is_noop() {
    let conn = open_db_in_memory().unwrap();
    let Seed { ctx, .. } = seed_task(&conn);
    let service = tasks(&conn);

    let result = service
        .delete_task(&ctx, uuid::Uuid::new_v4(), Some(&VersionToken::initial()))
        .unwrap();
    assert_eq!(result.outcome(), MutationOutcome::NoOp);
}

#[test]
fn update_of_absent_record_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let Seed { ctx, .. } = seed_task(&conn);
    let service = tasks(&conn);

    let result = service
        .rename_task(&ctx, uuid::Uuid::new_v4(), Some(&VersionToken::initial()), "x")
        .unwrap();
    assert_eq!(result.outcome(), MutationOutcome::NotFound);
}

#[test]
fn issued_token_is_accepted_by_the_next_write() {
    let conn = open_db_in_memory().unwrap();
    let Seed { ctx, task } = seed_task(&conn);
    let service = tasks(&conn);

    let mut token = task.version.clone();
    for title in ["One", "Two", "Three"] {
        let result = service
            .rename_task(&ctx, task.id, Some(&token), title)
            .unwrap();
        assert_eq!(result.outcome(), MutationOutcome::Updated);
        token = result.version().cloned().unwrap();
    }
    let deleted = service.delete_task(&ctx, task.id, Some(&token)).unwrap();
    assert_eq!(deleted.outcome(), MutationOutcome::Deleted);
}

#[test]
fn missing_or_empty_token_fails_before_load() {
    let conn = open_db_in_memory().unwrap();
    let Seed { ctx, task } = seed_task(&conn);
    let service = tasks(&conn);

    let missing = service.rename_task(&ctx, task.id, None, "New").unwrap_err();
    assert!(matches!(missing, WriteError::PreconditionMissing(p) if p.kind == MutationKind::Update));

    let empty = service
        .delete_task(&ctx, task.id, Some(&VersionToken::empty()))
        .unwrap_err();
    assert!(matches!(empty, WriteError::PreconditionMissing(p) if p.kind == MutationKind::Delete));

    let stored = service.get_task(task.id).unwrap().unwrap();
    assert_eq!(stored.title, "Draft");
}

#[test]
fn conditional_save_rejects_second_writer_on_same_version() {
    let conn = open_db_in_memory().unwrap();
    let Seed { task, .. } = seed_task(&conn);
    let store = SqliteBoardStore::try_new(&conn).unwrap();
    let cancel = CancellationSignal::new();
    let v1 = task.version.clone();

    let mut writer_a = task.clone();
    writer_a.title = "From A".to_string();
    let mut writer_b = task.clone();
    writer_b.title = "From B".to_string();

    let saved = store
        .conditional_save(&writer_a, Some(&v1), MutationKind::Update, &cancel)
        .unwrap();
    let SaveOutcome::Saved(v2) = saved else {
        panic!("first writer should win");
    };
    let lost = store
        .conditional_save(&writer_b, Some(&v1), MutationKind::Update, &cancel)
        .unwrap();
    assert_eq!(lost, SaveOutcome::Conflict);

    let stored = RecordGateway::<TaskItem>::load_by_id(&store, task.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "From A");
    assert_eq!(stored.version, v2);
}

/// Gateway that serves a snapshot taken before a competing write.
struct StaleReads<'a> {
    inner: SqliteBoardStore<'a>,
    snapshot: TaskItem,
}

impl RecordGateway<TaskItem> for StaleReads<'_> {
    fn load_by_id(&self, _id: TaskId) -> RepoResult<Option<TaskItem>> {
        Ok(Some(self.snapshot.clone()))
    }

    fn conditional_save(
        &self,
        record: &TaskItem,
        expected: Option<&VersionToken>,
        kind: MutationKind,
        cancel: &CancellationSignal,
    ) -> RepoResult<SaveOutcome> {
        self.inner.conditional_save(record, expected, kind, cancel)
    }
}

#[test]
fn pipeline_reports_conflict_when_storage_check_fails_after_matching_load() {
    let conn = open_db_in_memory().unwrap();
    let Seed { ctx, task } = seed_task(&conn);
    let service = tasks(&conn);
    let v1 = task.version.clone();

    let winner = service
        .rename_task(&ctx, task.id, Some(&v1), "Winner")
        .unwrap();
    let v2 = winner.version().cloned().unwrap();

    let stale = StaleReads {
        inner: SqliteBoardStore::try_new(&conn).unwrap(),
        snapshot: task.clone(),
    };
    let result = execute_update::<TaskItem, _, _>(&stale, &ctx, task.id, Some(&v1), |current| {
        let mut next = current.clone();
        next.title = "Loser".to_string();
        Change::Apply(next)
    })
    .unwrap();

    assert_eq!(result.outcome(), MutationOutcome::Conflict);
    assert_eq!(result.current_version(), Some(&v2));
    assert_eq!(service.get_task(task.id).unwrap().unwrap().title, "Winner");
}

#[test]
fn concurrent_writers_on_separate_connections_produce_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.db");
    let (ctx, task) = {
        let conn = open_db(&path).unwrap();
        let Seed { ctx, task } = seed_task(&conn);
        (ctx, task)
    };

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = ["Left", "Right"]
        .into_iter()
        .map(|title| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            let ctx = ctx.clone();
            let task_id = task.id;
            let v1 = task.version.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = tasks(&conn);
                barrier.wait();
                let result = service
                    .rename_task(&ctx, task_id, Some(&v1), title)
                    .unwrap();
                (title, result.outcome())
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    let winners: Vec<_> = results
        .iter()
        .filter(|(_, outcome)| *outcome == MutationOutcome::Updated)
        .collect();
    let losers = results
        .iter()
        .filter(|(_, outcome)| *outcome == MutationOutcome::Conflict)
        .count();
    assert_eq!(winners.len(), 1);
    assert_eq!(losers, 1);

    let conn = open_db(&path).unwrap();
    let stored = tasks(&conn).get_task(task.id).unwrap().unwrap();
    assert_eq!(stored.title, winners[0].0);
}
