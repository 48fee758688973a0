//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a board database from `TASKBOARD_*` settings (in-memory by default).
//! - Drive one task through create, rename, stale rename, no-op rename,
//!   delete and repeated delete, printing each translated response.

use log::{error, info};
use std::error::Error;
use std::process::ExitCode;
use taskboard_core::transport::{render, ResponseBody};
use taskboard_core::{
    init_logging_from_config, open_db_with_config, BoardService, CoreConfig, CreateTaskRequest,
    ProjectService, ResponsePreference, SqliteActivityLog, SqliteBoardStore, TaskService,
    UserService, VersionToken, WriteContext, WriteOutcome,
};
use uuid::Uuid;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_failed module=cli status=error error={err}");
            eprintln!("taskboard: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env()?;
    init_logging_from_config(&config)?;
    println!("taskboard_core version={}", taskboard_core::core_version());

    let conn = open_db_with_config(&config)?;
    let store = SqliteBoardStore::try_new(&conn)?;
    let activity = SqliteActivityLog::try_new(&conn)?;

    let bootstrap = WriteContext::new(Uuid::new_v4()).with_request_id("cli-bootstrap");
    let users = UserService::new(store, &activity);
    let user = users
        .create_user(&bootstrap, "smoke@example.com", "Smoke Test")?
        .into_record()
        .ok_or("user was not created")?;

    let ctx = WriteContext::from_config(user.id, &config).with_request_id("cli-scenario");
    let projects = ProjectService::new(store, &activity);
    let board = BoardService::new(store, &activity);
    let tasks = TaskService::new(store, &activity);

    let project = projects
        .create_project(&ctx, "Smoke board", None)?
        .into_record()
        .ok_or("project was not created")?;
    let lane = board
        .create_lane(&ctx, project.id, "Default", None)?
        .into_record()
        .ok_or("lane was not created")?;
    let column = board
        .create_column(&ctx, project.id, "Todo", None, Some(5))?
        .into_record()
        .ok_or("column was not created")?;

    let created = tasks.create_task(
        &ctx,
        &CreateTaskRequest {
            project_id: project.id,
            lane_id: lane.id,
            column_id: column.id,
            title: "Write the release notes".to_string(),
            description: None,
            sort_order: None,
        },
    );
    let v1 = print_step("create", &created);
    let task_id = created
        .as_ref()
        .ok()
        .and_then(|result| result.record())
        .map(|task| task.id)
        .ok_or("task was not created")?;

    let renamed = tasks.rename_task(&ctx, task_id, v1.as_ref(), "Publish the release notes");
    let v2 = print_step("rename", &renamed);
    print_step(
        "rename_stale",
        &tasks.rename_task(&ctx, task_id, v1.as_ref(), "Something else"),
    );
    print_step(
        "rename_same",
        &tasks.rename_task(&ctx, task_id, v2.as_ref(), "Publish the release notes"),
    );
    print_step("delete", &tasks.delete_task(&ctx, task_id, v2.as_ref()));
    print_step("delete_again", &tasks.delete_task(&ctx, task_id, v2.as_ref()));

    let recorded = activity.list_activity(project.id, None)?;
    info!(
        "event=cli_scenario module=cli status=ok activity_entries={}",
        recorded.len()
    );
    println!("activity entries={}", recorded.len());
    Ok(())
}

/// Prints one translated response and returns the token it issued, if any.
fn print_step<T: serde::Serialize>(label: &str, outcome: &WriteOutcome<T>) -> Option<VersionToken> {
    let response = render(outcome, ResponsePreference::Minimal);
    let body = match &response.body {
        ResponseBody::Empty => String::new(),
        ResponseBody::Json(value) => value.to_string(),
    };
    println!(
        "{label}: status={} etag={} body={}",
        response.status,
        response.etag.as_deref().unwrap_or("-"),
        body
    );
    outcome
        .as_ref()
        .ok()
        .and_then(|result| result.version().cloned())
}
