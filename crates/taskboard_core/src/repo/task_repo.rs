//! SQLite persistence for tasks, notes and assignments.
//!
//! # Invariants
//! - Task moves rewrite `lane_id`, `column_id` and `sort_order` in one
//!   compare-and-swap statement.
//! - Deleting a task tombstones its notes and assignments in the same
//!   transaction.
//! - An active duplicate `(task_id, user_id)` assignment is rejected by the
//!   partial unique index and surfaces as a save conflict.

use crate::context::CancellationSignal;
use crate::model::board::{ColumnId, LaneId};
use crate::model::mutation::MutationKind;
use crate::model::task::{
    AssignmentId, AssignmentRole, NoteId, TaskAssignment, TaskId, TaskItem, TaskNote,
};
use crate::model::version::VersionToken;
use crate::repo::board_repo::SqliteBoardStore;
use crate::repo::gateway::{RecordGateway, RepoError, RepoResult, SaveOutcome, TaskListQuery};
use crate::repo::sql::{
    guarded_write, query_all, query_optional, soft_delete_row, tombstone_where, uuid_column,
    version_column, NOW_MS,
};
use rusqlite::{params, Connection, Row};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    project_id,
    lane_id,
    column_id,
    title,
    description,
    sort_order,
    version
FROM tasks";
const NOTE_SELECT_SQL: &str = "SELECT id, project_id, task_id, author_id, body, version
FROM task_notes";
const ASSIGNMENT_SELECT_SQL: &str = "SELECT id, project_id, task_id, user_id, role, version
FROM task_assignments";

impl RecordGateway<TaskItem> for SqliteBoardStore<'_> {
    fn load_by_id(&self, id: TaskId) -> RepoResult<Option<TaskItem>> {
        query_optional(
            self.conn(),
            &format!("{TASK_SELECT_SQL} WHERE id = ?1 AND is_deleted = 0;"),
            id,
            parse_task_row,
        )
    }

    fn conditional_save(
        &self,
        task: &TaskItem,
        expected: Option<&VersionToken>,
        kind: MutationKind,
        cancel: &CancellationSignal,
    ) -> RepoResult<SaveOutcome> {
        guarded_write(
            self.conn(),
            "task",
            kind,
            expected,
            cancel,
            |tx, next, expected| match kind {
                MutationKind::Create => tx.execute(
                    "INSERT INTO tasks (
                        id,
                        project_id,
                        lane_id,
                        column_id,
                        title,
                        description,
                        sort_order,
                        version
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                    params![
                        task.id.to_string(),
                        task.project_id.to_string(),
                        task.lane_id.to_string(),
                        task.column_id.to_string(),
                        task.title.as_str(),
                        task.description.as_deref(),
                        task.sort_order,
                        next.as_bytes(),
                    ],
                ),
                MutationKind::Update => tx.execute(
                    &format!(
                        "UPDATE tasks
                         SET lane_id = ?2,
                             column_id = ?3,
                             title = ?4,
                             description = ?5,
                             sort_order = ?6,
                             version = ?7,
                             updated_at = {NOW_MS}
                         WHERE id = ?1
                           AND version = ?8
                           AND is_deleted = 0;"
                    ),
                    params![
                        task.id.to_string(),
                        task.lane_id.to_string(),
                        task.column_id.to_string(),
                        task.title.as_str(),
                        task.description.as_deref(),
                        task.sort_order,
                        next.as_bytes(),
                        expected,
                    ],
                ),
                MutationKind::Delete => {
                    let changed = soft_delete_row(tx, "tasks", task.id, next, expected)?;
                    if changed == 1 {
                        tombstone_where(tx, "task_notes", "task_id", task.id)?;
                        tombstone_where(tx, "task_assignments", "task_id", task.id)?;
                    }
                    Ok(changed)
                }
            },
        )
    }
}

impl RecordGateway<TaskNote> for SqliteBoardStore<'_> {
    fn load_by_id(&self, id: NoteId) -> RepoResult<Option<TaskNote>> {
        query_optional(
            self.conn(),
            &format!("{NOTE_SELECT_SQL} WHERE id = ?1 AND is_deleted = 0;"),
            id,
            parse_note_row,
        )
    }

    fn conditional_save(
        &self,
        note: &TaskNote,
        expected: Option<&VersionToken>,
        kind: MutationKind,
        cancel: &CancellationSignal,
    ) -> RepoResult<SaveOutcome> {
        guarded_write(
            self.conn(),
            "task_note",
            kind,
            expected,
            cancel,
            |tx, next, expected| match kind {
                MutationKind::Create => tx.execute(
                    "INSERT INTO task_notes (id, project_id, task_id, author_id, body, version)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                    params![
                        note.id.to_string(),
                        note.project_id.to_string(),
                        note.task_id.to_string(),
                        note.author_id.to_string(),
                        note.body.as_str(),
                        next.as_bytes(),
                    ],
                ),
                MutationKind::Update => tx.execute(
                    &format!(
                        "UPDATE task_notes
                         SET body = ?2,
                             version = ?3,
                             updated_at = {NOW_MS}
                         WHERE id = ?1
                           AND version = ?4
                           AND is_deleted = 0;"
                    ),
                    params![note.id.to_string(), note.body.as_str(), next.as_bytes(), expected],
                ),
                MutationKind::Delete => soft_delete_row(tx, "task_notes", note.id, next, expected),
            },
        )
    }
}

impl RecordGateway<TaskAssignment> for SqliteBoardStore<'_> {
    fn load_by_id(&self, id: AssignmentId) -> RepoResult<Option<TaskAssignment>> {
        query_optional(
            self.conn(),
            &format!("{ASSIGNMENT_SELECT_SQL} WHERE id = ?1 AND is_deleted = 0;"),
            id,
            parse_assignment_row,
        )
    }

    fn conditional_save(
        &self,
        assignment: &TaskAssignment,
        expected: Option<&VersionToken>,
        kind: MutationKind,
        cancel: &CancellationSignal,
    ) -> RepoResult<SaveOutcome> {
        guarded_write(
            self.conn(),
            "task_assignment",
            kind,
            expected,
            cancel,
            |tx, next, expected| match kind {
                MutationKind::Create => tx.execute(
                    "INSERT INTO task_assignments (id, project_id, task_id, user_id, role, version)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                    params![
                        assignment.id.to_string(),
                        assignment.project_id.to_string(),
                        assignment.task_id.to_string(),
                        assignment.user_id.to_string(),
                        assignment.role.as_str(),
                        next.as_bytes(),
                    ],
                ),
                MutationKind::Update => tx.execute(
                    &format!(
                        "UPDATE task_assignments
                         SET role = ?2,
                             version = ?3,
                             updated_at = {NOW_MS}
                         WHERE id = ?1
                           AND version = ?4
                           AND is_deleted = 0;"
                    ),
                    params![
                        assignment.id.to_string(),
                        assignment.role.as_str(),
                        next.as_bytes(),
                        expected,
                    ],
                ),
                MutationKind::Delete => {
                    soft_delete_row(tx, "task_assignments", assignment.id, next, expected)
                }
            },
        )
    }
}

/// Lists active tasks of a project, optionally narrowed to a lane and/or column.
pub(crate) fn list_tasks(conn: &Connection, query: &TaskListQuery) -> RepoResult<Vec<TaskItem>> {
    let mut stmt = conn.prepare(&format!(
        "{TASK_SELECT_SQL}
         WHERE project_id = ?1
           AND is_deleted = 0
           AND (?2 IS NULL OR lane_id = ?2)
           AND (?3 IS NULL OR column_id = ?3)
         ORDER BY sort_order ASC, id ASC;"
    ))?;
    let mut rows = stmt.query(params![
        query.project_id.to_string(),
        query.lane_id.map(|id| id.to_string()),
        query.column_id.map(|id| id.to_string()),
    ])?;

    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(parse_task_row(row)?);
    }
    Ok(tasks)
}

/// Notes of one task in insertion order.
pub(crate) fn list_notes(conn: &Connection, task_id: TaskId) -> RepoResult<Vec<TaskNote>> {
    query_all(
        conn,
        &format!(
            "{NOTE_SELECT_SQL}
             WHERE task_id = ?1 AND is_deleted = 0
             ORDER BY created_at ASC, rowid ASC;"
        ),
        task_id,
        parse_note_row,
    )
}

pub(crate) fn list_assignments(
    conn: &Connection,
    task_id: TaskId,
) -> RepoResult<Vec<TaskAssignment>> {
    query_all(
        conn,
        &format!(
            "{ASSIGNMENT_SELECT_SQL}
             WHERE task_id = ?1 AND is_deleted = 0
             ORDER BY created_at ASC, rowid ASC;"
        ),
        task_id,
        parse_assignment_row,
    )
}

pub(crate) fn next_task_order(
    conn: &Connection,
    lane_id: LaneId,
    column_id: ColumnId,
) -> RepoResult<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1
         FROM tasks
         WHERE lane_id = ?1
           AND column_id = ?2
           AND is_deleted = 0;",
        params![lane_id.to_string(), column_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(next)
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<TaskItem> {
    Ok(TaskItem {
        id: uuid_column(row, "id")?,
        project_id: uuid_column(row, "project_id")?,
        lane_id: uuid_column(row, "lane_id")?,
        column_id: uuid_column(row, "column_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        sort_order: row.get("sort_order")?,
        version: version_column(row)?,
    })
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<TaskNote> {
    Ok(TaskNote {
        id: uuid_column(row, "id")?,
        project_id: uuid_column(row, "project_id")?,
        task_id: uuid_column(row, "task_id")?,
        author_id: uuid_column(row, "author_id")?,
        body: row.get("body")?,
        version: version_column(row)?,
    })
}

fn parse_assignment_row(row: &Row<'_>) -> RepoResult<TaskAssignment> {
    let raw_role: String = row.get("role")?;
    let role = AssignmentRole::parse(&raw_role).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid role `{raw_role}` in task_assignments.role"
        ))
    })?;
    Ok(TaskAssignment {
        id: uuid_column(row, "id")?,
        project_id: uuid_column(row, "project_id")?,
        task_id: uuid_column(row, "task_id")?,
        user_id: uuid_column(row, "user_id")?,
        role,
        version: version_column(row)?,
    })
}
