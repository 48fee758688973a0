//! SQLite board store: projects, lanes and columns.
//!
//! # Responsibility
//! - Own the `SqliteBoardStore` handle implementing every record gateway.
//! - Persist projects, lanes and columns with version compare-and-swap.
//! - Serve read-side board queries.
//!
//! # Invariants
//! - Only active (`is_deleted=0`) rows are returned.
//! - Listing is deterministic: `sort_order ASC, id ASC`.
//! - Deleting a project tombstones every row scoped to it; deleting a lane or
//!   column tombstones its tasks and their notes/assignments.
//! - A project and its owner membership are inserted in one transaction.

use crate::context::CancellationSignal;
use crate::model::board::{Column, ColumnId, Lane, LaneId, Project};
use crate::model::member::{ProjectMember, UserId};
use crate::model::mutation::MutationKind;
use crate::model::record::ProjectId;
use crate::model::task::{TaskAssignment, TaskId, TaskItem, TaskNote};
use crate::model::version::VersionToken;
use crate::repo::gateway::{
    BoardQueries, ProjectCreation, ProjectSave, RecordGateway, RepoError, RepoResult, SaveOutcome,
    TaskListQuery,
};
use crate::repo::sql::{
    ensure_connection_ready, guarded_write, query_all, query_optional, soft_delete_row,
    tombstone_task_children_where, tombstone_where, uuid_column, version_column, NOW_MS,
};
use crate::repo::{member_repo, task_repo};
use rusqlite::{params, Connection, Row, Transaction};

const REQUIRED_TABLES: &[&str] = &[
    "users",
    "projects",
    "project_members",
    "lanes",
    "board_columns",
    "tasks",
    "task_notes",
    "task_assignments",
];

const PROJECT_SELECT_SQL: &str = "SELECT id, owner_id, name, description, version
FROM projects";
const LANE_SELECT_SQL: &str = "SELECT id, project_id, name, sort_order, version
FROM lanes";
const COLUMN_SELECT_SQL: &str = "SELECT id, project_id, name, sort_order, wip_limit, version
FROM board_columns";

/// SQLite-backed implementation of every board gateway.
#[derive(Clone, Copy)]
pub struct SqliteBoardStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBoardStore<'conn> {
    /// Creates the store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &'conn Connection {
        self.conn
    }
}

impl RecordGateway<Project> for SqliteBoardStore<'_> {
    fn load_by_id(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        query_optional(
            self.conn,
            &format!("{PROJECT_SELECT_SQL} WHERE id = ?1 AND is_deleted = 0;"),
            id,
            parse_project_row,
        )
    }

    fn conditional_save(
        &self,
        project: &Project,
        expected: Option<&VersionToken>,
        kind: MutationKind,
        cancel: &CancellationSignal,
    ) -> RepoResult<SaveOutcome> {
        guarded_write(
            self.conn,
            "project",
            kind,
            expected,
            cancel,
            |tx, next, expected| match kind {
                MutationKind::Create => insert_project(tx, project, next),
                MutationKind::Update => tx.execute(
                    &format!(
                        "UPDATE projects
                         SET name = ?2,
                             description = ?3,
                             version = ?4,
                             updated_at = {NOW_MS}
                         WHERE id = ?1
                           AND version = ?5
                           AND is_deleted = 0;"
                    ),
                    params![
                        project.id.to_string(),
                        project.name.as_str(),
                        project.description.as_deref(),
                        next.as_bytes(),
                        expected,
                    ],
                ),
                MutationKind::Delete => {
                    let changed = soft_delete_row(tx, "projects", project.id, next, expected)?;
                    if changed == 1 {
                        for table in [
                            "task_notes",
                            "task_assignments",
                            "tasks",
                            "lanes",
                            "board_columns",
                            "project_members",
                        ] {
                            tombstone_where(tx, table, "project_id", project.id)?;
                        }
                    }
                    Ok(changed)
                }
            },
        )
    }
}

impl ProjectCreation for SqliteBoardStore<'_> {
    fn create_project_with_owner(
        &self,
        project: &Project,
        owner: &ProjectMember,
        cancel: &CancellationSignal,
    ) -> RepoResult<ProjectSave> {
        let owner_version = VersionToken::initial();
        let saved = guarded_write(
            self.conn,
            "project",
            MutationKind::Create,
            None,
            cancel,
            |tx, next, _| {
                insert_project(tx, project, next)?;
                member_repo::insert_member(tx, owner, &owner_version)
            },
        )?;
        Ok(match saved {
            SaveOutcome::Saved(version) => ProjectSave::Saved {
                project: version,
                owner: owner_version,
            },
            SaveOutcome::Conflict => ProjectSave::Conflict,
        })
    }
}

impl RecordGateway<Lane> for SqliteBoardStore<'_> {
    fn load_by_id(&self, id: LaneId) -> RepoResult<Option<Lane>> {
        query_optional(
            self.conn,
            &format!("{LANE_SELECT_SQL} WHERE id = ?1 AND is_deleted = 0;"),
            id,
            parse_lane_row,
        )
    }

    fn conditional_save(
        &self,
        lane: &Lane,
        expected: Option<&VersionToken>,
        kind: MutationKind,
        cancel: &CancellationSignal,
    ) -> RepoResult<SaveOutcome> {
        guarded_write(
            self.conn,
            "lane",
            kind,
            expected,
            cancel,
            |tx, next, expected| match kind {
                MutationKind::Create => tx.execute(
                    "INSERT INTO lanes (id, project_id, name, sort_order, version)
                     VALUES (?1, ?2, ?3, ?4, ?5);",
                    params![
                        lane.id.to_string(),
                        lane.project_id.to_string(),
                        lane.name.as_str(),
                        lane.sort_order,
                        next.as_bytes(),
                    ],
                ),
                MutationKind::Update => tx.execute(
                    &format!(
                        "UPDATE lanes
                         SET name = ?2,
                             sort_order = ?3,
                             version = ?4,
                             updated_at = {NOW_MS}
                         WHERE id = ?1
                           AND version = ?5
                           AND is_deleted = 0;"
                    ),
                    params![
                        lane.id.to_string(),
                        lane.name.as_str(),
                        lane.sort_order,
                        next.as_bytes(),
                        expected,
                    ],
                ),
                MutationKind::Delete => {
                    let changed = soft_delete_row(tx, "lanes", lane.id, next, expected)?;
                    if changed == 1 {
                        tombstone_task_children_where(tx, "lane_id", lane.id)?;
                        tombstone_where(tx, "tasks", "lane_id", lane.id)?;
                    }
                    Ok(changed)
                }
            },
        )
    }
}

impl RecordGateway<Column> for SqliteBoardStore<'_> {
    fn load_by_id(&self, id: ColumnId) -> RepoResult<Option<Column>> {
        query_optional(
            self.conn,
            &format!("{COLUMN_SELECT_SQL} WHERE id = ?1 AND is_deleted = 0;"),
            id,
            parse_column_row,
        )
    }

    fn conditional_save(
        &self,
        column: &Column,
        expected: Option<&VersionToken>,
        kind: MutationKind,
        cancel: &CancellationSignal,
    ) -> RepoResult<SaveOutcome> {
        guarded_write(
            self.conn,
            "column",
            kind,
            expected,
            cancel,
            |tx, next, expected| match kind {
                MutationKind::Create => tx.execute(
                    "INSERT INTO board_columns (id, project_id, name, sort_order, wip_limit, version)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                    params![
                        column.id.to_string(),
                        column.project_id.to_string(),
                        column.name.as_str(),
                        column.sort_order,
                        column.wip_limit,
                        next.as_bytes(),
                    ],
                ),
                MutationKind::Update => tx.execute(
                    &format!(
                        "UPDATE board_columns
                         SET name = ?2,
                             sort_order = ?3,
                             wip_limit = ?4,
                             version = ?5,
                             updated_at = {NOW_MS}
                         WHERE id = ?1
                           AND version = ?6
                           AND is_deleted = 0;"
                    ),
                    params![
                        column.id.to_string(),
                        column.name.as_str(),
                        column.sort_order,
                        column.wip_limit,
                        next.as_bytes(),
                        expected,
                    ],
                ),
                MutationKind::Delete => {
                    let changed = soft_delete_row(tx, "board_columns", column.id, next, expected)?;
                    if changed == 1 {
                        tombstone_task_children_where(tx, "column_id", column.id)?;
                        tombstone_where(tx, "tasks", "column_id", column.id)?;
                    }
                    Ok(changed)
                }
            },
        )
    }
}

impl BoardQueries for SqliteBoardStore<'_> {
    fn list_projects(&self) -> RepoResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROJECT_SELECT_SQL} WHERE is_deleted = 0 ORDER BY name COLLATE NOCASE ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn list_members(&self, project_id: ProjectId) -> RepoResult<Vec<ProjectMember>> {
        member_repo::list_members(self.conn, project_id)
    }

    fn find_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> RepoResult<Option<ProjectMember>> {
        member_repo::find_member(self.conn, project_id, user_id)
    }

    fn list_lanes(&self, project_id: ProjectId) -> RepoResult<Vec<Lane>> {
        query_all(
            self.conn,
            &format!(
                "{LANE_SELECT_SQL}
                 WHERE project_id = ?1 AND is_deleted = 0
                 ORDER BY sort_order ASC, id ASC;"
            ),
            project_id,
            parse_lane_row,
        )
    }

    fn list_columns(&self, project_id: ProjectId) -> RepoResult<Vec<Column>> {
        query_all(
            self.conn,
            &format!(
                "{COLUMN_SELECT_SQL}
                 WHERE project_id = ?1 AND is_deleted = 0
                 ORDER BY sort_order ASC, id ASC;"
            ),
            project_id,
            parse_column_row,
        )
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<TaskItem>> {
        task_repo::list_tasks(self.conn, query)
    }

    fn list_notes(&self, task_id: TaskId) -> RepoResult<Vec<TaskNote>> {
        task_repo::list_notes(self.conn, task_id)
    }

    fn list_assignments(&self, task_id: TaskId) -> RepoResult<Vec<TaskAssignment>> {
        task_repo::list_assignments(self.conn, task_id)
    }

    fn next_lane_order(&self, project_id: ProjectId) -> RepoResult<i64> {
        next_order_in(self.conn, "lanes", project_id)
    }

    fn next_column_order(&self, project_id: ProjectId) -> RepoResult<i64> {
        next_order_in(self.conn, "board_columns", project_id)
    }

    fn next_task_order(&self, lane_id: LaneId, column_id: ColumnId) -> RepoResult<i64> {
        task_repo::next_task_order(self.conn, lane_id, column_id)
    }
}

fn insert_project(
    tx: &Transaction<'_>,
    project: &Project,
    version: &VersionToken,
) -> rusqlite::Result<usize> {
    tx.execute(
        "INSERT INTO projects (id, owner_id, name, description, version)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            project.id.to_string(),
            project.owner_id.to_string(),
            project.name.as_str(),
            project.description.as_deref(),
            version.as_bytes(),
        ],
    )
}

fn next_order_in(conn: &Connection, table: &'static str, project_id: ProjectId) -> RepoResult<i64> {
    let next = conn.query_row(
        &format!(
            "SELECT COALESCE(MAX(sort_order), -1) + 1
             FROM {table}
             WHERE project_id = ?1
               AND is_deleted = 0;"
        ),
        [project_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(next)
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    Ok(Project {
        id: uuid_column(row, "id")?,
        owner_id: uuid_column(row, "owner_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        version: version_column(row)?,
    })
}

fn parse_lane_row(row: &Row<'_>) -> RepoResult<Lane> {
    Ok(Lane {
        id: uuid_column(row, "id")?,
        project_id: uuid_column(row, "project_id")?,
        name: row.get("name")?,
        sort_order: row.get("sort_order")?,
        version: version_column(row)?,
    })
}

fn parse_column_row(row: &Row<'_>) -> RepoResult<Column> {
    let wip_limit = match row.get::<_, Option<i64>>("wip_limit")? {
        Some(value) => Some(u32::try_from(value).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid wip_limit `{value}` in board_columns.wip_limit"
            ))
        })?),
        None => None,
    };
    Ok(Column {
        id: uuid_column(row, "id")?,
        project_id: uuid_column(row, "project_id")?,
        name: row.get("name")?,
        sort_order: row.get("sort_order")?,
        wip_limit,
        version: version_column(row)?,
    })
}
