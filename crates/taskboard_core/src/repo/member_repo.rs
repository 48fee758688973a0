//! SQLite persistence for users and project memberships.

use crate::context::CancellationSignal;
use crate::model::member::{MemberId, ProjectMember, ProjectRole, User, UserId};
use crate::model::mutation::MutationKind;
use crate::model::record::ProjectId;
use crate::model::version::VersionToken;
use crate::repo::board_repo::SqliteBoardStore;
use crate::repo::gateway::{RecordGateway, RepoError, RepoResult, SaveOutcome};
use crate::repo::sql::{
    guarded_write, query_all, query_optional, soft_delete_row, uuid_column, version_column, NOW_MS,
};
use rusqlite::{params, Connection, Row, Transaction};

const USER_SELECT_SQL: &str = "SELECT id, email, display_name, version
FROM users";
const MEMBER_SELECT_SQL: &str = "SELECT id, project_id, user_id, role, version
FROM project_members";

impl RecordGateway<User> for SqliteBoardStore<'_> {
    fn load_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        query_optional(
            self.conn(),
            &format!("{USER_SELECT_SQL} WHERE id = ?1 AND is_deleted = 0;"),
            id,
            parse_user_row,
        )
    }

    fn conditional_save(
        &self,
        user: &User,
        expected: Option<&VersionToken>,
        kind: MutationKind,
        cancel: &CancellationSignal,
    ) -> RepoResult<SaveOutcome> {
        guarded_write(
            self.conn(),
            "user",
            kind,
            expected,
            cancel,
            |tx, next, expected| match kind {
                MutationKind::Create => tx.execute(
                    "INSERT INTO users (id, email, display_name, version)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![
                        user.id.to_string(),
                        user.email.as_str(),
                        user.display_name.as_str(),
                        next.as_bytes(),
                    ],
                ),
                MutationKind::Update => tx.execute(
                    &format!(
                        "UPDATE users
                         SET display_name = ?2,
                             version = ?3,
                             updated_at = {NOW_MS}
                         WHERE id = ?1
                           AND version = ?4
                           AND is_deleted = 0;"
                    ),
                    params![
                        user.id.to_string(),
                        user.display_name.as_str(),
                        next.as_bytes(),
                        expected,
                    ],
                ),
                MutationKind::Delete => soft_delete_row(tx, "users", user.id, next, expected),
            },
        )
    }
}

impl RecordGateway<ProjectMember> for SqliteBoardStore<'_> {
    fn load_by_id(&self, id: MemberId) -> RepoResult<Option<ProjectMember>> {
        query_optional(
            self.conn(),
            &format!("{MEMBER_SELECT_SQL} WHERE id = ?1 AND is_deleted = 0;"),
            id,
            parse_member_row,
        )
    }

    fn conditional_save(
        &self,
        member: &ProjectMember,
        expected: Option<&VersionToken>,
        kind: MutationKind,
        cancel: &CancellationSignal,
    ) -> RepoResult<SaveOutcome> {
        guarded_write(
            self.conn(),
            "project_member",
            kind,
            expected,
            cancel,
            |tx, next, expected| match kind {
                MutationKind::Create => insert_member(tx, member, next),
                MutationKind::Update => tx.execute(
                    &format!(
                        "UPDATE project_members
                         SET role = ?2,
                             version = ?3,
                             updated_at = {NOW_MS}
                         WHERE id = ?1
                           AND version = ?4
                           AND is_deleted = 0;"
                    ),
                    params![
                        member.id.to_string(),
                        member.role.as_str(),
                        next.as_bytes(),
                        expected,
                    ],
                ),
                MutationKind::Delete => {
                    soft_delete_row(tx, "project_members", member.id, next, expected)
                }
            },
        )
    }
}

pub(crate) fn insert_member(
    tx: &Transaction<'_>,
    member: &ProjectMember,
    version: &VersionToken,
) -> rusqlite::Result<usize> {
    tx.execute(
        "INSERT INTO project_members (id, project_id, user_id, role, version)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            member.id.to_string(),
            member.project_id.to_string(),
            member.user_id.to_string(),
            member.role.as_str(),
            version.as_bytes(),
        ],
    )
}

/// Active members of a project in join order.
pub(crate) fn list_members(
    conn: &Connection,
    project_id: ProjectId,
) -> RepoResult<Vec<ProjectMember>> {
    query_all(
        conn,
        &format!(
            "{MEMBER_SELECT_SQL}
             WHERE project_id = ?1 AND is_deleted = 0
             ORDER BY created_at ASC, rowid ASC;"
        ),
        project_id,
        parse_member_row,
    )
}

pub(crate) fn find_member(
    conn: &Connection,
    project_id: ProjectId,
    user_id: UserId,
) -> RepoResult<Option<ProjectMember>> {
    let mut stmt = conn.prepare(&format!(
        "{MEMBER_SELECT_SQL}
         WHERE project_id = ?1
           AND user_id = ?2
           AND is_deleted = 0;"
    ))?;
    let mut rows = stmt.query(params![project_id.to_string(), user_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_member_row(row)?));
    }
    Ok(None)
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    Ok(User {
        id: uuid_column(row, "id")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
        version: version_column(row)?,
    })
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<ProjectMember> {
    let raw_role: String = row.get("role")?;
    let role = ProjectRole::parse(&raw_role).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{raw_role}` in project_members.role"))
    })?;
    Ok(ProjectMember {
        id: uuid_column(row, "id")?,
        project_id: uuid_column(row, "project_id")?,
        user_id: uuid_column(row, "user_id")?,
        role,
        version: version_column(row)?,
    })
}
