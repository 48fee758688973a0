//! Activity feed persisted from committed domain events.
//!
//! # Responsibility
//! - Append project-scoped events to `activity_logs`.
//! - Read a project's recent activity, newest first.
//!
//! # Invariants
//! - Account-level events (no project scope) are not recorded.
//! - Rows are append-only; nothing here updates or deletes them.

use crate::model::member::UserId;
use crate::model::record::ProjectId;
use crate::notify::{DomainEvent, EventPayload, EventPublisher, PublishError};
use crate::repo::gateway::{RepoError, RepoResult};
use crate::repo::sql::{ensure_connection_ready, uuid_column};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

const DEFAULT_ACTIVITY_LIMIT: u32 = 50;
const MAX_ACTIVITY_LIMIT: u32 = 500;

/// One recorded activity row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub project_id: ProjectId,
    pub event_kind: String,
    pub actor_id: UserId,
    pub occurred_at_ms: i64,
    pub payload: EventPayload,
}

/// SQLite-backed activity sink.
#[derive(Clone, Copy)]
pub struct SqliteActivityLog<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteActivityLog<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["activity_logs"])?;
        Ok(Self { conn })
    }

    /// Most recent entries of one project.
    ///
    /// `limit` defaults to 50 and is clamped to `1..=500`.
    pub fn list_activity(
        &self,
        project_id: ProjectId,
        limit: Option<u32>,
    ) -> RepoResult<Vec<ActivityEntry>> {
        let limit = limit
            .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
            .clamp(1, MAX_ACTIVITY_LIMIT);
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, event_kind, actor_id, occurred_at, payload
             FROM activity_logs
             WHERE project_id = ?1
             ORDER BY id DESC
             LIMIT ?2;",
        )?;
        let mut rows = stmt.query(params![project_id.to_string(), i64::from(limit)])?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_activity_row(row)?);
        }
        Ok(entries)
    }
}

impl EventPublisher for SqliteActivityLog<'_> {
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let Some(project_id) = event.project_id else {
            return Ok(());
        };
        let payload = serde_json::to_string(&event.payload)?;
        self.conn.execute(
            "INSERT INTO activity_logs (project_id, event_kind, actor_id, occurred_at, payload)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                project_id.to_string(),
                event.kind(),
                event.actor_id.to_string(),
                event.occurred_at_ms,
                payload,
            ],
        )?;
        Ok(())
    }
}

fn parse_activity_row(row: &Row<'_>) -> RepoResult<ActivityEntry> {
    let raw_payload: String = row.get("payload")?;
    let payload = serde_json::from_str(&raw_payload).map_err(|err| {
        RepoError::InvalidData(format!("invalid payload in activity_logs.payload: {err}"))
    })?;
    Ok(ActivityEntry {
        id: row.get("id")?,
        project_id: uuid_column(row, "project_id")?,
        event_kind: row.get("event_kind")?,
        actor_id: uuid_column(row, "actor_id")?,
        occurred_at_ms: row.get("occurred_at")?,
        payload,
    })
}
