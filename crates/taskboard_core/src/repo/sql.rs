//! Shared SQLite helpers for board repositories.

use crate::context::CancellationSignal;
use crate::db::migrations::latest_version;
use crate::model::mutation::MutationKind;
use crate::model::version::VersionToken;
use crate::repo::gateway::{RepoError, RepoResult, SaveOutcome};
use rusqlite::{params, Connection, ErrorCode, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

/// Epoch-millisecond timestamp expression used by every write.
pub(crate) const NOW_MS: &str = "(strftime('%s', 'now') * 1000)";

/// Runs one compare-and-swap write inside an IMMEDIATE transaction.
///
/// `write` receives the transaction, the token to store, and the expected
/// stored token (empty for Create). It returns the number of primary rows
/// affected; zero means the stored version moved and the save is a conflict.
/// A unique/primary-key violation on Create is also a conflict.
pub(crate) fn guarded_write<F>(
    conn: &Connection,
    entity: &'static str,
    kind: MutationKind,
    expected: Option<&VersionToken>,
    cancel: &CancellationSignal,
    write: F,
) -> RepoResult<SaveOutcome>
where
    F: FnOnce(&Transaction<'_>, &VersionToken, &[u8]) -> rusqlite::Result<usize>,
{
    let (next, expected_bytes): (VersionToken, &[u8]) = match (kind, expected) {
        (MutationKind::Create, _) => (VersionToken::initial(), &[] as &[u8]),
        (_, Some(expected)) => (expected.successor(), expected.as_bytes()),
        (_, None) => return Err(RepoError::MissingExpectedVersion { entity }),
    };

    cancel.check()?;
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let changed = match write(&tx, &next, expected_bytes) {
        Ok(changed) => changed,
        Err(err) if kind == MutationKind::Create && is_constraint_violation(&err) => {
            return Ok(SaveOutcome::Conflict);
        }
        Err(err) => return Err(err.into()),
    };
    if changed == 0 {
        return Ok(SaveOutcome::Conflict);
    }

    // Dropping `tx` without commit rolls back.
    cancel.check()?;
    tx.commit()?;
    Ok(SaveOutcome::Saved(next))
}

/// Tombstones one row if its stored version still equals `expected`.
pub(crate) fn soft_delete_row(
    tx: &Transaction<'_>,
    table: &'static str,
    id: Uuid,
    next: &VersionToken,
    expected: &[u8],
) -> rusqlite::Result<usize> {
    tx.execute(
        &format!(
            "UPDATE {table}
             SET is_deleted = 1,
                 version = ?2,
                 updated_at = {NOW_MS}
             WHERE id = ?1
               AND version = ?3
               AND is_deleted = 0;"
        ),
        params![id.to_string(), next.as_bytes(), expected],
    )
}

/// Tombstones every active row of `table` whose `column` equals `value`.
pub(crate) fn tombstone_where(
    tx: &Transaction<'_>,
    table: &'static str,
    column: &'static str,
    value: Uuid,
) -> rusqlite::Result<usize> {
    tombstone_matching(tx, table, &format!("{column} = ?1"), value)
}

/// Tombstones notes and assignments of every task matching `column = value`.
pub(crate) fn tombstone_task_children_where(
    tx: &Transaction<'_>,
    column: &'static str,
    value: Uuid,
) -> rusqlite::Result<()> {
    let filter = format!("task_id IN (SELECT id FROM tasks WHERE {column} = ?1)");
    for table in ["task_notes", "task_assignments"] {
        tombstone_matching(tx, table, &filter, value)?;
    }
    Ok(())
}

/// Cascade tombstone: every matched row gets the successor of its own token.
fn tombstone_matching(
    tx: &Transaction<'_>,
    table: &'static str,
    filter: &str,
    value: Uuid,
) -> rusqlite::Result<usize> {
    let rows = {
        let mut stmt = tx.prepare(&format!(
            "SELECT id, version FROM {table} WHERE is_deleted = 0 AND {filter};"
        ))?;
        let mapped = stmt.query_map([value.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        mapped.collect::<rusqlite::Result<Vec<_>>>()?
    };

    let mut stmt = tx.prepare(&format!(
        "UPDATE {table}
         SET is_deleted = 1,
             version = ?2,
             updated_at = {NOW_MS}
         WHERE id = ?1;"
    ))?;
    for (id, version) in &rows {
        let next = VersionToken::from_bytes(version.as_slice()).successor();
        stmt.execute(params![id, next.as_bytes()])?;
    }
    Ok(rows.len())
}

/// Runs `sql` with one id parameter and parses the first row, if any.
pub(crate) fn query_optional<T>(
    conn: &Connection,
    sql: &str,
    id: Uuid,
    parse: impl Fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse(row)?));
    }
    Ok(None)
}

/// Runs `sql` with one id parameter and parses every row.
pub(crate) fn query_all<T>(
    conn: &Connection,
    sql: &str,
    id: Uuid,
    parse: impl Fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse(row)?);
    }
    Ok(items)
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

/// Reads a uuid text column.
pub(crate) fn uuid_column(row: &Row<'_>, column: &'static str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    parse_uuid(&text, column)
}

/// Reads the `version` blob column.
pub(crate) fn version_column(row: &Row<'_>) -> RepoResult<VersionToken> {
    let bytes: Vec<u8> = row.get("version")?;
    if bytes.is_empty() {
        return Err(RepoError::InvalidData(
            "empty version token in version column".to_string(),
        ));
    }
    Ok(VersionToken::from_bytes(bytes))
}

/// Verifies the connection is migrated and carries every required table.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}
