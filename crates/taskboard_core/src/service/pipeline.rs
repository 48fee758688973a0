//! Optimistic-concurrency write pipeline shared by every entity service.
//!
//! # Responsibility
//! - Check the precondition, load, classify and conditionally save.
//! - Turn storage verdicts into `WriteResult` values.
//!
//! # Invariants
//! - Update/Delete without a token fail before any load.
//! - Token mismatch is decided before no-op detection.
//! - No-op and resolved outcomes never touch storage and never issue a token.
//! - A storage-level conflict is reported once and never retried.
//! - Cancellation surfaces as `WriteError::Cancelled`; nothing is persisted.

use crate::context::{CancellationSignal, Cancelled, WriteContext};
use crate::model::mutation::{
    classify, Decision, MutationKind, MutationOutcome, RecordState, WriteResult,
};
use crate::model::record::VersionedRecord;
use crate::model::version::{
    check_precondition, matches as token_matches, PreconditionMissing, VersionToken,
};
use crate::repo::gateway::{RecordGateway, RepoError, RepoResult, SaveOutcome};
use crate::validation::ValidationErrors;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Failure of a write request. Routine outcomes are never errors.
#[derive(Debug)]
pub enum WriteError {
    /// Caller input was rejected before storage access.
    Validation(ValidationErrors),
    /// Update/Delete arrived without a usable version token.
    PreconditionMissing(PreconditionMissing),
    /// The request was cancelled or ran past its deadline.
    Cancelled(Cancelled),
    /// Persistence failure.
    Storage(RepoError),
}

impl WriteError {
    /// Whether storage was unreachable or contended beyond the busy timeout.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Storage(err) if err.is_unavailable())
    }
}

impl Display for WriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::PreconditionMissing(err) => write!(f, "{err}"),
            Self::Cancelled(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::PreconditionMissing(err) => Some(err),
            Self::Cancelled(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<ValidationErrors> for WriteError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<PreconditionMissing> for WriteError {
    fn from(value: PreconditionMissing) -> Self {
        Self::PreconditionMissing(value)
    }
}

impl From<Cancelled> for WriteError {
    fn from(value: Cancelled) -> Self {
        Self::Cancelled(value)
    }
}

impl From<RepoError> for WriteError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Cancelled(reason) => Self::Cancelled(reason),
            other => Self::Storage(other),
        }
    }
}

pub type WriteOutcome<T> = Result<WriteResult<T>, WriteError>;

/// Result of applying a requested change to the current record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    /// Target state equals current state.
    NoOp,
    /// Record to persist.
    Apply(T),
}

impl<T: PartialEq> Change<T> {
    /// `NoOp` when `next` equals `current`, otherwise `Apply(next)`.
    pub fn compare(current: &T, next: T) -> Self {
        if *current == next {
            Self::NoOp
        } else {
            Self::Apply(next)
        }
    }
}

/// Inserts a new record. An id that is already taken is a conflict.
pub fn execute_create<T, G>(gateway: &G, ctx: &WriteContext, record: T) -> WriteOutcome<T>
where
    T: VersionedRecord,
    G: RecordGateway<T> + ?Sized,
{
    execute_create_with(gateway, ctx, record, |record, cancel| {
        gateway.conditional_save(record, None, MutationKind::Create, cancel)
    })
}

/// Same as [`execute_create`], with `save` standing in for the gateway's
/// conditional save. Used when the insert must carry dependent rows.
pub fn execute_create_with<T, G, F>(
    gateway: &G,
    ctx: &WriteContext,
    record: T,
    save: F,
) -> WriteOutcome<T>
where
    T: VersionedRecord,
    G: RecordGateway<T> + ?Sized,
    F: FnOnce(&T, &CancellationSignal) -> RepoResult<SaveOutcome>,
{
    let started = Instant::now();
    let kind = MutationKind::Create;
    let id = record.id();
    ctx.cancel.check()?;

    let state = match gateway.load_by_id(id)? {
        Some(_) => RecordState::Present {
            token_matches: true,
            change_is_noop: false,
        },
        None => RecordState::Absent,
    };
    let result = match classify(kind, state) {
        Decision::Resolved(outcome) => reconcile::<T, G>(gateway, kind, id, outcome)?,
        Decision::Apply => match save(&record, &ctx.cancel)? {
            SaveOutcome::Saved(version) => {
                WriteResult::created(record.with_version(version.clone()), version)
            }
            SaveOutcome::Conflict => {
                reconcile::<T, G>(gateway, kind, id, MutationOutcome::Conflict)?
            }
        },
    };
    log_write::<T>(ctx, kind, &id, result.outcome(), started);
    Ok(result)
}

/// Applies `change` to the current record under the supplied token.
///
/// `change` runs against the loaded state and decides whether anything
/// would actually change; the classifier still checks the token first.
pub fn execute_update<T, G, F>(
    gateway: &G,
    ctx: &WriteContext,
    id: T::Id,
    supplied: Option<&VersionToken>,
    change: F,
) -> WriteOutcome<T>
where
    T: VersionedRecord,
    G: RecordGateway<T> + ?Sized,
    F: FnOnce(&T) -> Change<T>,
{
    let started = Instant::now();
    let kind = MutationKind::Update;
    let expected = required_token(kind, supplied)?;
    ctx.cancel.check()?;

    let Some(current) = gateway.load_by_id(id)? else {
        let result = resolve_absent(kind);
        log_write::<T>(ctx, kind, &id, result.outcome(), started);
        return Ok(result);
    };

    let is_current = token_matches(current.version(), expected);
    let planned = change(&current);
    let state = RecordState::Present {
        token_matches: is_current,
        change_is_noop: matches!(planned, Change::NoOp),
    };

    let result = match (classify(kind, state), planned) {
        (Decision::Apply, Change::Apply(next)) => {
            match gateway.conditional_save(&next, Some(expected), kind, &ctx.cancel)? {
                SaveOutcome::Saved(version) => {
                    WriteResult::updated(next.with_version(version.clone()), version)
                }
                SaveOutcome::Conflict => {
                    reconcile::<T, G>(gateway, kind, id, MutationOutcome::Conflict)?
                }
            }
        }
        (Decision::Resolved(MutationOutcome::Conflict), _) => {
            WriteResult::conflict(Some(current.version().clone()))
        }
        (Decision::Resolved(outcome), _) => WriteResult::resolved(outcome, None),
        (Decision::Apply, Change::NoOp) => WriteResult::no_op(),
    };
    log_write::<T>(ctx, kind, &id, result.outcome(), started);
    Ok(result)
}

/// Tombstones the record under the supplied token. Absent records are a no-op.
pub fn execute_delete<T, G>(
    gateway: &G,
    ctx: &WriteContext,
    id: T::Id,
    supplied: Option<&VersionToken>,
) -> WriteOutcome<T>
where
    T: VersionedRecord,
    G: RecordGateway<T> + ?Sized,
{
    let started = Instant::now();
    let kind = MutationKind::Delete;
    let expected = required_token(kind, supplied)?;
    ctx.cancel.check()?;

    let Some(current) = gateway.load_by_id(id)? else {
        let result = resolve_absent(kind);
        log_write::<T>(ctx, kind, &id, result.outcome(), started);
        return Ok(result);
    };

    let state = RecordState::Present {
        token_matches: token_matches(current.version(), expected),
        change_is_noop: false,
    };
    let result = match classify(kind, state) {
        Decision::Apply => {
            match gateway.conditional_save(&current, Some(expected), kind, &ctx.cancel)? {
                SaveOutcome::Saved(version) => {
                    WriteResult::deleted(current.with_version(version.clone()), version)
                }
                SaveOutcome::Conflict => {
                    reconcile::<T, G>(gateway, kind, id, MutationOutcome::Conflict)?
                }
            }
        }
        Decision::Resolved(MutationOutcome::Conflict) => {
            WriteResult::conflict(Some(current.version().clone()))
        }
        Decision::Resolved(outcome) => WriteResult::resolved(outcome, None),
    };
    log_write::<T>(ctx, kind, &id, result.outcome(), started);
    Ok(result)
}

fn required_token(
    kind: MutationKind,
    supplied: Option<&VersionToken>,
) -> Result<&VersionToken, WriteError> {
    match check_precondition(kind, supplied)? {
        Some(token) => Ok(token),
        None => Err(PreconditionMissing { kind }.into()),
    }
}

fn resolve_absent<T>(kind: MutationKind) -> WriteResult<T> {
    match classify(kind, RecordState::Absent) {
        Decision::Resolved(outcome) => WriteResult::resolved(outcome, None),
        Decision::Apply => WriteResult::not_found(),
    }
}

/// Builds the final result for a write that lost at the classifier or in
/// storage, reloading once to report the winner's token.
///
/// When the record is gone after a lost race, Delete reports `NoOp` and
/// Update reports `NotFound`; Create still reports `Conflict`.
fn reconcile<T, G>(
    gateway: &G,
    kind: MutationKind,
    id: T::Id,
    outcome: MutationOutcome,
) -> WriteOutcome<T>
where
    T: VersionedRecord,
    G: RecordGateway<T> + ?Sized,
{
    if outcome != MutationOutcome::Conflict {
        return Ok(WriteResult::resolved(outcome, None));
    }
    match gateway.load_by_id(id)? {
        Some(current) => Ok(WriteResult::conflict(Some(current.version().clone()))),
        None => Ok(match kind {
            MutationKind::Create => WriteResult::conflict(None),
            MutationKind::Update | MutationKind::Delete => resolve_absent(kind),
        }),
    }
}

fn log_write<T: VersionedRecord>(
    ctx: &WriteContext,
    kind: MutationKind,
    id: &T::Id,
    outcome: MutationOutcome,
    started: Instant,
) {
    let duration_ms = started.elapsed().as_millis();
    if outcome == MutationOutcome::Conflict {
        warn!(
            "event=write_conflict module=service status=conflict entity={} kind={} id={} request_id={} duration_ms={}",
            T::ENTITY,
            kind,
            id,
            ctx.request_label(),
            duration_ms
        );
        return;
    }
    info!(
        "event=write_finished module=service status=ok entity={} kind={} outcome={} id={} request_id={} duration_ms={}",
        T::ENTITY,
        kind,
        outcome,
        id,
        ctx.request_label(),
        duration_ms
    );
}
