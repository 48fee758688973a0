//! Mutation intent, outcome classification and write results.
//!
//! # Responsibility
//! - Map one observed record state to exactly one write decision.
//! - Carry the per-request write result back to the transport layer.
//!
//! # Invariants
//! - Token mismatch is evaluated before no-op detection.
//! - A `WriteResult` carries a new token only for Created/Updated/Deleted.
//! - Conflict/NotFound/NoOp are values, never errors.

use crate::model::version::VersionToken;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Caller's declared write intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl Display for MutationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six possible results of one write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    Created,
    Updated,
    Deleted,
    NoOp,
    NotFound,
    Conflict,
}

impl MutationOutcome {
    /// Successful outcome for an applied write of `kind`.
    pub fn applied(kind: MutationKind) -> Self {
        match kind {
            MutationKind::Create => Self::Created,
            MutationKind::Update => Self::Updated,
            MutationKind::Delete => Self::Deleted,
        }
    }

    /// Whether persisted state changed.
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::NoOp => "no_op",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
        }
    }
}

impl Display for MutationOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record state observed at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// No active record with the requested id.
    Absent,
    /// Active record exists.
    Present {
        /// Supplied token equals the stored token.
        token_matches: bool,
        /// Requested change leaves the record as it is.
        change_is_noop: bool,
    },
}

/// Classifier verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Write attempt ends here without touching storage.
    Resolved(MutationOutcome),
    /// Proceed to the conditional save.
    Apply,
}

/// Classifies one write attempt.
///
/// Create treats an absent record as the normal path and an already-taken
/// id as a conflict. Update/Delete follow absent → mismatch → no-op → apply.
pub fn classify(kind: MutationKind, state: RecordState) -> Decision {
    match (kind, state) {
        (MutationKind::Create, RecordState::Absent) => Decision::Apply,
        (MutationKind::Create, RecordState::Present { .. }) => {
            Decision::Resolved(MutationOutcome::Conflict)
        }
        (MutationKind::Delete, RecordState::Absent) => Decision::Resolved(MutationOutcome::NoOp),
        (MutationKind::Update, RecordState::Absent) => {
            Decision::Resolved(MutationOutcome::NotFound)
        }
        (
            _,
            RecordState::Present {
                token_matches: false,
                ..
            },
        ) => Decision::Resolved(MutationOutcome::Conflict),
        (
            _,
            RecordState::Present {
                change_is_noop: true,
                ..
            },
        ) => Decision::Resolved(MutationOutcome::NoOp),
        (_, RecordState::Present { .. }) => Decision::Apply,
    }
}

/// Outcome of one write plus the values the transport needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult<T> {
    outcome: MutationOutcome,
    version: Option<VersionToken>,
    record: Option<T>,
    current_version: Option<VersionToken>,
}

impl<T> WriteResult<T> {
    pub fn created(record: T, version: VersionToken) -> Self {
        Self {
            outcome: MutationOutcome::Created,
            version: Some(version),
            record: Some(record),
            current_version: None,
        }
    }

    pub fn updated(record: T, version: VersionToken) -> Self {
        Self {
            outcome: MutationOutcome::Updated,
            version: Some(version),
            record: Some(record),
            current_version: None,
        }
    }

    /// `record` is the last active state before the tombstone.
    pub fn deleted(record: T, version: VersionToken) -> Self {
        Self {
            outcome: MutationOutcome::Deleted,
            version: Some(version),
            record: Some(record),
            current_version: None,
        }
    }

    pub fn no_op() -> Self {
        Self::bare(MutationOutcome::NoOp)
    }

    pub fn not_found() -> Self {
        Self::bare(MutationOutcome::NotFound)
    }

    /// Conflict carrying the stored token when it is still known.
    pub fn conflict(current_version: Option<VersionToken>) -> Self {
        Self {
            outcome: MutationOutcome::Conflict,
            version: None,
            record: None,
            current_version,
        }
    }

    /// Result for a write that stopped at the classifier.
    pub fn resolved(outcome: MutationOutcome, current_version: Option<VersionToken>) -> Self {
        match outcome {
            MutationOutcome::Conflict => Self::conflict(current_version),
            other => Self::bare(other),
        }
    }

    fn bare(outcome: MutationOutcome) -> Self {
        Self {
            outcome,
            version: None,
            record: None,
            current_version: None,
        }
    }

    pub fn outcome(&self) -> MutationOutcome {
        self.outcome
    }

    /// Token issued by this write (Created/Updated/Deleted only).
    pub fn version(&self) -> Option<&VersionToken> {
        self.version.as_ref()
    }

    /// Record touched by this write; for Deleted, the pre-tombstone state.
    pub fn record(&self) -> Option<&T> {
        self.record.as_ref()
    }

    pub fn into_record(self) -> Option<T> {
        self.record
    }

    /// Stored token at the time a conflict was detected.
    pub fn current_version(&self) -> Option<&VersionToken> {
        self.current_version.as_ref()
    }

    /// Maps the carried record, keeping outcome and tokens.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WriteResult<U> {
        WriteResult {
            outcome: self.outcome,
            version: self.version,
            record: self.record.map(f),
            current_version: self.current_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, Decision, MutationKind, MutationOutcome, RecordState};

    fn present(token_matches: bool, change_is_noop: bool) -> RecordState {
        RecordState::Present {
            token_matches,
            change_is_noop,
        }
    }

    #[test]
    fn absent_record_is_noop_for_delete_and_not_found_for_update() {
        assert_eq!(
            classify(MutationKind::Delete, RecordState::Absent),
            Decision::Resolved(MutationOutcome::NoOp)
        );
        assert_eq!(
            classify(MutationKind::Update, RecordState::Absent),
            Decision::Resolved(MutationOutcome::NotFound)
        );
    }

    #[test]
    fn mismatch_wins_over_noop_for_every_kind() {
        for kind in [MutationKind::Update, MutationKind::Delete] {
            assert_eq!(
                classify(kind, present(false, true)),
                Decision::Resolved(MutationOutcome::Conflict)
            );
        }
    }

    #[test]
    fn matching_noop_is_resolved_without_write() {
        assert_eq!(
            classify(MutationKind::Update, present(true, true)),
            Decision::Resolved(MutationOutcome::NoOp)
        );
        assert_eq!(
            classify(MutationKind::Update, present(true, false)),
            Decision::Apply
        );
    }

    #[test]
    fn create_applies_only_when_id_is_free() {
        assert_eq!(
            classify(MutationKind::Create, RecordState::Absent),
            Decision::Apply
        );
        assert_eq!(
            classify(MutationKind::Create, present(true, false)),
            Decision::Resolved(MutationOutcome::Conflict)
        );
    }
}
