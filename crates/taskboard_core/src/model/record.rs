//! Common shape of every versioned aggregate.

use crate::model::version::VersionToken;
use std::fmt::Display;
use uuid::Uuid;

/// Project scope id shared by all board aggregates.
pub type ProjectId = Uuid;

/// Aggregate that participates in optimistic-concurrency writes.
pub trait VersionedRecord: Clone {
    /// Record identifier type.
    type Id: Copy + Eq + Display;

    /// Stable entity label used in logs (`task`, `lane`, ...).
    const ENTITY: &'static str;

    fn id(&self) -> Self::Id;

    /// Token of the last persisted write.
    fn version(&self) -> &VersionToken;

    /// Replaces the token after a successful save.
    fn set_version(&mut self, version: VersionToken);

    /// Project the record belongs to, when it is project-scoped.
    fn project_scope(&self) -> Option<ProjectId>;

    /// Consumes the record and returns it stamped with `version`.
    fn with_version(mut self, version: VersionToken) -> Self {
        self.set_version(version);
        self
    }
}
