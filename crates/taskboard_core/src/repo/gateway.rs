//! Persistence gateway contracts used by the write pipeline.
//!
//! # Responsibility
//! - Define load-by-id and atomic conditional-save for every aggregate.
//! - Define read-side list queries used by services.
//!
//! # Invariants
//! - `load_by_id` never returns tombstoned rows.
//! - `conditional_save` re-checks the stored version inside storage; a lost
//!   race is reported as `SaveOutcome::Conflict`, never as an error.
//! - A cancelled save leaves persisted state untouched.

use crate::context::{CancellationSignal, Cancelled};
use crate::db::DbError;
use crate::model::board::{Column, ColumnId, Lane, LaneId, Project};
use crate::model::member::{ProjectMember, User, UserId};
use crate::model::mutation::MutationKind;
use crate::model::record::{ProjectId, VersionedRecord};
use crate::model::task::{TaskAssignment, TaskId, TaskItem, TaskNote};
use crate::model::version::VersionToken;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for board persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// Update/Delete save was called without an expected version.
    MissingExpectedVersion { entity: &'static str },
    /// Save stopped before commit; nothing was persisted.
    Cancelled(Cancelled),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
}

impl RepoError {
    /// Whether the failure means storage is unreachable or contended.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Db(err) => err.is_unavailable(),
            _ => false,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted board data: {message}"),
            Self::MissingExpectedVersion { entity } => {
                write!(f, "conditional save of {entity} requires an expected version")
            }
            Self::Cancelled(reason) => write!(f, "{reason}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "board repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "board repository requires table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Cancelled(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<Cancelled> for RepoError {
    fn from(value: Cancelled) -> Self {
        Self::Cancelled(value)
    }
}

/// Storage-level verdict of one conditional save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Write committed; carries the newly issued token.
    Saved(VersionToken),
    /// Stored version no longer matched, or the id is already taken.
    Conflict,
}

/// Verdict of an atomic project-plus-owner insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSave {
    /// Both rows committed together.
    Saved {
        project: VersionToken,
        owner: VersionToken,
    },
    /// One of the ids is already taken; neither row was written.
    Conflict,
}

/// Load and compare-and-swap contract for one aggregate type.
pub trait RecordGateway<T: VersionedRecord> {
    /// Loads one active record.
    fn load_by_id(&self, id: T::Id) -> RepoResult<Option<T>>;

    /// Persists `record` only if the stored version still equals `expected`.
    ///
    /// - `Create`: inserts; `expected` is ignored.
    /// - `Update`: replaces mutable fields of the active row.
    /// - `Delete`: tombstones the row and its dependents.
    fn conditional_save(
        &self,
        record: &T,
        expected: Option<&VersionToken>,
        kind: MutationKind,
        cancel: &CancellationSignal,
    ) -> RepoResult<SaveOutcome>;
}

/// Writes spanning more than one aggregate in a single transaction.
pub trait ProjectCreation {
    /// Inserts `project` and its `owner` membership together.
    ///
    /// Cancellation or any failure before commit leaves neither row behind.
    fn create_project_with_owner(
        &self,
        project: &Project,
        owner: &ProjectMember,
        cancel: &CancellationSignal,
    ) -> RepoResult<ProjectSave>;
}

/// Filters for task listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListQuery {
    pub project_id: ProjectId,
    pub lane_id: Option<LaneId>,
    pub column_id: Option<ColumnId>,
}

impl TaskListQuery {
    pub fn for_project(project_id: ProjectId) -> Self {
        Self {
            project_id,
            ..Self::default()
        }
    }
}

/// Read-side queries. Reads take no locks and see committed state only.
pub trait BoardQueries {
    fn list_projects(&self) -> RepoResult<Vec<Project>>;
    fn list_members(&self, project_id: ProjectId) -> RepoResult<Vec<ProjectMember>>;
    fn find_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> RepoResult<Option<ProjectMember>>;
    fn list_lanes(&self, project_id: ProjectId) -> RepoResult<Vec<Lane>>;
    fn list_columns(&self, project_id: ProjectId) -> RepoResult<Vec<Column>>;
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<TaskItem>>;
    fn list_notes(&self, task_id: TaskId) -> RepoResult<Vec<TaskNote>>;
    fn list_assignments(&self, task_id: TaskId) -> RepoResult<Vec<TaskAssignment>>;
    /// Next free lane order key in a project.
    fn next_lane_order(&self, project_id: ProjectId) -> RepoResult<i64>;
    /// Next free column order key in a project.
    fn next_column_order(&self, project_id: ProjectId) -> RepoResult<i64>;
    /// Next free task order key in one (lane, column) cell.
    fn next_task_order(&self, lane_id: LaneId, column_id: ColumnId) -> RepoResult<i64>;
}

/// Everything the board services need from storage.
pub trait BoardStore:
    RecordGateway<User>
    + RecordGateway<Project>
    + RecordGateway<ProjectMember>
    + RecordGateway<Lane>
    + RecordGateway<Column>
    + RecordGateway<TaskItem>
    + RecordGateway<TaskNote>
    + RecordGateway<TaskAssignment>
    + ProjectCreation
    + BoardQueries
{
}

impl<S> BoardStore for S where
    S: RecordGateway<User>
        + RecordGateway<Project>
        + RecordGateway<ProjectMember>
        + RecordGateway<Lane>
        + RecordGateway<Column>
        + RecordGateway<TaskItem>
        + RecordGateway<TaskNote>
        + RecordGateway<TaskAssignment>
        + ProjectCreation
        + BoardQueries
{
}
