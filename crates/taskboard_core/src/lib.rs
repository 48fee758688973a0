//! Core domain logic for the task board.
//! This crate is the single source of truth for board write invariants:
//! version preconditions, outcome classification and response translation.

pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;
pub mod transport;
pub mod validation;

pub use config::{ConfigError, CoreConfig};
pub use context::{CancellationSignal, Cancelled, WriteContext};
pub use db::{open_db, open_db_in_memory, open_db_with_config, DbError, DbResult};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::board::{Column, ColumnId, Lane, LaneId, Project};
pub use model::member::{MemberId, ProjectMember, ProjectRole, User, UserId};
pub use model::mutation::{MutationKind, MutationOutcome, WriteResult};
pub use model::record::{ProjectId, VersionedRecord};
pub use model::task::{
    AssignmentId, AssignmentRole, NoteId, TaskAssignment, TaskId, TaskItem, TaskNote,
};
pub use model::version::{PreconditionMissing, TokenParseError, VersionToken};
pub use notify::{DomainEvent, EventPayload, EventPublisher, PublishError};
pub use repo::{
    ActivityEntry, BoardStore, RecordGateway, RepoError, RepoResult, SqliteActivityLog,
    SqliteBoardStore, TaskListQuery,
};
pub use service::{
    BoardService, CreateTaskRequest, MoveTaskRequest, ProjectService, TaskService, UserService,
    WriteError, WriteOutcome,
};
pub use transport::{ResponseBody, ResponsePreference, TransportResponse};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
