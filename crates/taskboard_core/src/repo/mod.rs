//! Repository layer: gateway contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the load/conditional-save contract the write pipeline relies on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Conditional saves compare the stored version inside one IMMEDIATE
//!   transaction; a mismatch is a `SaveOutcome::Conflict`, not an error.
//! - Tombstoned rows are invisible to every read.

pub mod activity_repo;
pub mod board_repo;
pub mod gateway;
pub mod member_repo;
mod sql;
pub mod task_repo;

pub use activity_repo::{ActivityEntry, SqliteActivityLog};
pub use board_repo::SqliteBoardStore;
pub use gateway::{
    BoardQueries, BoardStore, ProjectCreation, ProjectSave, RecordGateway, RepoError, RepoResult,
    SaveOutcome, TaskListQuery,
};
