//! Domain model for the task board write pipeline.
//!
//! # Responsibility
//! - Define the versioned aggregates (users, projects, lanes, columns,
//!   tasks, notes, assignments, memberships).
//! - Define version tokens and the mutation outcome classifier.
//!
//! # Invariants
//! - Every aggregate is identified by a stable v4 UUID.
//! - Every aggregate carries the `VersionToken` of its last persisted write.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod board;
pub mod member;
pub mod mutation;
pub mod record;
pub mod task;
pub mod version;
