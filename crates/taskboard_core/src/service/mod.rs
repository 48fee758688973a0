//! Board use-case services.
//!
//! # Responsibility
//! - Validate caller input, then drive the shared write pipeline per entity.
//! - Emit one domain event per applied write, after commit.
//! - Expose read-side queries without going through the pipeline.
//!
//! # Invariants
//! - Services stay storage-agnostic: they depend on `BoardStore` only.
//! - Notification failures are logged and never change a write outcome.

pub mod board_service;
pub mod pipeline;
pub mod project_service;
pub mod task_service;
pub mod user_service;

use crate::context::WriteContext;
use crate::model::mutation::WriteResult;
use crate::model::record::VersionedRecord;
use crate::notify::{notify, DomainEvent, EventPayload, EventPublisher};

pub use board_service::BoardService;
pub use pipeline::{Change, WriteError, WriteOutcome};
pub use project_service::ProjectService;
pub use task_service::{CreateTaskRequest, MoveTaskRequest, TaskService};
pub use user_service::UserService;

/// Publishes the event built by `payload` when `result` was applied.
fn emit_applied<T, P>(
    publisher: &P,
    ctx: &WriteContext,
    result: &WriteResult<T>,
    payload: impl FnOnce(&T) -> EventPayload,
) where
    T: VersionedRecord,
    P: EventPublisher,
{
    if !result.outcome().is_applied() {
        return;
    }
    if let Some(record) = result.record() {
        let event = DomainEvent::new(ctx, record.project_scope(), payload(record));
        notify(publisher, event);
    }
}
