//! Domain events emitted after committed writes.
//!
//! # Responsibility
//! - Describe each applied mutation as one tagged event with a fixed payload.
//! - Deliver events through the `EventPublisher` seam.
//!
//! # Invariants
//! - Events are built only for Created/Updated/Deleted outcomes, after commit.
//! - A failed publish never changes the outcome of the write that caused it.

pub mod publisher;

use crate::context::WriteContext;
use crate::model::board::{ColumnId, LaneId};
use crate::model::member::{MemberId, ProjectRole, UserId};
use crate::model::record::ProjectId;
use crate::model::task::{AssignmentId, AssignmentRole, NoteId, TaskId};
use crate::repo::gateway::RepoError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub use publisher::{ChannelPublisher, EventPublisher, InMemoryPublisher, NoopPublisher};

/// One committed change, as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Owning project; `None` for account-level events.
    pub project_id: Option<ProjectId>,
    pub actor_id: UserId,
    pub request_id: Option<String>,
    /// Epoch milliseconds at event construction.
    pub occurred_at_ms: i64,
    pub payload: EventPayload,
}

impl DomainEvent {
    pub fn new(ctx: &WriteContext, project_id: Option<ProjectId>, payload: EventPayload) -> Self {
        Self {
            project_id,
            actor_id: ctx.actor_id,
            request_id: ctx.request_id.clone(),
            occurred_at_ms: now_epoch_ms(),
            payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

/// Event-specific data, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    UserCreated {
        user_id: UserId,
        email: String,
    },
    UserRenamed {
        user_id: UserId,
        display_name: String,
    },
    ProjectCreated {
        project_id: ProjectId,
        name: String,
    },
    ProjectUpdated {
        project_id: ProjectId,
    },
    ProjectDeleted {
        project_id: ProjectId,
    },
    MemberAdded {
        member_id: MemberId,
        user_id: UserId,
        role: ProjectRole,
    },
    MemberRoleChanged {
        member_id: MemberId,
        role: ProjectRole,
    },
    MemberRemoved {
        member_id: MemberId,
        user_id: UserId,
    },
    LaneCreated {
        lane_id: LaneId,
        name: String,
    },
    LaneUpdated {
        lane_id: LaneId,
    },
    LaneDeleted {
        lane_id: LaneId,
    },
    ColumnCreated {
        column_id: ColumnId,
        name: String,
    },
    ColumnUpdated {
        column_id: ColumnId,
    },
    ColumnDeleted {
        column_id: ColumnId,
    },
    TaskCreated {
        task_id: TaskId,
        title: String,
    },
    TaskUpdated {
        task_id: TaskId,
    },
    TaskMoved {
        task_id: TaskId,
        lane_id: LaneId,
        column_id: ColumnId,
        sort_order: i64,
    },
    TaskDeleted {
        task_id: TaskId,
    },
    NoteAdded {
        note_id: NoteId,
        task_id: TaskId,
    },
    NoteEdited {
        note_id: NoteId,
    },
    NoteDeleted {
        note_id: NoteId,
    },
    TaskAssigned {
        assignment_id: AssignmentId,
        task_id: TaskId,
        user_id: UserId,
        role: AssignmentRole,
    },
    AssignmentRoleChanged {
        assignment_id: AssignmentId,
        role: AssignmentRole,
    },
    AssignmentRemoved {
        assignment_id: AssignmentId,
    },
}

impl EventPayload {
    /// Stable event name, identical to the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserCreated { .. } => "user_created",
            Self::UserRenamed { .. } => "user_renamed",
            Self::ProjectCreated { .. } => "project_created",
            Self::ProjectUpdated { .. } => "project_updated",
            Self::ProjectDeleted { .. } => "project_deleted",
            Self::MemberAdded { .. } => "member_added",
            Self::MemberRoleChanged { .. } => "member_role_changed",
            Self::MemberRemoved { .. } => "member_removed",
            Self::LaneCreated { .. } => "lane_created",
            Self::LaneUpdated { .. } => "lane_updated",
            Self::LaneDeleted { .. } => "lane_deleted",
            Self::ColumnCreated { .. } => "column_created",
            Self::ColumnUpdated { .. } => "column_updated",
            Self::ColumnDeleted { .. } => "column_deleted",
            Self::TaskCreated { .. } => "task_created",
            Self::TaskUpdated { .. } => "task_updated",
            Self::TaskMoved { .. } => "task_moved",
            Self::TaskDeleted { .. } => "task_deleted",
            Self::NoteAdded { .. } => "note_added",
            Self::NoteEdited { .. } => "note_edited",
            Self::NoteDeleted { .. } => "note_deleted",
            Self::TaskAssigned { .. } => "task_assigned",
            Self::AssignmentRoleChanged { .. } => "assignment_role_changed",
            Self::AssignmentRemoved { .. } => "assignment_removed",
        }
    }
}

/// Delivery failure reported by a publisher.
#[derive(Debug)]
pub enum PublishError {
    /// Receiving side of a channel publisher is gone.
    ChannelClosed,
    /// Event could not be serialized for a sink.
    Encode(serde_json::Error),
    /// Persistent sink rejected the event.
    Storage(RepoError),
    /// Sink-specific failure.
    Rejected(String),
}

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChannelClosed => write!(f, "event channel is closed"),
            Self::Encode(err) => write!(f, "failed to encode event: {err}"),
            Self::Storage(err) => write!(f, "failed to store event: {err}"),
            Self::Rejected(message) => write!(f, "event rejected: {message}"),
        }
    }
}

impl Error for PublishError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

impl From<RepoError> for PublishError {
    fn from(value: RepoError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for PublishError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(RepoError::from(value))
    }
}

/// Publishes `event` and swallows delivery failures after logging them.
pub fn notify<P: EventPublisher + ?Sized>(publisher: &P, event: DomainEvent) {
    let kind = event.kind();
    match publisher.publish(&event) {
        Ok(()) => debug!("event=event_published module=notify status=ok kind={kind}"),
        Err(err) => warn!(
            "event=event_publish_failed module=notify status=error kind={} error={}",
            kind, err
        ),
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{DomainEvent, EventPayload};
    use crate::context::WriteContext;
    use uuid::Uuid;

    #[test]
    fn payload_serializes_with_type_tag_matching_kind() {
        let payload = EventPayload::LaneDeleted {
            lane_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&payload).expect("payload should serialize");
        assert_eq!(json["type"], payload.kind());
        assert_eq!(json["lane_id"], Uuid::nil().to_string());
    }

    #[test]
    fn event_carries_actor_and_request_from_context() {
        let actor = Uuid::new_v4();
        let ctx = WriteContext::new(actor).with_request_id("req-7");
        let event = DomainEvent::new(
            &ctx,
            None,
            EventPayload::UserRenamed {
                user_id: actor,
                display_name: "Ada".to_string(),
            },
        );
        assert_eq!(event.actor_id, actor);
        assert_eq!(event.request_id.as_deref(), Some("req-7"));
        assert_eq!(event.kind(), "user_renamed");
        assert!(event.occurred_at_ms > 0);
    }
}
