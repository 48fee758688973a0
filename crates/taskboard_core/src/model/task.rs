//! Task items with their notes and assignments.
//!
//! # Invariants
//! - A task sits in exactly one (lane, column) cell of its project.
//! - Notes and assignments inherit the project scope of their task.

use crate::model::board::{ColumnId, LaneId};
use crate::model::member::UserId;
use crate::model::record::{ProjectId, VersionedRecord};
use crate::model::version::VersionToken;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type TaskId = Uuid;
pub type NoteId = Uuid;
pub type AssignmentId = Uuid;

/// Card on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub lane_id: LaneId,
    pub column_id: ColumnId,
    pub title: String,
    pub description: Option<String>,
    /// Order within the (lane, column) cell.
    pub sort_order: i64,
    pub version: VersionToken,
}

impl TaskItem {
    pub fn new(
        project_id: ProjectId,
        lane_id: LaneId,
        column_id: ColumnId,
        title: impl Into<String>,
        sort_order: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            lane_id,
            column_id,
            title: title.into(),
            description: None,
            sort_order,
            version: VersionToken::empty(),
        }
    }

    /// Whether the task already sits at the given board position.
    pub fn is_at(&self, lane_id: LaneId, column_id: ColumnId, sort_order: i64) -> bool {
        self.lane_id == lane_id && self.column_id == column_id && self.sort_order == sort_order
    }
}

impl VersionedRecord for TaskItem {
    type Id = TaskId;
    const ENTITY: &'static str = "task";

    fn id(&self) -> Self::Id {
        self.id
    }

    fn version(&self) -> &VersionToken {
        &self.version
    }

    fn set_version(&mut self, version: VersionToken) {
        self.version = version;
    }

    fn project_scope(&self) -> Option<ProjectId> {
        Some(self.project_id)
    }
}

/// Free-form comment attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNote {
    pub id: NoteId,
    pub project_id: ProjectId,
    pub task_id: TaskId,
    pub author_id: UserId,
    pub body: String,
    pub version: VersionToken,
}

impl TaskNote {
    pub fn new(
        project_id: ProjectId,
        task_id: TaskId,
        author_id: UserId,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            task_id,
            author_id,
            body: body.into(),
            version: VersionToken::empty(),
        }
    }
}

impl VersionedRecord for TaskNote {
    type Id = NoteId;
    const ENTITY: &'static str = "task_note";

    fn id(&self) -> Self::Id {
        self.id
    }

    fn version(&self) -> &VersionToken {
        &self.version
    }

    fn set_version(&mut self, version: VersionToken) {
        self.version = version;
    }

    fn project_scope(&self) -> Option<ProjectId> {
        Some(self.project_id)
    }
}

/// Responsibility of an assigned user on one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRole {
    Owner,
    Contributor,
    Reviewer,
}

impl AssignmentRole {
    pub const ALL: [AssignmentRole; 3] = [Self::Owner, Self::Contributor, Self::Reviewer];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Contributor => "contributor",
            Self::Reviewer => "reviewer",
        }
    }

    /// Parses the stable wire/storage name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
    }
}

impl Display for AssignmentRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User assigned to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub id: AssignmentId,
    pub project_id: ProjectId,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub role: AssignmentRole,
    pub version: VersionToken,
}

impl TaskAssignment {
    pub fn new(
        project_id: ProjectId,
        task_id: TaskId,
        user_id: UserId,
        role: AssignmentRole,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            task_id,
            user_id,
            role,
            version: VersionToken::empty(),
        }
    }
}

impl VersionedRecord for TaskAssignment {
    type Id = AssignmentId;
    const ENTITY: &'static str = "task_assignment";

    fn id(&self) -> Self::Id {
        self.id
    }

    fn version(&self) -> &VersionToken {
        &self.version
    }

    fn set_version(&mut self, version: VersionToken) {
        self.version = version;
    }

    fn project_scope(&self) -> Option<ProjectId> {
        Some(self.project_id)
    }
}
