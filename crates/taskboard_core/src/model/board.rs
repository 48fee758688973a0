//! Project, lane and column aggregates.
//!
//! # Invariants
//! - Lanes and columns always belong to exactly one project.
//! - `sort_order` is non-negative; ties are broken by id at read time.

use crate::model::member::UserId;
use crate::model::record::{ProjectId, VersionedRecord};
use crate::model::version::VersionToken;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type LaneId = Uuid;
pub type ColumnId = Uuid;

/// Top-level tenant scope for one board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    /// User who created the project.
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub version: VersionToken,
}

impl Project {
    /// Creates an unsaved project with a generated id.
    pub fn new(owner_id: UserId, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            description,
            version: VersionToken::empty(),
        }
    }
}

impl VersionedRecord for Project {
    type Id = ProjectId;
    const ENTITY: &'static str = "project";

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
        Some(self.id)
    }
}

/// Horizontal swimlane of a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lane {
    pub id: LaneId,
    pub project_id: ProjectId,
    pub name: String,
    pub sort_order: i64,
    pub version: VersionToken,
}

impl Lane {
    pub fn new(project_id: ProjectId, name: impl Into<String>, sort_order: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            sort_order,
            version: VersionToken::empty(),
        }
    }
}

impl VersionedRecord for Lane {
    type Id = LaneId;
    const ENTITY: &'static str = "lane";

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

/// Vertical workflow stage of a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub project_id: ProjectId,
    pub name: String,
    pub sort_order: i64,
    /// Optional work-in-progress cap. Advisory only; not enforced on moves.
    pub wip_limit: Option<u32>,
    pub version: VersionToken,
}

impl Column {
    pub fn new(project_id: ProjectId, name: impl Into<String>, sort_order: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            sort_order,
            wip_limit: None,
            version: VersionToken::empty(),
        }
    }
}

impl VersionedRecord for Column {
    type Id = ColumnId;
    const ENTITY: &'static str = "column";

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
