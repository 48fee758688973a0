//! Users and project memberships.

use crate::model::record::{ProjectId, VersionedRecord};
use crate::model::version::VersionToken;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type UserId = Uuid;
pub type MemberId = Uuid;

/// Account that can own projects and be assigned to tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Login identity, stored lowercase.
    pub email: String,
    pub display_name: String,
    pub version: VersionToken,
}

impl User {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            display_name: display_name.into(),
            version: VersionToken::empty(),
        }
    }
}

impl VersionedRecord for User {
    type Id = UserId;
    const ENTITY: &'static str = "user";

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
        None
    }
}

/// Access level of one user inside one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    Owner,
    Editor,
    Viewer,
}

impl ProjectRole {
    pub const ALL: [ProjectRole; 3] = [Self::Owner, Self::Editor, Self::Viewer];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
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

impl Display for ProjectRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership link between a user and a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub id: MemberId,
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub role: ProjectRole,
    pub version: VersionToken,
}

impl ProjectMember {
    pub fn new(project_id: ProjectId, user_id: UserId, role: ProjectRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            user_id,
            role,
            version: VersionToken::empty(),
        }
    }
}

impl VersionedRecord for ProjectMember {
    type Id = MemberId;
    const ENTITY: &'static str = "project_member";

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
