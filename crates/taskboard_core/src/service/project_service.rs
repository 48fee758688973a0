//! Project and membership service.
//!
//! # Invariants
//! - Creating a project also adds the creator as an `owner` member, in the
//!   same transaction as the project row.
//! - A user holds at most one active membership per project; a duplicate is
//!   reported as `Conflict`.
//! - Deleting a project tombstones everything scoped to it.

use crate::context::WriteContext;
use crate::model::board::Project;
use crate::model::member::{MemberId, ProjectMember, ProjectRole, User, UserId};
use crate::model::mutation::WriteResult;
use crate::model::record::{ProjectId, VersionedRecord};
use crate::model::version::VersionToken;
use crate::notify::{EventPayload, EventPublisher};
use crate::repo::gateway::{BoardStore, ProjectSave, RecordGateway, RepoResult, SaveOutcome};
use crate::service::emit_applied;
use crate::service::pipeline::{
    execute_create, execute_create_with, execute_delete, execute_update, Change, WriteOutcome,
};
use crate::validation::{ensure_valid, rules, ValidationErrors};

/// Use-case service for projects and their members.
pub struct ProjectService<S: BoardStore, P: EventPublisher> {
    store: S,
    publisher: P,
}

impl<S: BoardStore, P: EventPublisher> ProjectService<S, P> {
    pub fn new(store: S, publisher: P) -> Self {
        Self { store, publisher }
    }

    /// Creates a project owned by the acting user.
    ///
    /// Returns `NotFound` when the acting user does not exist.
    pub fn create_project(
        &self,
        ctx: &WriteContext,
        name: &str,
        description: Option<&str>,
    ) -> WriteOutcome<Project> {
        let mut violations = rules::name("name", name, rules::PROJECT_NAME_MAX);
        violations.extend(rules::optional_text(
            "description",
            description,
            rules::DESCRIPTION_MAX,
        ));
        ensure_valid(violations)?;
        ctx.cancel.check()?;

        if RecordGateway::<User>::load_by_id(&self.store, ctx.actor_id)?.is_none() {
            return Ok(WriteResult::not_found());
        }

        let project = Project::new(
            ctx.actor_id,
            rules::normalize_name(name),
            rules::normalize_optional_text(description),
        );
        let owner = ProjectMember::new(project.id, ctx.actor_id, ProjectRole::Owner);
        let mut owner_version = None;
        let result = execute_create_with(&self.store, ctx, project, |project, cancel| {
            Ok(
                match self.store.create_project_with_owner(project, &owner, cancel)? {
                    ProjectSave::Saved {
                        project,
                        owner: owner_token,
                    } => {
                        owner_version = Some(owner_token);
                        SaveOutcome::Saved(project)
                    }
                    ProjectSave::Conflict => SaveOutcome::Conflict,
                },
            )
        })?;

        emit_applied(&self.publisher, ctx, &result, |project| {
            EventPayload::ProjectCreated {
                project_id: project.id,
                name: project.name.clone(),
            }
        });
        if let Some(version) = owner_version {
            let membership = WriteResult::created(owner.with_version(version.clone()), version);
            emit_member_added(&self.publisher, ctx, &membership);
        }
        Ok(result)
    }

    pub fn rename_project(
        &self,
        ctx: &WriteContext,
        project_id: ProjectId,
        supplied: Option<&VersionToken>,
        name: &str,
    ) -> WriteOutcome<Project> {
        ensure_valid(rules::name("name", name, rules::PROJECT_NAME_MAX))?;
        let name = rules::normalize_name(name);

        let result =
            execute_update::<Project, _, _>(&self.store, ctx, project_id, supplied, |current| {
                let mut next = current.clone();
                next.name = name;
                Change::compare(current, next)
            })?;
        self.emit_project_updated(ctx, &result);
        Ok(result)
    }

    /// Replaces the description; blank input clears it.
    pub fn update_project_description(
        &self,
        ctx: &WriteContext,
        project_id: ProjectId,
        supplied: Option<&VersionToken>,
        description: Option<&str>,
    ) -> WriteOutcome<Project> {
        ensure_valid(rules::optional_text(
            "description",
            description,
            rules::DESCRIPTION_MAX,
        ))?;
        let description = rules::normalize_optional_text(description);

        let result =
            execute_update::<Project, _, _>(&self.store, ctx, project_id, supplied, |current| {
                let mut next = current.clone();
                next.description = description;
                Change::compare(current, next)
            })?;
        self.emit_project_updated(ctx, &result);
        Ok(result)
    }

    pub fn delete_project(
        &self,
        ctx: &WriteContext,
        project_id: ProjectId,
        supplied: Option<&VersionToken>,
    ) -> WriteOutcome<Project> {
        let result = execute_delete::<Project, _>(&self.store, ctx, project_id, supplied)?;
        emit_applied(&self.publisher, ctx, &result, |project| {
            EventPayload::ProjectDeleted {
                project_id: project.id,
            }
        });
        Ok(result)
    }

    pub fn get_project(&self, project_id: ProjectId) -> RepoResult<Option<Project>> {
        RecordGateway::<Project>::load_by_id(&self.store, project_id)
    }

    /// Active projects sorted by name.
    pub fn list_projects(&self) -> RepoResult<Vec<Project>> {
        self.store.list_projects()
    }

    /// Adds `user_id` to the project with the given role name.
    pub fn add_member(
        &self,
        ctx: &WriteContext,
        project_id: ProjectId,
        user_id: UserId,
        role: &str,
    ) -> WriteOutcome<ProjectMember> {
        let role = rules::project_role("role", role).map_err(ValidationErrors::from)?;
        ctx.cancel.check()?;

        if RecordGateway::<Project>::load_by_id(&self.store, project_id)?.is_none()
            || RecordGateway::<User>::load_by_id(&self.store, user_id)?.is_none()
        {
            return Ok(WriteResult::not_found());
        }
        if let Some(existing) = self.store.find_member(project_id, user_id)? {
            return Ok(WriteResult::conflict(Some(existing.version)));
        }

        let member = ProjectMember::new(project_id, user_id, role);
        let result = execute_create(&self.store, ctx, member)?;
        emit_member_added(&self.publisher, ctx, &result);
        Ok(result)
    }

    pub fn change_member_role(
        &self,
        ctx: &WriteContext,
        member_id: MemberId,
        supplied: Option<&VersionToken>,
        role: &str,
    ) -> WriteOutcome<ProjectMember> {
        let role = rules::project_role("role", role).map_err(ValidationErrors::from)?;

        let result = execute_update::<ProjectMember, _, _>(
            &self.store,
            ctx,
            member_id,
            supplied,
            |current| {
                let mut next = current.clone();
                next.role = role;
                Change::compare(current, next)
            },
        )?;
        emit_applied(&self.publisher, ctx, &result, |member| {
            EventPayload::MemberRoleChanged {
                member_id: member.id,
                role: member.role,
            }
        });
        Ok(result)
    }

    pub fn remove_member(
        &self,
        ctx: &WriteContext,
        member_id: MemberId,
        supplied: Option<&VersionToken>,
    ) -> WriteOutcome<ProjectMember> {
        let result = execute_delete::<ProjectMember, _>(&self.store, ctx, member_id, supplied)?;
        emit_applied(&self.publisher, ctx, &result, |member| {
            EventPayload::MemberRemoved {
                member_id: member.id,
                user_id: member.user_id,
            }
        });
        Ok(result)
    }

    pub fn list_members(&self, project_id: ProjectId) -> RepoResult<Vec<ProjectMember>> {
        self.store.list_members(project_id)
    }

    fn emit_project_updated(&self, ctx: &WriteContext, result: &WriteResult<Project>) {
        emit_applied(&self.publisher, ctx, result, |project| {
            EventPayload::ProjectUpdated {
                project_id: project.id,
            }
        });
    }
}

fn emit_member_added<P: EventPublisher>(
    publisher: &P,
    ctx: &WriteContext,
    result: &WriteResult<ProjectMember>,
) {
    emit_applied(publisher, ctx, result, |member| EventPayload::MemberAdded {
        member_id: member.id,
        user_id: member.user_id,
        role: member.role,
    });
}
