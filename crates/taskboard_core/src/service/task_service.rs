//! Task, note and assignment service.
//!
//! # Responsibility
//! - Create, edit, move and delete tasks on a project board.
//! - Manage task notes and user assignments.
//!
//! # Invariants
//! - A task's lane and column always belong to the task's project; a create
//!   or move naming a foreign or missing lane/column is `NotFound`.
//! - Moving a task to its current cell and order is a no-op.
//! - A user holds at most one active assignment per task.

use crate::context::WriteContext;
use crate::model::board::{Column, ColumnId, Lane, LaneId, Project};
use crate::model::member::{User, UserId};
use crate::model::mutation::{MutationKind, WriteResult};
use crate::model::record::ProjectId;
use crate::model::task::{
    AssignmentId, NoteId, TaskAssignment, TaskId, TaskItem, TaskNote,
};
use crate::model::version::{check_precondition, VersionToken};
use crate::notify::{EventPayload, EventPublisher};
use crate::repo::gateway::{BoardStore, RecordGateway, RepoResult, TaskListQuery};
use crate::service::emit_applied;
use crate::service::pipeline::{
    execute_create, execute_delete, execute_update, Change, WriteOutcome,
};
use crate::validation::{ensure_valid, rules, ValidationErrors};

/// Input for `create_task`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    pub project_id: ProjectId,
    pub lane_id: LaneId,
    pub column_id: ColumnId,
    pub title: String,
    pub description: Option<String>,
    /// Order inside the target cell; appended when `None`.
    pub sort_order: Option<i64>,
}

/// Target position for `move_task`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveTaskRequest {
    pub lane_id: LaneId,
    pub column_id: ColumnId,
    /// Order inside the target cell. When `None`, a move within the same
    /// cell keeps the current order and a move to another cell appends.
    pub sort_order: Option<i64>,
}

impl MoveTaskRequest {
    /// Order key the task ends up with when moved from `current`.
    ///
    /// `append_order` is the next free key of the target cell.
    pub fn order_for(&self, current: &TaskItem, append_order: i64) -> i64 {
        let same_cell = current.lane_id == self.lane_id && current.column_id == self.column_id;
        match (self.sort_order, same_cell) {
            (Some(order), _) => order,
            (None, true) => current.sort_order,
            (None, false) => append_order,
        }
    }
}

/// Use-case service for tasks and their notes and assignments.
pub struct TaskService<S: BoardStore, P: EventPublisher> {
    store: S,
    publisher: P,
}

impl<S: BoardStore, P: EventPublisher> TaskService<S, P> {
    pub fn new(store: S, publisher: P) -> Self {
        Self { store, publisher }
    }

    pub fn create_task(
        &self,
        ctx: &WriteContext,
        request: &CreateTaskRequest,
    ) -> WriteOutcome<TaskItem> {
        let mut violations = rules::name("title", &request.title, rules::TASK_TITLE_MAX);
        violations.extend(rules::optional_text(
            "description",
            request.description.as_deref(),
            rules::DESCRIPTION_MAX,
        ));
        if let Some(order) = request.sort_order {
            violations.extend(rules::sort_order("sort_order", order));
        }
        ensure_valid(violations)?;
        ctx.cancel.check()?;

        if RecordGateway::<Project>::load_by_id(&self.store, request.project_id)?.is_none()
            || !self.cell_in_project(request.project_id, request.lane_id, request.column_id)?
        {
            return Ok(WriteResult::not_found());
        }
        let sort_order = match request.sort_order {
            Some(order) => order,
            None => self
                .store
                .next_task_order(request.lane_id, request.column_id)?,
        };

        let mut task = TaskItem::new(
            request.project_id,
            request.lane_id,
            request.column_id,
            rules::normalize_name(&request.title),
            sort_order,
        );
        task.description = rules::normalize_optional_text(request.description.as_deref());
        let result = execute_create(&self.store, ctx, task)?;
        emit_applied(&self.publisher, ctx, &result, |task| {
            EventPayload::TaskCreated {
                task_id: task.id,
                title: task.title.clone(),
            }
        });
        Ok(result)
    }

    pub fn rename_task(
        &self,
        ctx: &WriteContext,
        task_id: TaskId,
        supplied: Option<&VersionToken>,
        title: &str,
    ) -> WriteOutcome<TaskItem> {
        ensure_valid(rules::name("title", title, rules::TASK_TITLE_MAX))?;
        let title = rules::normalize_name(title);
        self.update_task(ctx, task_id, supplied, |task| task.title = title)
    }

    /// Replaces the description; blank input clears it.
    pub fn update_task_description(
        &self,
        ctx: &WriteContext,
        task_id: TaskId,
        supplied: Option<&VersionToken>,
        description: Option<&str>,
    ) -> WriteOutcome<TaskItem> {
        ensure_valid(rules::optional_text(
            "description",
            description,
            rules::DESCRIPTION_MAX,
        ))?;
        let description = rules::normalize_optional_text(description);
        self.update_task(ctx, task_id, supplied, |task| task.description = description)
    }

    /// Moves a task to another cell and/or order key.
    pub fn move_task(
        &self,
        ctx: &WriteContext,
        task_id: TaskId,
        supplied: Option<&VersionToken>,
        target: &MoveTaskRequest,
    ) -> WriteOutcome<TaskItem> {
        if let Some(order) = target.sort_order {
            ensure_valid(rules::sort_order("sort_order", order))?;
        }
        check_precondition(MutationKind::Update, supplied)?;
        ctx.cancel.check()?;

        let Some(task) = RecordGateway::<TaskItem>::load_by_id(&self.store, task_id)? else {
            return Ok(WriteResult::not_found());
        };
        if !self.cell_in_project(task.project_id, target.lane_id, target.column_id)? {
            return Ok(WriteResult::not_found());
        }
        let append_order = self
            .store
            .next_task_order(target.lane_id, target.column_id)?;

        let result =
            execute_update::<TaskItem, _, _>(&self.store, ctx, task_id, supplied, |current| {
                let sort_order = target.order_for(current, append_order);
                if current.is_at(target.lane_id, target.column_id, sort_order) {
                    return Change::NoOp;
                }
                let mut next = current.clone();
                next.lane_id = target.lane_id;
                next.column_id = target.column_id;
                next.sort_order = sort_order;
                Change::Apply(next)
            })?;
        emit_applied(&self.publisher, ctx, &result, |task| EventPayload::TaskMoved {
            task_id: task.id,
            lane_id: task.lane_id,
            column_id: task.column_id,
            sort_order: task.sort_order,
        });
        Ok(result)
    }

    /// Deletes a task together with its notes and assignments.
    pub fn delete_task(
        &self,
        ctx: &WriteContext,
        task_id: TaskId,
        supplied: Option<&VersionToken>,
    ) -> WriteOutcome<TaskItem> {
        let result = execute_delete::<TaskItem, _>(&self.store, ctx, task_id, supplied)?;
        emit_applied(&self.publisher, ctx, &result, |task| {
            EventPayload::TaskDeleted { task_id: task.id }
        });
        Ok(result)
    }

    pub fn get_task(&self, task_id: TaskId) -> RepoResult<Option<TaskItem>> {
        RecordGateway::<TaskItem>::load_by_id(&self.store, task_id)
    }

    pub fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<TaskItem>> {
        self.store.list_tasks(query)
    }

    /// Adds a note authored by the acting user.
    pub fn add_note(
        &self,
        ctx: &WriteContext,
        task_id: TaskId,
        body: &str,
    ) -> WriteOutcome<TaskNote> {
        ensure_valid(rules::body("body", body, rules::NOTE_BODY_MAX))?;
        ctx.cancel.check()?;

        let Some(task) = RecordGateway::<TaskItem>::load_by_id(&self.store, task_id)? else {
            return Ok(WriteResult::not_found());
        };
        if !self.user_exists(ctx.actor_id)? {
            return Ok(WriteResult::not_found());
        }

        let note = TaskNote::new(task.project_id, task.id, ctx.actor_id, body.trim());
        let result = execute_create(&self.store, ctx, note)?;
        emit_applied(&self.publisher, ctx, &result, |note| EventPayload::NoteAdded {
            note_id: note.id,
            task_id: note.task_id,
        });
        Ok(result)
    }

    pub fn edit_note(
        &self,
        ctx: &WriteContext,
        note_id: NoteId,
        supplied: Option<&VersionToken>,
        body: &str,
    ) -> WriteOutcome<TaskNote> {
        ensure_valid(rules::body("body", body, rules::NOTE_BODY_MAX))?;
        let body = body.trim().to_string();

        let result =
            execute_update::<TaskNote, _, _>(&self.store, ctx, note_id, supplied, |current| {
                let mut next = current.clone();
                next.body = body;
                Change::compare(current, next)
            })?;
        emit_applied(&self.publisher, ctx, &result, |note| {
            EventPayload::NoteEdited { note_id: note.id }
        });
        Ok(result)
    }

    pub fn delete_note(
        &self,
        ctx: &WriteContext,
        note_id: NoteId,
        supplied: Option<&VersionToken>,
    ) -> WriteOutcome<TaskNote> {
        let result = execute_delete::<TaskNote, _>(&self.store, ctx, note_id, supplied)?;
        emit_applied(&self.publisher, ctx, &result, |note| {
            EventPayload::NoteDeleted { note_id: note.id }
        });
        Ok(result)
    }

    pub fn list_notes(&self, task_id: TaskId) -> RepoResult<Vec<TaskNote>> {
        self.store.list_notes(task_id)
    }

    /// Assigns `user_id` to the task with the given role name.
    pub fn assign_user(
        &self,
        ctx: &WriteContext,
        task_id: TaskId,
        user_id: UserId,
        role: &str,
    ) -> WriteOutcome<TaskAssignment> {
        let role = rules::assignment_role("role", role).map_err(ValidationErrors::from)?;
        ctx.cancel.check()?;

        let Some(task) = RecordGateway::<TaskItem>::load_by_id(&self.store, task_id)? else {
            return Ok(WriteResult::not_found());
        };
        if !self.user_exists(user_id)? {
            return Ok(WriteResult::not_found());
        }

        let assignment = TaskAssignment::new(task.project_id, task.id, user_id, role);
        let result = execute_create(&self.store, ctx, assignment)?;
        emit_applied(&self.publisher, ctx, &result, |assignment| {
            EventPayload::TaskAssigned {
                assignment_id: assignment.id,
                task_id: assignment.task_id,
                user_id: assignment.user_id,
                role: assignment.role,
            }
        });
        Ok(result)
    }

    pub fn change_assignment_role(
        &self,
        ctx: &WriteContext,
        assignment_id: AssignmentId,
        supplied: Option<&VersionToken>,
        role: &str,
    ) -> WriteOutcome<TaskAssignment> {
        let role = rules::assignment_role("role", role).map_err(ValidationErrors::from)?;

        let result = execute_update::<TaskAssignment, _, _>(
            &self.store,
            ctx,
            assignment_id,
            supplied,
            |current| {
                let mut next = current.clone();
                next.role = role;
                Change::compare(current, next)
            },
        )?;
        emit_applied(&self.publisher, ctx, &result, |assignment| {
            EventPayload::AssignmentRoleChanged {
                assignment_id: assignment.id,
                role: assignment.role,
            }
        });
        Ok(result)
    }

    pub fn remove_assignment(
        &self,
        ctx: &WriteContext,
        assignment_id: AssignmentId,
        supplied: Option<&VersionToken>,
    ) -> WriteOutcome<TaskAssignment> {
        let result =
            execute_delete::<TaskAssignment, _>(&self.store, ctx, assignment_id, supplied)?;
        emit_applied(&self.publisher, ctx, &result, |assignment| {
            EventPayload::AssignmentRemoved {
                assignment_id: assignment.id,
            }
        });
        Ok(result)
    }

    pub fn list_assignments(&self, task_id: TaskId) -> RepoResult<Vec<TaskAssignment>> {
        self.store.list_assignments(task_id)
    }

    /// Whether both the lane and the column exist and belong to `project_id`.
    fn cell_in_project(
        &self,
        project_id: ProjectId,
        lane_id: LaneId,
        column_id: ColumnId,
    ) -> RepoResult<bool> {
        let lane = RecordGateway::<Lane>::load_by_id(&self.store, lane_id)?;
        let column = RecordGateway::<Column>::load_by_id(&self.store, column_id)?;
        Ok(matches!(
            (lane, column),
            (Some(lane), Some(column))
                if lane.project_id == project_id && column.project_id == project_id
        ))
    }

    fn user_exists(&self, user_id: UserId) -> RepoResult<bool> {
        Ok(RecordGateway::<User>::load_by_id(&self.store, user_id)?.is_some())
    }

    fn update_task(
        &self,
        ctx: &WriteContext,
        task_id: TaskId,
        supplied: Option<&VersionToken>,
        edit: impl FnOnce(&mut TaskItem),
    ) -> WriteOutcome<TaskItem> {
        let result =
            execute_update::<TaskItem, _, _>(&self.store, ctx, task_id, supplied, |current| {
                let mut next = current.clone();
                edit(&mut next);
                Change::compare(current, next)
            })?;
        emit_applied(&self.publisher, ctx, &result, |task| {
            EventPayload::TaskUpdated { task_id: task.id }
        });
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::MoveTaskRequest;
    use crate::model::task::TaskItem;
    use uuid::Uuid;

    fn task_at(lane_id: Uuid, column_id: Uuid, sort_order: i64) -> TaskItem {
        TaskItem::new(Uuid::new_v4(), lane_id, column_id, "task", sort_order)
    }

    #[test]
    fn order_follows_the_cell_the_task_is_in_now() {
        let (lane, column, other_column) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let target = MoveTaskRequest {
            lane_id: lane,
            column_id: column,
            sort_order: None,
        };

        assert_eq!(target.order_for(&task_at(lane, column, 3), 7), 3);
        assert_eq!(target.order_for(&task_at(lane, other_column, 3), 7), 7);
    }

    #[test]
    fn explicit_order_wins() {
        let (lane, column) = (Uuid::new_v4(), Uuid::new_v4());
        let target = MoveTaskRequest {
            lane_id: lane,
            column_id: column,
            sort_order: Some(1),
        };

        assert_eq!(target.order_for(&task_at(lane, column, 3), 7), 1);
        assert_eq!(target.order_for(&task_at(Uuid::new_v4(), column, 3), 7), 1);
    }
}
