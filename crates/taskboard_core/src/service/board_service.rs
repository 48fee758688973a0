//! Lane and column service.
//!
//! # Invariants
//! - A lane/column created without an explicit order is appended after the
//!   current last one.
//! - Reordering to the current order key is a no-op.

use crate::context::WriteContext;
use crate::model::board::{Column, ColumnId, Lane, LaneId, Project};
use crate::model::mutation::WriteResult;
use crate::model::record::ProjectId;
use crate::model::version::VersionToken;
use crate::notify::{EventPayload, EventPublisher};
use crate::repo::gateway::{BoardStore, RecordGateway, RepoResult};
use crate::service::emit_applied;
use crate::service::pipeline::{
    execute_create, execute_delete, execute_update, Change, WriteOutcome,
};
use crate::validation::{ensure_valid, rules};

/// Use-case service for the lanes and columns of a board.
pub struct BoardService<S: BoardStore, P: EventPublisher> {
    store: S,
    publisher: P,
}

impl<S: BoardStore, P: EventPublisher> BoardService<S, P> {
    pub fn new(store: S, publisher: P) -> Self {
        Self { store, publisher }
    }

    /// Creates a lane; `NotFound` when the project does not exist.
    pub fn create_lane(
        &self,
        ctx: &WriteContext,
        project_id: ProjectId,
        name: &str,
        sort_order: Option<i64>,
    ) -> WriteOutcome<Lane> {
        let mut violations = rules::name("name", name, rules::LANE_NAME_MAX);
        if let Some(order) = sort_order {
            violations.extend(rules::sort_order("sort_order", order));
        }
        ensure_valid(violations)?;
        ctx.cancel.check()?;

        if !self.project_exists(project_id)? {
            return Ok(WriteResult::not_found());
        }
        let sort_order = match sort_order {
            Some(order) => order,
            None => self.store.next_lane_order(project_id)?,
        };

        let lane = Lane::new(project_id, rules::normalize_name(name), sort_order);
        let result = execute_create(&self.store, ctx, lane)?;
        emit_applied(&self.publisher, ctx, &result, |lane| {
            EventPayload::LaneCreated {
                lane_id: lane.id,
                name: lane.name.clone(),
            }
        });
        Ok(result)
    }

    pub fn rename_lane(
        &self,
        ctx: &WriteContext,
        lane_id: LaneId,
        supplied: Option<&VersionToken>,
        name: &str,
    ) -> WriteOutcome<Lane> {
        ensure_valid(rules::name("name", name, rules::LANE_NAME_MAX))?;
        let name = rules::normalize_name(name);
        self.update_lane(ctx, lane_id, supplied, |lane| lane.name = name)
    }

    pub fn reorder_lane(
        &self,
        ctx: &WriteContext,
        lane_id: LaneId,
        supplied: Option<&VersionToken>,
        sort_order: i64,
    ) -> WriteOutcome<Lane> {
        ensure_valid(rules::sort_order("sort_order", sort_order))?;
        self.update_lane(ctx, lane_id, supplied, |lane| lane.sort_order = sort_order)
    }

    /// Deletes a lane together with the tasks placed in it.
    pub fn delete_lane(
        &self,
        ctx: &WriteContext,
        lane_id: LaneId,
        supplied: Option<&VersionToken>,
    ) -> WriteOutcome<Lane> {
        let result = execute_delete::<Lane, _>(&self.store, ctx, lane_id, supplied)?;
        emit_applied(&self.publisher, ctx, &result, |lane| {
            EventPayload::LaneDeleted { lane_id: lane.id }
        });
        Ok(result)
    }

    pub fn list_lanes(&self, project_id: ProjectId) -> RepoResult<Vec<Lane>> {
        self.store.list_lanes(project_id)
    }

    /// Creates a column; `NotFound` when the project does not exist.
    pub fn create_column(
        &self,
        ctx: &WriteContext,
        project_id: ProjectId,
        name: &str,
        sort_order: Option<i64>,
        wip_limit: Option<i64>,
    ) -> WriteOutcome<Column> {
        let mut violations = rules::name("name", name, rules::COLUMN_NAME_MAX);
        if let Some(order) = sort_order {
            violations.extend(rules::sort_order("sort_order", order));
        }
        violations.extend(rules::wip_limit("wip_limit", wip_limit));
        ensure_valid(violations)?;
        ctx.cancel.check()?;

        if !self.project_exists(project_id)? {
            return Ok(WriteResult::not_found());
        }
        let sort_order = match sort_order {
            Some(order) => order,
            None => self.store.next_column_order(project_id)?,
        };

        let mut column = Column::new(project_id, rules::normalize_name(name), sort_order);
        column.wip_limit = wip_limit.and_then(|limit| u32::try_from(limit).ok());
        let result = execute_create(&self.store, ctx, column)?;
        emit_applied(&self.publisher, ctx, &result, |column| {
            EventPayload::ColumnCreated {
                column_id: column.id,
                name: column.name.clone(),
            }
        });
        Ok(result)
    }

    pub fn rename_column(
        &self,
        ctx: &WriteContext,
        column_id: ColumnId,
        supplied: Option<&VersionToken>,
        name: &str,
    ) -> WriteOutcome<Column> {
        ensure_valid(rules::name("name", name, rules::COLUMN_NAME_MAX))?;
        let name = rules::normalize_name(name);
        self.update_column(ctx, column_id, supplied, |column| column.name = name)
    }

    pub fn reorder_column(
        &self,
        ctx: &WriteContext,
        column_id: ColumnId,
        supplied: Option<&VersionToken>,
        sort_order: i64,
    ) -> WriteOutcome<Column> {
        ensure_valid(rules::sort_order("sort_order", sort_order))?;
        self.update_column(ctx, column_id, supplied, |column| {
            column.sort_order = sort_order
        })
    }

    /// Sets or clears (`None`) the work-in-progress cap.
    pub fn set_column_wip_limit(
        &self,
        ctx: &WriteContext,
        column_id: ColumnId,
        supplied: Option<&VersionToken>,
        wip_limit: Option<i64>,
    ) -> WriteOutcome<Column> {
        ensure_valid(rules::wip_limit("wip_limit", wip_limit))?;
        let wip_limit = wip_limit.and_then(|limit| u32::try_from(limit).ok());
        self.update_column(ctx, column_id, supplied, |column| {
            column.wip_limit = wip_limit
        })
    }

    /// Deletes a column together with the tasks placed in it.
    pub fn delete_column(
        &self,
        ctx: &WriteContext,
        column_id: ColumnId,
        supplied: Option<&VersionToken>,
    ) -> WriteOutcome<Column> {
        let result = execute_delete::<Column, _>(&self.store, ctx, column_id, supplied)?;
        emit_applied(&self.publisher, ctx, &result, |column| {
            EventPayload::ColumnDeleted {
                column_id: column.id,
            }
        });
        Ok(result)
    }

    pub fn list_columns(&self, project_id: ProjectId) -> RepoResult<Vec<Column>> {
        self.store.list_columns(project_id)
    }

    fn project_exists(&self, project_id: ProjectId) -> RepoResult<bool> {
        Ok(RecordGateway::<Project>::load_by_id(&self.store, project_id)?.is_some())
    }

    fn update_lane(
        &self,
        ctx: &WriteContext,
        lane_id: LaneId,
        supplied: Option<&VersionToken>,
        edit: impl FnOnce(&mut Lane),
    ) -> WriteOutcome<Lane> {
        let result = execute_update::<Lane, _, _>(&self.store, ctx, lane_id, supplied, |current| {
            let mut next = current.clone();
            edit(&mut next);
            Change::compare(current, next)
        })?;
        emit_applied(&self.publisher, ctx, &result, |lane| {
            EventPayload::LaneUpdated { lane_id: lane.id }
        });
        Ok(result)
    }

    fn update_column(
        &self,
        ctx: &WriteContext,
        column_id: ColumnId,
        supplied: Option<&VersionToken>,
        edit: impl FnOnce(&mut Column),
    ) -> WriteOutcome<Column> {
        let result =
            execute_update::<Column, _, _>(&self.store, ctx, column_id, supplied, |current| {
                let mut next = current.clone();
                edit(&mut next);
                Change::compare(current, next)
            })?;
        emit_applied(&self.publisher, ctx, &result, |column| {
            EventPayload::ColumnUpdated {
                column_id: column.id,
            }
        });
        Ok(result)
    }
}
