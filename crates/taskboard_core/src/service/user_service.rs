//! User account service.

use crate::context::WriteContext;
use crate::model::member::{User, UserId};
use crate::model::version::VersionToken;
use crate::notify::{EventPayload, EventPublisher};
use crate::repo::gateway::{BoardStore, RecordGateway, RepoResult};
use crate::service::emit_applied;
use crate::service::pipeline::{execute_create, execute_update, Change, WriteOutcome};
use crate::validation::{ensure_valid, rules};

/// Use-case service for user accounts.
pub struct UserService<S: BoardStore, P: EventPublisher> {
    store: S,
    publisher: P,
}

impl<S: BoardStore, P: EventPublisher> UserService<S, P> {
    pub fn new(store: S, publisher: P) -> Self {
        Self { store, publisher }
    }

    /// Registers a user. Emails are stored trimmed and lowercase; an email
    /// already held by an active user is a conflict.
    pub fn create_user(
        &self,
        ctx: &WriteContext,
        email: &str,
        display_name: &str,
    ) -> WriteOutcome<User> {
        let mut violations = rules::email("email", email);
        violations.extend(rules::name(
            "display_name",
            display_name,
            rules::DISPLAY_NAME_MAX,
        ));
        ensure_valid(violations)?;

        let user = User::new(
            email.trim().to_ascii_lowercase(),
            rules::normalize_name(display_name),
        );
        let result = execute_create(&self.store, ctx, user)?;
        emit_applied(&self.publisher, ctx, &result, |user| {
            EventPayload::UserCreated {
                user_id: user.id,
                email: user.email.clone(),
            }
        });
        Ok(result)
    }

    pub fn rename_user(
        &self,
        ctx: &WriteContext,
        user_id: UserId,
        supplied: Option<&VersionToken>,
        display_name: &str,
    ) -> WriteOutcome<User> {
        ensure_valid(rules::name(
            "display_name",
            display_name,
            rules::DISPLAY_NAME_MAX,
        ))?;
        let display_name = rules::normalize_name(display_name);

        let result = execute_update::<User, _, _>(&self.store, ctx, user_id, supplied, |current| {
            let mut next = current.clone();
            next.display_name = display_name;
            Change::compare(current, next)
        })?;
        emit_applied(&self.publisher, ctx, &result, |user| {
            EventPayload::UserRenamed {
                user_id: user.id,
                display_name: user.display_name.clone(),
            }
        });
        Ok(result)
    }

    pub fn get_user(&self, user_id: UserId) -> RepoResult<Option<User>> {
        RecordGateway::<User>::load_by_id(&self.store, user_id)
    }
}
