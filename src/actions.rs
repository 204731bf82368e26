//! Board actions
//!
//! The flows a view triggers: each one is guarded, runs its mutation, and
//! reports the outcome as a flash banner. Failures are also returned so the
//! view can render them inline; nothing here retries.

use crate::bus::NotificationBus;
use crate::error::{BoardError, Result};
use crate::guard::{ActionGuard, Guarded, Navigator, Route};
use crate::model::{Link, NewLink};
use crate::mutation::MutationEngine;
use crate::session::BoardContext;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct BoardActions {
    guard: ActionGuard,
    engine: MutationEngine,
    bus: NotificationBus,
    navigator: Arc<dyn Navigator>,
}

impl BoardActions {
    pub fn new(engine: MutationEngine, bus: NotificationBus, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            guard: ActionGuard::new(navigator.clone()),
            engine,
            bus,
            navigator,
        }
    }

    /// Upvote a link; yields the new vote count
    pub async fn vote(&self, ctx: &BoardContext, link_id: &str) -> Guarded<Result<usize>> {
        self.guard
            .run("vote", ctx.actor.as_ref(), |actor| async move {
                let result = self.engine.append_vote(link_id, &actor).await;
                self.flash_failure("Could not vote", &result);
                result
            })
            .await
    }

    /// Comment on a link; yields the new comment count
    pub async fn comment(&self, ctx: &BoardContext, link_id: &str, text: &str) -> Guarded<Result<usize>> {
        self.guard
            .run("comment", ctx.actor.as_ref(), |actor| async move {
                let text = text.trim();
                if text.is_empty() {
                    return Err(BoardError::Validation("A comment is required".into()));
                }
                let result = self.engine.append_comment(link_id, &actor, text).await;
                self.flash_failure("Could not add comment", &result);
                result
            })
            .await
    }

    /// Validate and create a link, then return to the newest links
    pub async fn submit_link(&self, ctx: &BoardContext, new_link: &NewLink) -> Guarded<Result<String>> {
        self.guard
            .run("submit_link", ctx.actor.as_ref(), |actor| async move {
                // validation errors are rendered inline, not flashed
                new_link.validate(&ctx.categories)?;

                let result = self.engine.create_link(&actor, new_link).await;
                self.flash_failure("Could not create link", &result);
                let id = result?;

                self.bus.success("Link created", new_link.description.as_str());
                self.navigator.navigate(Route::NewLinks);
                Ok(id)
            })
            .await
    }

    pub async fn add_category(&self, ctx: &BoardContext, name: &str) -> Guarded<Result<String>> {
        self.guard
            .run("add_category", ctx.actor.as_ref(), |_actor| async move {
                let name = name.trim();
                if name.is_empty() {
                    return Err(BoardError::Validation("A category name is required".into()));
                }
                let result = self.engine.create_category(name).await;
                self.flash_failure("Could not add category", &result);
                if result.is_ok() {
                    self.bus.success("Category added", name);
                }
                result
            })
            .await
    }

    /// Delete a link. Only its poster may.
    pub async fn delete_link(&self, ctx: &BoardContext, link: &Link) -> Guarded<Result<()>> {
        self.guard
            .run("delete_link", ctx.actor.as_ref(), |actor| async move {
                let result = if link.is_posted_by(&actor) {
                    self.engine.delete_link(&link.id).await
                } else {
                    Err(BoardError::PermissionDenied(
                        "only the poster can delete a link".into(),
                    ))
                };
                self.flash_failure("Could not delete link", &result);
                if result.is_ok() {
                    self.bus.success("Link deleted", link.description.as_str());
                }
                result
            })
            .await
    }

    fn flash_failure<T>(&self, message: &str, result: &Result<T>) {
        if let Err(error) = result {
            warn!(error = %error, "{}", message);
            self.bus.error(message, error.to_string());
        }
    }
}
