//! Relationship service
//!
//! Favorites and likes are toggled, never set. A toggle reads whether the
//! record exists and then deletes or inserts it. The read and the write are
//! separate steps, so two concurrent toggles may both see "absent"; the
//! unique key on `(user_id, item_id, kind)` lets exactly one insert through
//! and the loser is reported as `added` too.

use crate::db::is_unique_violation;
use crate::db::repositories::{ContentRepository, RelationshipRepository};
use crate::hooks::{hook_names, HookManager};
use crate::models::{
    ContentStatus, ListParams, PagedResult, RelatedItem, RelationshipKind, ToggleAction, User,
    UserStats,
};
use crate::services::error::{ServiceError, ServiceResult};
use serde_json::json;
use std::sync::Arc;

/// Relationship toggle service
pub struct RelationshipService {
    relationship_repo: Arc<dyn RelationshipRepository>,
    content_repo: Arc<dyn ContentRepository>,
    hook_manager: Option<Arc<HookManager>>,
}

impl RelationshipService {
    pub fn new(
        relationship_repo: Arc<dyn RelationshipRepository>,
        content_repo: Arc<dyn ContentRepository>,
    ) -> Self {
        Self {
            relationship_repo,
            content_repo,
            hook_manager: None,
        }
    }

    pub fn with_hooks(
        relationship_repo: Arc<dyn RelationshipRepository>,
        content_repo: Arc<dyn ContentRepository>,
        hook_manager: Arc<HookManager>,
    ) -> Self {
        Self {
            relationship_repo,
            content_repo,
            hook_manager: Some(hook_manager),
        }
    }

    fn trigger_hook(&self, name: &str, data: serde_json::Value) {
        if let Some(ref manager) = self.hook_manager {
            manager.trigger(name, data);
        }
    }

    /// Flip the user's `kind` marker on an approved item.
    ///
    /// # Errors
    ///
    /// `NotFound` when the item does not exist or is not approved.
    pub async fn toggle(
        &self,
        user: &User,
        item_id: i64,
        kind: RelationshipKind,
    ) -> ServiceResult<ToggleAction> {
        let item = self.content_repo.get_by_id(item_id).await?;
        if !item.is_some_and(|i| i.status == ContentStatus::Approved) {
            return Err(ServiceError::not_found("Content item not found"));
        }

        let action = if self.relationship_repo.exists(user.id, item_id, kind).await? {
            if !self.relationship_repo.delete(user.id, item_id, kind).await? {
                tracing::debug!(user_id = user.id, item_id, %kind, "Record already removed");
            }
            ToggleAction::Removed
        } else {
            match self.relationship_repo.insert(user.id, item_id, kind).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(user_id = user.id, item_id, %kind, "Concurrent toggle absorbed");
                }
                Err(e) if is_unique_violation(&e) => {
                    tracing::warn!(user_id = user.id, item_id, %kind, "Concurrent toggle absorbed");
                }
                Err(e) => return Err(e.into()),
            }
            ToggleAction::Added
        };

        self.trigger_hook(
            hook_names::RELATIONSHIP_TOGGLED,
            json!({
                "user_id": user.id,
                "item_id": item_id,
                "kind": kind.as_str(),
                "action": action,
            }),
        );
        Ok(action)
    }

    /// The user's marked items, most recent first
    pub async fn list(
        &self,
        user: &User,
        kind: RelationshipKind,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<RelatedItem>> {
        let (items, total) = self
            .relationship_repo
            .list_for_user(user.id, kind, params)
            .await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn stats(&self, user: &User) -> ServiceResult<UserStats> {
        let (favorites, likes, submissions) = futures::try_join!(
            self.relationship_repo.count_for_user(user.id, RelationshipKind::Favorite),
            self.relationship_repo.count_for_user(user.id, RelationshipKind::Like),
            self.content_repo.count_by_submitter(user.id),
        )?;
        Ok(UserStats {
            favorites,
            likes,
            submissions,
        })
    }
}
