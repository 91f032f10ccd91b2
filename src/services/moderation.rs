//! Moderation service
//!
//! Submissions enter as `pending`. An admin moves each one to `approved` or
//! `rejected` exactly once; both are terminal. The move is a conditional
//! write on the current status, so two reviewers racing on the same item
//! cannot both succeed.

use crate::db::repositories::ContentRepository;
use crate::hooks::{hook_names, HookManager};
use crate::models::{ContentItem, ContentStatus, NewContentItem, User};
use crate::services::error::{ServiceError, ServiceResult};
use serde_json::json;
use std::sync::Arc;

/// Maximum body length in characters
pub const MAX_BODY_LENGTH: usize = 1000;
/// Maximum length of the secondary text, category and origin
pub const MAX_FIELD_LENGTH: usize = 500;
/// Maximum number of tags per item
pub const MAX_TAGS: usize = 10;
const MAX_TAG_LENGTH: usize = 50;

/// Moderation service
pub struct ModerationService {
    content_repo: Arc<dyn ContentRepository>,
    hook_manager: Option<Arc<HookManager>>,
}

impl ModerationService {
    pub fn new(content_repo: Arc<dyn ContentRepository>) -> Self {
        Self {
            content_repo,
            hook_manager: None,
        }
    }

    pub fn with_hooks(content_repo: Arc<dyn ContentRepository>, hook_manager: Arc<HookManager>) -> Self {
        Self {
            content_repo,
            hook_manager: Some(hook_manager),
        }
    }

    fn trigger_hook(&self, name: &str, data: serde_json::Value) {
        if let Some(ref manager) = self.hook_manager {
            manager.trigger(name, data);
        }
    }

    /// Submit an item for review. It is stored as `pending`.
    pub async fn submit(&self, input: NewContentItem, submitter: &User) -> ServiceResult<ContentItem> {
        let input = clean_submission(input)?;
        let item = self
            .content_repo
            .create(&input, Some(submitter.id), ContentStatus::Pending)
            .await?;

        tracing::info!(item_id = item.id, user_id = submitter.id, "Content submitted");
        self.trigger_hook(
            hook_names::CONTENT_AFTER_SUBMIT,
            json!({
                "id": item.id,
                "kind": item.kind.as_str(),
                "submitted_by": submitter.id,
            }),
        );
        Ok(item)
    }

    /// Record a review decision.
    ///
    /// # Errors
    ///
    /// - `Forbidden` when `actor` is not an admin
    /// - `InvalidTransition` when `status` is not terminal or the item was
    ///   already reviewed
    /// - `NotFound` when the item does not exist
    pub async fn set_status(
        &self,
        item_id: i64,
        status: ContentStatus,
        actor: &User,
    ) -> ServiceResult<ContentItem> {
        if !actor.is_admin() {
            return Err(ServiceError::forbidden("Admin privileges required"));
        }
        if !status.is_terminal() {
            return Err(ServiceError::InvalidTransition(format!(
                "Status must be 'approved' or 'rejected', got '{}'",
                status
            )));
        }

        let current = self
            .content_repo
            .get_by_id(item_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Content item not found"))?;
        ensure_transition(current.status, status)?;

        let updated = self
            .content_repo
            .update_status(item_id, current.status, status, Some(actor.id))
            .await?;

        let item = self
            .content_repo
            .get_by_id(item_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Content item not found"))?;

        if !updated {
            // Another reviewer got there between the read and the write.
            tracing::warn!(item_id, now = %item.status, "Lost moderation race");
            ensure_transition(item.status, status)?;
            return Err(ServiceError::InvalidTransition(format!(
                "Item {} changed while being reviewed",
                item_id
            )));
        }

        tracing::info!(item_id, from = %current.status, to = %status, admin_id = actor.id, "Content reviewed");
        self.trigger_hook(
            hook_names::CONTENT_STATUS_CHANGED,
            json!({
                "id": item_id,
                "from": current.status.as_str(),
                "to": status.as_str(),
                "reviewed_by": actor.id,
            }),
        );
        Ok(item)
    }
}

/// Parse a requested review outcome.
///
/// Anything other than `approved` or `rejected` is an invalid transition,
/// including `pending`.
pub fn parse_target_status(raw: &str) -> ServiceResult<ContentStatus> {
    match raw.trim().parse::<ContentStatus>() {
        Ok(status) if status.is_terminal() => Ok(status),
        _ => Err(ServiceError::InvalidTransition(format!(
            "Status must be 'approved' or 'rejected', got '{}'",
            raw.trim()
        ))),
    }
}

fn ensure_transition(from: ContentStatus, to: ContentStatus) -> ServiceResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition(format!(
            "Item is already {}",
            from
        )))
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_length(field: &str, value: &Option<String>, max: usize) -> ServiceResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ServiceError::validation(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

/// Trim and validate a submission.
pub fn clean_submission(input: NewContentItem) -> ServiceResult<NewContentItem> {
    let body = input.body.trim().to_string();
    if body.is_empty() {
        return Err(ServiceError::validation("Body is required"));
    }
    if body.chars().count() > MAX_BODY_LENGTH {
        return Err(ServiceError::validation(format!(
            "Body must be at most {} characters",
            MAX_BODY_LENGTH
        )));
    }

    let secondary = trimmed(input.secondary);
    if input.kind.requires_secondary() && secondary.is_none() {
        return Err(ServiceError::validation(format!(
            "Author is required for a {}",
            input.kind
        )));
    }

    let category = trimmed(input.category).map(|c| c.to_lowercase());
    let origin = trimmed(input.origin);
    check_length("Secondary text", &secondary, MAX_FIELD_LENGTH)?;
    check_length("Category", &category, MAX_FIELD_LENGTH)?;
    check_length("Origin", &origin, MAX_FIELD_LENGTH)?;

    let mut tags: Vec<String> = Vec::new();
    for tag in input.tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || tags.contains(&tag) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LENGTH {
            return Err(ServiceError::validation(format!(
                "Tags must be at most {} characters",
                MAX_TAG_LENGTH
            )));
        }
        tags.push(tag);
    }
    if tags.len() > MAX_TAGS {
        return Err(ServiceError::validation(format!(
            "At most {} tags are allowed",
            MAX_TAGS
        )));
    }

    Ok(NewContentItem {
        kind: input.kind,
        body,
        secondary,
        category,
        origin,
        tags,
    })
}
