//! Query composer
//!
//! Turns a listing request into a repository query: page bounds are clamped,
//! and status visibility is resolved from the caller's role before anything
//! reaches the database.

use crate::db::repositories::ContentRepository;
use crate::models::{
    ContentFilter, ContentView, ListParams, PagedResult, SortKey, StatusFilter, User,
};
use crate::services::error::{ServiceError, ServiceResult};
use std::sync::Arc;

/// A listing request as received from a caller
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub filter: ContentFilter,
}

/// Builds paginated, filtered content views
pub struct QueryComposer {
    content_repo: Arc<dyn ContentRepository>,
    default_page_size: u32,
    max_page_size: u32,
}

impl QueryComposer {
    pub fn new(
        content_repo: Arc<dyn ContentRepository>,
        default_page_size: u32,
        max_page_size: u32,
    ) -> Self {
        Self {
            content_repo,
            default_page_size,
            max_page_size,
        }
    }

    /// Clamp a requested page and page size
    pub fn params(&self, page: Option<u32>, limit: Option<u32>) -> ListParams {
        ListParams::capped(
            page.unwrap_or(1),
            limit.unwrap_or(self.default_page_size),
            self.max_page_size,
        )
    }

    /// List content visible to `viewer`.
    ///
    /// # Errors
    ///
    /// `Forbidden` when a non-admin asks for anything other than approved items.
    pub async fn list(
        &self,
        request: ListRequest,
        viewer: Option<&User>,
    ) -> ServiceResult<PagedResult<ContentView>> {
        let params = self.params(request.page, request.limit);
        let mut filter = request.filter;
        filter.status = resolve_visibility(filter.status, viewer)?;

        let (items, total) = self
            .content_repo
            .list(&filter, &params, viewer.map(|u| u.id))
            .await?;

        tracing::debug!(total, page = params.page, "Listed content");
        Ok(PagedResult::new(items, total, &params))
    }

    /// The moderation queue: pending items, oldest first. Admin only.
    pub async fn pending_queue(
        &self,
        admin: &User,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> ServiceResult<PagedResult<ContentView>> {
        if !admin.is_admin() {
            return Err(ServiceError::forbidden("Admin privileges required"));
        }
        let request = ListRequest {
            page,
            limit,
            filter: ContentFilter {
                status: StatusFilter::Pending,
                sort: SortKey::Oldest,
                ..Default::default()
            },
        };
        self.list(request, Some(admin)).await
    }
}

/// Decide which statuses a caller may see.
///
/// Non-admins asking for a non-public status are refused outright; whatever
/// they asked for, their filter is pinned to approved.
pub fn resolve_visibility(
    requested: StatusFilter,
    viewer: Option<&User>,
) -> ServiceResult<StatusFilter> {
    let is_admin = viewer.is_some_and(User::is_admin);
    if is_admin {
        return Ok(requested);
    }
    if !requested.is_public() {
        return Err(ServiceError::forbidden(
            "Only administrators may list unapproved content",
        ));
    }
    Ok(StatusFilter::Approved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxContentRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ContentKind, ContentStatus, NewContentItem, UserRole};
    use proptest::prelude::*;

    fn user(role: UserRole) -> User {
        let mut user = User::new(
            "u".to_string(),
            "u@example.com".to_string(),
            "U".to_string(),
            "hash".to_string(),
            role,
        );
        user.id = 1;
        user
    }

    async fn setup() -> (QueryComposer, Arc<dyn ContentRepository>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxContentRepository::boxed(pool);
        (QueryComposer::new(repo.clone(), 20, 100), repo)
    }

    async fn add(repo: &Arc<dyn ContentRepository>, body: &str, status: ContentStatus) {
        repo.create(
            &NewContentItem {
                kind: ContentKind::Proverb,
                body: body.to_string(),
                secondary: None,
                category: Some("general".to_string()),
                origin: None,
                tags: vec![],
            },
            None,
            status,
        )
        .await
        .unwrap();
    }

    #[test]
    fn test_visibility_rules() {
        let admin = user(UserRole::Admin);
        let reader = user(UserRole::User);

        assert_eq!(resolve_visibility(StatusFilter::All, Some(&admin)).unwrap(), StatusFilter::All);
        assert_eq!(
            resolve_visibility(StatusFilter::Approved, Some(&reader)).unwrap(),
            StatusFilter::Approved
        );
        assert!(matches!(
            resolve_visibility(StatusFilter::All, Some(&reader)),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            resolve_visibility(StatusFilter::Pending, None),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_params_use_configured_bounds() {
        let (_, repo) = setup().await;
        let composer = QueryComposer::new(repo, 20, 50);
        assert_eq!(composer.params(None, None), ListParams { page: 1, per_page: 20 });
        assert_eq!(composer.params(Some(0), Some(500)), ListParams { page: 1, per_page: 50 });
    }

    #[tokio::test]
    async fn test_pending_items_never_listed_for_readers() {
        let (composer, repo) = setup().await;
        add(&repo, "shared word approved", ContentStatus::Approved).await;
        add(&repo, "shared word pending", ContentStatus::Pending).await;
        add(&repo, "shared word rejected", ContentStatus::Rejected).await;

        let request = ListRequest {
            filter: ContentFilter { search: Some("shared word".to_string()), ..Default::default() },
            ..Default::default()
        };

        let reader = user(UserRole::User);
        for viewer in [None, Some(&reader)] {
            let page = composer.list(request.clone(), viewer).await.unwrap();
            assert_eq!(page.total, 1);
            assert!(page.items.iter().all(|v| v.item.status == ContentStatus::Approved));
        }

        let admin = user(UserRole::Admin);
        let mut all = request.clone();
        all.filter.status = StatusFilter::All;
        assert_eq!(composer.list(all, Some(&admin)).await.unwrap().total, 3);
    }

    #[tokio::test]
    async fn test_page_past_end_is_empty_with_total() {
        let (composer, repo) = setup().await;
        for i in 0..7 {
            add(&repo, &format!("item {}", i), ContentStatus::Approved).await;
        }

        let first = composer
            .list(ListRequest { page: Some(1), limit: Some(3), ..Default::default() }, None)
            .await
            .unwrap();
        assert_eq!(first.total_pages(), 3);

        let beyond = composer
            .list(ListRequest { page: Some(4), limit: Some(3), ..Default::default() }, None)
            .await
            .unwrap();
        assert!(beyond.is_empty());
        assert_eq!(beyond.total, 7);
    }

    #[tokio::test]
    async fn test_pending_queue_oldest_first() {
        let (composer, repo) = setup().await;
        add(&repo, "first", ContentStatus::Pending).await;
        add(&repo, "second", ContentStatus::Pending).await;
        add(&repo, "done", ContentStatus::Approved).await;

        let queue = composer.pending_queue(&user(UserRole::Admin), None, None).await.unwrap();
        let bodies: Vec<_> = queue.items.iter().map(|v| v.item.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);

        assert!(matches!(
            composer.pending_queue(&user(UserRole::User), None, None).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    proptest! {
        #[test]
        fn readers_never_see_beyond_approved(requested in prop_oneof![
            Just(StatusFilter::Approved),
            Just(StatusFilter::Pending),
            Just(StatusFilter::Rejected),
            Just(StatusFilter::All),
        ]) {
            let reader = user(UserRole::User);
            match resolve_visibility(requested, Some(&reader)) {
                Ok(status) => prop_assert_eq!(status, StatusFilter::Approved),
                Err(e) => prop_assert!(matches!(e, ServiceError::Forbidden(_))),
            }
        }
    }
}
