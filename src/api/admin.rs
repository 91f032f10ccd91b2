//! Admin API endpoints
//!
//! Handles HTTP requests for moderation and account management:
//! - GET /api/v1/admin/content/pending - Moderation queue, oldest first
//! - PUT /api/v1/admin/users/{id}/status - Activate or deactivate an account
//!
//! Review decisions themselves live at `PUT /api/v1/content/{id}/status`.

use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{ListResponse, PaginationQuery};
use crate::api::middleware::{ApiError, ApiJson, ApiPath, ApiQuery, AppState, AuthenticatedUser};
use crate::models::{ContentView, User, UserStatus};

/// Request body for an account status change
#[derive(Debug, Deserialize)]
pub struct UserStatusRequest {
    pub status: String,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/content/pending", get(pending_queue))
        .route("/users/{id}/status", put(set_user_status))
}

/// GET /api/v1/admin/content/pending
async fn pending_queue(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> Result<Json<ListResponse<ContentView>>, ApiError> {
    let page = state
        .query
        .pending_queue(&user.0, query.page, query.limit)
        .await?;
    Ok(Json(page.into()))
}

/// PUT /api/v1/admin/users/{id}/status
async fn set_user_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UserStatusRequest>,
) -> Result<Json<User>, ApiError> {
    let status: UserStatus = body
        .status
        .trim()
        .parse()
        .map_err(|_| ApiError::validation_error("Status must be 'active' or 'inactive'"))?;
    let updated = state.user_service.set_user_status(&user.0, id, status).await?;
    Ok(Json(updated))
}
