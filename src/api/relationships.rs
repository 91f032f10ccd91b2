//! Relationship API endpoints
//!
//! - POST /api/v1/relationships/{kind}/toggle - Flip a favorite or like
//! - GET  /api/v1/relationships/{kind} - The caller's favorites or likes
//! - GET  /api/v1/users/me/stats - The caller's activity counts

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{ListResponse, PaginationQuery};
use crate::api::middleware::{ApiError, ApiJson, ApiPath, ApiQuery, AppState, AuthenticatedUser};
use crate::models::{RelatedItem, RelationshipKind, ToggleAction, UserStats};

/// Request body for a toggle
#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    #[serde(rename = "itemId", alias = "item_id")]
    pub item_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub action: ToggleAction,
}

/// Build the relationship router (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{kind}/toggle", post(toggle))
        .route("/{kind}", get(list))
}

fn parse_kind(raw: &str) -> Result<RelationshipKind, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::validation_error(format!("Unknown relationship kind: {}", raw)))
}

/// POST /api/v1/relationships/{kind}/toggle
async fn toggle(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(kind): ApiPath<String>,
    ApiJson(body): ApiJson<ToggleRequest>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let action = state.relationships.toggle(&user.0, body.item_id, kind).await?;
    Ok(Json(ToggleResponse { action }))
}

/// GET /api/v1/relationships/{kind}
async fn list(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(kind): ApiPath<String>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> Result<Json<ListResponse<RelatedItem>>, ApiError> {
    let kind = parse_kind(&kind)?;
    let params = state.query.params(query.page, query.limit);
    let page = state.relationships.list(&user.0, kind, &params).await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/users/me/stats
pub async fn my_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserStats>, ApiError> {
    Ok(Json(state.relationships.stats(&user.0).await?))
}
