//! Content API endpoints
//!
//! - GET  /api/v1/content - Filtered, paginated listing
//! - GET  /api/v1/content/random - A random approved item
//! - GET  /api/v1/content/daily - The item of the day
//! - GET  /api/v1/content/categories - Categories in use
//! - GET  /api/v1/content/{id} - A single item
//! - POST /api/v1/content - Submit an item for review
//! - PUT  /api/v1/content/{id}/status - Review decision (admin)

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::common::ListResponse;
use crate::api::middleware::{
    ApiError, ApiJson, ApiPath, ApiQuery, AppState, AuthenticatedUser, Viewer,
};
use crate::models::{ContentFilter, ContentItem, ContentKind, ContentView, NewContentItem};
use crate::services::{parse_target_status, ListRequest};

/// Query parameters for listing content
#[derive(Debug, Default, Deserialize)]
pub struct ListContentQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub kind: Option<String>,
    pub category: Option<String>,
    pub origin: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
}

/// Query parameters selecting a kind
#[derive(Debug, Default, Deserialize)]
pub struct KindQuery {
    pub kind: Option<String>,
}

/// Query parameters for the item of the day
#[derive(Debug, Default, Deserialize)]
pub struct DailyQuery {
    pub kind: Option<String>,
    /// UTC date, defaults to today
    pub date: Option<NaiveDate>,
}

/// Request body for a review decision
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse<T> {
    pub item: T,
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

/// Build public content routes (optional auth)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_content))
        .route("/random", get(random_content))
        .route("/daily", get(daily_content))
        .route("/categories", get(list_categories))
        .route("/{id}", get(get_content))
}

/// Parse an optional query value, reporting bad input as a validation error
fn parse_opt<T: FromStr>(value: Option<&str>, field: &str) -> Result<Option<T>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ApiError::validation_error(format!("Invalid {}: {}", field, raw))),
    }
}

fn parse_kind(value: Option<&str>) -> Result<Option<ContentKind>, ApiError> {
    parse_opt(value, "kind")
}

impl ListContentQuery {
    fn into_request(self) -> Result<ListRequest, ApiError> {
        let filter = ContentFilter {
            kind: parse_kind(self.kind.as_deref())?,
            category: self.category,
            origin: self.origin,
            search: self.search,
            status: parse_opt(self.status.as_deref(), "status")?.unwrap_or_default(),
            sort: parse_opt(self.sort.as_deref(), "sort")?.unwrap_or_default(),
        };
        Ok(ListRequest {
            page: self.page,
            limit: self.limit,
            filter,
        })
    }
}

/// GET /api/v1/content
async fn list_content(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiQuery(query): ApiQuery<ListContentQuery>,
) -> Result<Json<ListResponse<ContentView>>, ApiError> {
    let request = query.into_request()?;
    let page = state.query.list(request, viewer.user()).await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/content/random
async fn random_content(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<KindQuery>,
) -> Result<Json<ItemResponse<ContentItem>>, ApiError> {
    let kind = parse_kind(query.kind.as_deref())?;
    let item = state.content_service.random(kind).await?;
    Ok(Json(ItemResponse { item }))
}

/// GET /api/v1/content/daily
async fn daily_content(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DailyQuery>,
) -> Result<Json<ItemResponse<ContentItem>>, ApiError> {
    let kind = parse_kind(query.kind.as_deref())?;
    let date = query.date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    let item = state.content_service.daily(kind, date).await?;
    Ok(Json(ItemResponse { item }))
}

/// GET /api/v1/content/categories
async fn list_categories(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<KindQuery>,
) -> Result<Json<CategoriesResponse>, ApiError> {
    let kind = parse_kind(query.kind.as_deref())?;
    let categories = state.content_service.categories(kind).await?;
    Ok(Json(CategoriesResponse { categories }))
}

/// GET /api/v1/content/{id}
async fn get_content(
    State(state): State<AppState>,
    viewer: Viewer,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ItemResponse<ContentView>>, ApiError> {
    let item = state.content_service.get(id, viewer.user()).await?;
    Ok(Json(ItemResponse { item }))
}

/// POST /api/v1/content
pub async fn submit_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<NewContentItem>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state.moderation.submit(body, &user.0).await?;
    Ok((StatusCode::CREATED, Json(ItemResponse { item })))
}

/// PUT /api/v1/content/{id}/status
pub async fn set_content_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<ItemResponse<ContentItem>>, ApiError> {
    let status = parse_target_status(&body.status)?;
    let item = state.moderation.set_status(id, status, &user.0).await?;
    Ok(Json(ItemResponse { item }))
}
