use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{Item, ItemChanges, ItemQuery, ItemRepository, SortBy, SortOrder};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::access::{AccessControl, AccessMode};
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_items).post(add_item))
        .route("/genres", get(get_genres))
        .route("/:id", axum::routing::patch(patch_item).delete(delete_item))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    pub list_id: String,
    pub sort_by: Option<SortBy>,
    pub order: Option<SortOrder>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub genre: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenresQuery {
    pub list_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub list_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub cover_url: Option<String>,
    pub genre: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemsResponse {
    pub items: Vec<Item>,
    pub list_id: String,
    pub sort_by: &'static str,
    pub order: &'static str,
    pub limit: i64,
    pub offset: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Items of a readable (owned or shared) list, sorted and paged.
async fn get_items(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ItemsQuery>,
) -> AppResult<Json<ItemsResponse>> {
    AccessControl::authorize_list(&state.db, &user.id, &query.list_id, AccessMode::Read).await?;

    let item_query = ItemQuery {
        sort_by: query.sort_by.unwrap_or(SortBy::CreatedAt),
        order: query.order.unwrap_or(SortOrder::Desc),
        limit: query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        offset: query.offset.unwrap_or(0).max(0),
        genre: query.genre.filter(|g| !g.trim().is_empty()),
    };

    let items = ItemRepository::list_for_list(&state.db, &query.list_id, &item_query).await?;

    Ok(Json(ItemsResponse {
        items,
        list_id: query.list_id,
        sort_by: item_query.sort_by.as_str(),
        order: item_query.order.as_str(),
        limit: item_query.limit,
        offset: item_query.offset,
    }))
}

/// Distinct genres of a readable list.
async fn get_genres(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<GenresQuery>,
) -> AppResult<Json<Vec<String>>> {
    AccessControl::authorize_list(&state.db, &user.id, &query.list_id, AccessMode::Read).await?;

    let genres = ItemRepository::genres(&state.db, &query.list_id).await?;
    Ok(Json(genres))
}

/// Add an item to an owned list.
async fn add_item(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateItemRequest>,
) -> AppResult<(StatusCode, Json<Item>)> {
    AccessControl::authorize_list(&state.db, &user.id, &request.list_id, AccessMode::Write).await?;

    if request.title.trim().is_empty() {
        return Err(AppError::BadRequest("Title must not be empty".to_string()));
    }

    let item = ItemRepository::create(
        &state.db,
        &request.list_id,
        request.title.trim(),
        &request.item_type,
        request.cover_url.as_deref().unwrap_or(""),
        request.genre.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Partial update; ownership is checked through the item's parent list.
async fn patch_item(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(item_id): Path<String>,
    Json(changes): Json<ItemChanges>,
) -> AppResult<Json<Item>> {
    if changes.is_empty() {
        return Err(AppError::BadRequest("No changes provided".to_string()));
    }

    AccessControl::authorize_item(&state.db, &user.id, &item_id, AccessMode::Write).await?;

    let item = ItemRepository::update(&state.db, &item_id, &changes).await?;
    Ok(Json(item))
}

async fn delete_item(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(item_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    AccessControl::authorize_item(&state.db, &user.id, &item_id, AccessMode::Write).await?;

    ItemRepository::delete(&state.db, &item_id).await?;
    Ok(Json(serde_json::json!({ "message": "Item deleted" })))
}
