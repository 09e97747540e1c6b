use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::UserRepository;
use crate::error::{AppError, AppResult};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_user_by_username))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub username: String,
}

/// Public profile only; the stored password hash never leaves the repository
/// layer here.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
}

/// Look up a user by exact username. Unlike list/item access checks this is a
/// genuine 404: usernames are public handles used for sharing.
async fn get_user_by_username(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<UserResponse>> {
    let user = UserRepository::find_by_username(&state.db, &query.username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse {
        id: user.id,
        username: user.username,
    }))
}
