use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

use crate::db::LogRepository;
use crate::error::AppResult;
use crate::routes::auth::MaybeAuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(log_event))
}

#[derive(Debug, Deserialize)]
pub struct LogRequest {
    pub event: Option<String>,
    pub data: Option<serde_json::Value>,
}

/// Record a frontend event. Anonymous callers are fine; an invalid token is
/// still rejected by the extractor.
async fn log_event(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    Json(request): Json<LogRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let event = request.event.unwrap_or_else(|| "unknown".to_string());
    let data = request
        .data
        .map(|v| v.to_string())
        .unwrap_or_else(|| "{}".to_string());

    LogRepository::insert(
        &state.db,
        &event,
        &data,
        user.as_ref().map(|u| u.id.as_str()),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "Log entry saved" })),
    ))
}
