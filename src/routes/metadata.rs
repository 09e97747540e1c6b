use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::services::metadata::DescriptionResponse;
use crate::AppState;

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 50;

// Earliest film year accepted by the upstream API.
const YEAR_MIN: i64 = 1888;
const YEAR_MAX: i64 = 2100;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/search", get(search))
        .route("/description", get(description))
}

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    pub query: String,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub year: Option<i64>,
    pub limit: Option<u32>,
}

impl MetadataQuery {
    fn validate(&self) -> AppResult<()> {
        if self.query.trim().is_empty() {
            return Err(AppError::BadRequest("Query must not be empty".to_string()));
        }
        if let Some(year) = self.year {
            if !(YEAR_MIN..=YEAR_MAX).contains(&year) {
                return Err(AppError::Validation(format!(
                    "Year must be between {} and {}",
                    YEAR_MIN, YEAR_MAX
                )));
            }
        }
        Ok(())
    }

    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Proxy a search to the metadata provider; the upstream JSON passes through
/// untouched.
async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MetadataQuery>,
) -> AppResult<Json<serde_json::Value>> {
    query.validate()?;

    let payload = state
        .metadata
        .search(
            query.query.trim(),
            query.content_type.as_deref(),
            query.year,
            query.limit(),
        )
        .await?;

    Ok(Json(payload))
}

/// Best-candidate description for a title.
async fn description(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MetadataQuery>,
) -> AppResult<Json<DescriptionResponse>> {
    query.validate()?;

    let response = state
        .metadata
        .describe(
            query.query.trim(),
            query.content_type.as_deref(),
            query.year,
            query.limit(),
        )
        .await?;

    Ok(Json(response))
}
