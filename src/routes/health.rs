use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub database: String,
    pub timestamp: String,
}

/// Liveness plus a store connectivity probe. A broken pool reports `degraded`
/// with 503 so orchestrators can pull the instance out of rotation.
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();

    let (code, status, database) = if db_ok {
        (StatusCode::OK, "healthy", "up")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "down")
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: database.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::test_pool;
    use crate::services::metadata::MetadataService;

    async fn test_state() -> Arc<AppState> {
        let config = Config::default();
        let metadata = MetadataService::new(&config.metadata).unwrap();
        Arc::new(AppState {
            db: test_pool().await,
            config,
            metadata,
        })
    }

    #[tokio::test]
    async fn reports_healthy_with_reachable_store() {
        let state = test_state().await;

        let (code, Json(body)) = health_check(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.status, "healthy");
        assert_eq!(body.database, "up");
        assert_eq!(body.service, env!("CARGO_PKG_NAME"));
    }

    #[tokio::test]
    async fn reports_degraded_when_store_is_down() {
        let state = test_state().await;
        state.db.close().await;

        let (code, Json(body)) = health_check(State(state)).await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.database, "down");
    }
}
