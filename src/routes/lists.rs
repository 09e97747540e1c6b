use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{List, ListRepository, ShareRepository, SharedListRow, UserRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::access::{AccessControl, AccessMode};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_lists).post(create_list))
        // Lists shared with the caller; must come before the generic "/:id"
        .route("/shared", get(get_shared_lists))
        .route("/:id", axum::routing::patch(rename_list).delete(delete_list))
        .route("/:id/share", post(share_list))
        .route("/:id/share/:username", delete(revoke_share))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateListRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameListRequest {
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub id: String,
    pub name: String,
}

impl From<List> for ListResponse {
    fn from(l: List) -> Self {
        Self {
            id: l.id,
            name: l.name,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Lists owned by the caller.
async fn get_lists(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<ListResponse>>> {
    let lists = ListRepository::list_for_user(&state.db, &user.id).await?;
    Ok(Json(lists.into_iter().map(Into::into).collect()))
}

async fn create_list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateListRequest>,
) -> AppResult<(StatusCode, Json<ListResponse>)> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("List name must not be empty".to_string()));
    }

    let list = ListRepository::create(&state.db, &user.id, name).await?;
    Ok((StatusCode::CREATED, Json(list.into())))
}

async fn rename_list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(list_id): Path<String>,
    Json(request): Json<RenameListRequest>,
) -> AppResult<Json<ListResponse>> {
    AccessControl::authorize_list(&state.db, &user.id, &list_id, AccessMode::Write).await?;

    let name = request.new_name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("List name must not be empty".to_string()));
    }

    let list = ListRepository::rename(&state.db, &list_id, name).await?;
    Ok(Json(list.into()))
}

async fn delete_list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(list_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    AccessControl::authorize_list(&state.db, &user.id, &list_id, AccessMode::Write).await?;

    ListRepository::delete(&state.db, &list_id).await?;
    Ok(Json(serde_json::json!({ "message": "List deleted successfully" })))
}

/// Grant another user read access to an owned list.
async fn share_list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(list_id): Path<String>,
    Json(request): Json<ShareRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let grantee = UserRepository::find_by_username(&state.db, &request.username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    AccessControl::authorize_list(&state.db, &user.id, &list_id, AccessMode::Write).await?;

    if grantee.id == user.id {
        return Err(AppError::BadRequest(
            "Cannot share a list with yourself".to_string(),
        ));
    }

    ShareRepository::create(&state.db, &list_id, &user.id, &grantee.id).await?;

    tracing::info!("User {} shared list {} with {}", user.id, list_id, grantee.id);
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "List shared successfully" })),
    ))
}

/// Revoke a previously granted share.
async fn revoke_share(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((list_id, username)): Path<(String, String)>,
) -> AppResult<Json<serde_json::Value>> {
    let grantee = UserRepository::find_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    AccessControl::authorize_list(&state.db, &user.id, &list_id, AccessMode::Write).await?;

    ShareRepository::delete(&state.db, &list_id, &grantee.id).await?;
    Ok(Json(serde_json::json!({ "message": "Share revoked" })))
}

/// Lists other users shared with the caller.
async fn get_shared_lists(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<SharedListRow>>> {
    let rows = ListRepository::list_shared_with(&state.db, &user.id).await?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db::test_pool;
    use crate::services::metadata::MetadataService;

    async fn test_app() -> Router {
        let mut config = Config::default();
        config.jwt.secret = "test-secret".to_string();
        let metadata = MetadataService::new(&config.metadata).unwrap();
        let state = Arc::new(AppState {
            db: test_pool().await,
            config,
            metadata,
        });

        Router::new()
            .nest("/api/auth", crate::routes::auth::router())
            .nest("/api/lists", router())
            .nest("/api/items", crate::routes::items::router())
            .with_state(state)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register(app: &Router, username: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(serde_json::json!({ "username": username, "password": "pw1234" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn sharing_grants_reads_but_never_writes() {
        let app = test_app().await;
        let alice = register(&app, "alice").await;
        let bob = register(&app, "bob").await;

        let (status, list) = send(
            &app,
            Method::POST,
            "/api/lists",
            Some(&alice),
            Some(serde_json::json!({ "name": "Movies" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let list_id = list["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/items",
            Some(&alice),
            Some(serde_json::json!({ "list_id": list_id, "title": "Stalker", "type": "movie" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        // Before sharing, bob can neither read nor write.
        let items_uri = format!("/api/items?list_id={list_id}");
        let (status, _) = send(&app, Method::GET, &items_uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/lists/{list_id}"),
            Some(&bob),
            Some(serde_json::json!({ "new_name": "Bob's now" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/lists/{list_id}/share"),
            Some(&alice),
            Some(serde_json::json!({ "username": "bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        // After sharing, reads open up; writes stay owner-only.
        let (status, body) = send(&app, Method::GET, &items_uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["title"], "Stalker");

        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/lists/{list_id}"),
            Some(&bob),
            Some(serde_json::json!({ "new_name": "Bob's now" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, Method::GET, "/api/lists/shared", Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["owner"], "alice");
        assert_eq!(body[0]["name"], "Movies");

        // Revocation closes reads again.
        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/lists/{list_id}/share/bob"),
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::GET, &items_uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn absent_list_denies_like_a_foreign_one() {
        let app = test_app().await;
        let alice = register(&app, "alice").await;

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/items?list_id=no-such-list",
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn self_share_and_unknown_grantee_rejected() {
        let app = test_app().await;
        let alice = register(&app, "alice").await;

        let (status, list) = send(
            &app,
            Method::POST,
            "/api/lists",
            Some(&alice),
            Some(serde_json::json!({ "name": "Movies" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let list_id = list["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/lists/{list_id}/share"),
            Some(&alice),
            Some(serde_json::json!({ "username": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/lists/{list_id}/share"),
            Some(&alice),
            Some(serde_json::json!({ "username": "nobody" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn requests_without_token_are_unauthorized() {
        let app = test_app().await;

        let (status, _) = send(&app, Method::GET, "/api/lists", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, Method::GET, "/api/lists", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
