use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::auth::AuthService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/check", get(auth_check))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub user_id: String,
    pub token: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new account and issue the first token.
async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let (user, token) = AuthService::register(&state, &request.username, &request.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered".to_string(),
            user_id: user.id,
            token,
        }),
    ))
}

/// Verify credentials and issue a fresh token.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (user, token) = AuthService::login(&state, &request.username, &request.password).await?;

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        user_id: user.id,
        token,
    }))
}

/// Cheap token probe for the frontend.
async fn auth_check(AuthUser(_user): AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Authorized" }))
}

// ============================================================================
// Auth Middleware / Extractor
// ============================================================================

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Extractor for authenticated user.
pub struct AuthUser(pub crate::db::User);

/// Extractor for routes that permit anonymous callers. A missing header is
/// anonymous; a present-but-invalid token still rejects.
pub struct MaybeAuthUser(pub Option<crate::db::User>);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let header = match parts.headers.get(http::header::AUTHORIZATION) {
        Some(value) => value.to_str().map_err(|_| AppError::Unauthorized)?,
        None => return Ok(None),
    };

    if !header.to_ascii_lowercase().starts_with("bearer ") {
        tracing::debug!("Authorization header doesn't start with 'Bearer '");
        return Err(AppError::Unauthorized);
    }

    let token = header[7..].trim();
    if token.is_empty() {
        tracing::debug!("Empty bearer token in Authorization header");
        return Err(AppError::Unauthorized);
    }

    Ok(Some(token))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or_else(|| {
            tracing::debug!("Missing Authorization header");
            AppError::Unauthorized
        })?;

        let user = AuthService::get_user_from_token(state, token)
            .await
            .map_err(|e| {
                tracing::debug!("Failed to get user from token: {:?}", e);
                e
            })?;

        tracing::debug!("Authenticated user: {}", user.id);
        Ok(AuthUser(user))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            None => Ok(MaybeAuthUser(None)),
            Some(token) => {
                let user = AuthService::get_user_from_token(state, token).await?;
                Ok(MaybeAuthUser(Some(user)))
            }
        }
    }
}
