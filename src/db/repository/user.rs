use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::User;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository
// ============================================================================

pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_username(pool: &SqlitePool, username: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password, created_at, updated_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Insert a new user. A duplicate username surfaces as `Conflict` via the
    /// store's UNIQUE constraint.
    pub async fn create(
        pool: &SqlitePool,
        username: &str,
        password_hash: &str,
    ) -> AppResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, password, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, username, password, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(username)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::from_insert(e, "Username already exists"))
    }

    pub async fn update_password(
        pool: &SqlitePool,
        user_id: &str,
        password_hash: &str,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();

        sqlx::query("UPDATE users SET password = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(now)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
