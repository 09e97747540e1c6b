use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::db::models::List;
use crate::error::{AppError, AppResult};

// ============================================================================
// List Repository
// ============================================================================

/// A list shared with the caller, joined with its owner's username.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct SharedListRow {
    pub id: String,
    pub name: String,
    pub owner: String,
}

pub struct ListRepository;

impl ListRepository {
    pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<List>> {
        sqlx::query_as::<_, List>(
            r#"
            SELECT id, user_id, name, created_at, updated_at
            FROM lists
            WHERE user_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn create(pool: &SqlitePool, user_id: &str, name: &str) -> AppResult<List> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, List>(
            r#"
            INSERT INTO lists (id, user_id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, user_id, name, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Owner of a list, or `None` when the list does not exist. Callers decide
    /// how to surface absence; the access guard folds it into a denial.
    pub async fn find_owner(pool: &SqlitePool, list_id: &str) -> AppResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT user_id FROM lists WHERE id = ?")
            .bind(list_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row.map(|(owner,)| owner))
    }

    pub async fn rename(pool: &SqlitePool, list_id: &str, name: &str) -> AppResult<List> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, List>(
            r#"
            UPDATE lists
            SET name = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, user_id, name, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(now)
        .bind(list_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, list_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM lists WHERE id = ?")
            .bind(list_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Lists shared with `user_id`, with the owner's username for display.
    pub async fn list_shared_with(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Vec<SharedListRow>> {
        sqlx::query_as::<_, SharedListRow>(
            r#"
            SELECT l.id AS id, l.name AS name, u.username AS owner
            FROM shared_lists s
            JOIN lists l ON s.list_id = l.id
            JOIN users u ON s.owner_id = u.id
            WHERE s.shared_with_id = ?
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
