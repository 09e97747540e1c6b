use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::SharedList;
use crate::error::{AppError, AppResult};

// ============================================================================
// Share Repository
// ============================================================================

pub struct ShareRepository;

impl ShareRepository {
    /// Create a share grant. A duplicate grant for the same (list, grantee)
    /// pair surfaces as `Conflict` via the UNIQUE constraint.
    pub async fn create(
        pool: &SqlitePool,
        list_id: &str,
        owner_id: &str,
        shared_with_id: &str,
    ) -> AppResult<SharedList> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, SharedList>(
            r#"
            INSERT INTO shared_lists (id, list_id, owner_id, shared_with_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, list_id, owner_id, shared_with_id, created_at
            "#,
        )
        .bind(&id)
        .bind(list_id)
        .bind(owner_id)
        .bind(shared_with_id)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::from_insert(e, "List is already shared with this user"))
    }

    pub async fn exists(
        pool: &SqlitePool,
        list_id: &str,
        shared_with_id: &str,
    ) -> AppResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM shared_lists WHERE list_id = ? AND shared_with_id = ?",
        )
        .bind(list_id)
        .bind(shared_with_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.is_some())
    }

    /// Revoke a grant.
    pub async fn delete(
        pool: &SqlitePool,
        list_id: &str,
        shared_with_id: &str,
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM shared_lists WHERE list_id = ? AND shared_with_id = ?")
            .bind(list_id)
            .bind(shared_with_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
