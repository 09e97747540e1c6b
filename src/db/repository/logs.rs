use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::LogEntry;
use crate::error::{AppError, AppResult};

// ============================================================================
// Log Repository
// ============================================================================

pub struct LogRepository;

impl LogRepository {
    pub async fn insert(
        pool: &SqlitePool,
        event: &str,
        data: &str,
        user_id: Option<&str>,
    ) -> AppResult<LogEntry> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, LogEntry>(
            r#"
            INSERT INTO logs (id, event, data, user_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, event, data, user_id, created_at
            "#,
        )
        .bind(&id)
        .bind(event)
        .bind(data)
        .bind(user_id)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, UserRepository};

    #[tokio::test]
    async fn anonymous_entries_have_no_user() {
        let pool = test_pool().await;

        let entry = LogRepository::insert(&pool, "page_view", "{}", None).await.unwrap();
        assert_eq!(entry.event, "page_view");
        assert_eq!(entry.data, "{}");
        assert!(entry.user_id.is_none());
    }

    #[tokio::test]
    async fn attributed_entries_keep_the_user() {
        let pool = test_pool().await;
        let user = UserRepository::create(&pool, "alice", "$2b$04$x").await.unwrap();

        let entry = LogRepository::insert(&pool, "item_added", r#"{"title":"Alien"}"#, Some(&user.id))
            .await
            .unwrap();
        assert_eq!(entry.user_id.as_deref(), Some(user.id.as_str()));
        assert_eq!(entry.data, r#"{"title":"Alien"}"#);
    }
}
