use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::db::models::Item;
use crate::error::{AppError, AppResult};

// ============================================================================
// Item Repository
// ============================================================================

/// Whitelisted sort columns. The SQL expression always comes from this enum,
/// never from the request string itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    CreatedAt,
    Title,
    Year,
    Genre,
}

impl SortBy {
    fn column(self) -> &'static str {
        match self {
            SortBy::CreatedAt => "created_at",
            SortBy::Title => "title",
            SortBy::Year => "year",
            SortBy::Genre => "genre",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::CreatedAt => "created_at",
            SortBy::Title => "title",
            SortBy::Year => "year",
            SortBy::Genre => "genre",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemQuery {
    pub sort_by: SortBy,
    pub order: SortOrder,
    pub limit: i64,
    pub offset: i64,
    pub genre: Option<String>,
}

/// Partial update for an item. Present fields map to a fixed, order-stable set
/// of parameterized assignment clauses; column names are never taken from the
/// request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemChanges {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub cover_url: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i64>,
    pub watched: Option<bool>,
}

impl ItemChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.item_type.is_none()
            && self.cover_url.is_none()
            && self.genre.is_none()
            && self.year.is_none()
            && self.watched.is_none()
    }
}

pub struct ItemRepository;

impl ItemRepository {
    pub async fn list_for_list(
        pool: &SqlitePool,
        list_id: &str,
        query: &ItemQuery,
    ) -> AppResult<Vec<Item>> {
        // Stable secondary sort by id so pagination never shuffles ties.
        let order_clause = format!(
            "{col} {dir}, id {dir}",
            col = query.sort_by.column(),
            dir = query.order.sql()
        );

        let mut sql = String::from(
            "SELECT id, list_id, title, type, cover_url, genre, year, watched, \
             created_at, updated_at FROM items WHERE list_id = ?",
        );
        if query.genre.is_some() {
            sql.push_str(" AND genre LIKE ?");
        }
        sql.push_str(&format!(" ORDER BY {} LIMIT ? OFFSET ?", order_clause));

        let mut q = sqlx::query_as::<_, Item>(&sql).bind(list_id);
        if let Some(genre) = &query.genre {
            q = q.bind(format!("%{}%", genre));
        }
        q.bind(query.limit)
            .bind(query.offset)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn create(
        pool: &SqlitePool,
        list_id: &str,
        title: &str,
        item_type: &str,
        cover_url: &str,
        genre: Option<&str>,
    ) -> AppResult<Item> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (id, list_id, title, type, cover_url, genre, watched, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING id, list_id, title, type, cover_url, genre, year, watched, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(list_id)
        .bind(title)
        .bind(item_type)
        .bind(cover_url)
        .bind(genre)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// The item's parent list, or `None` when the item does not exist. Item
    /// ownership is always resolved through the list, never independently.
    pub async fn find_list_id(pool: &SqlitePool, item_id: &str) -> AppResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT list_id FROM items WHERE id = ?")
            .bind(item_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row.map(|(list_id,)| list_id))
    }

    pub async fn update(
        pool: &SqlitePool,
        item_id: &str,
        changes: &ItemChanges,
    ) -> AppResult<Item> {
        let now = Utc::now().naive_utc();

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE items SET ");
        {
            let mut sets = qb.separated(", ");
            if let Some(title) = &changes.title {
                sets.push("title = ");
                sets.push_bind_unseparated(title);
            }
            if let Some(item_type) = &changes.item_type {
                sets.push("type = ");
                sets.push_bind_unseparated(item_type);
            }
            if let Some(cover_url) = &changes.cover_url {
                sets.push("cover_url = ");
                sets.push_bind_unseparated(cover_url);
            }
            if let Some(genre) = &changes.genre {
                sets.push("genre = ");
                sets.push_bind_unseparated(genre);
            }
            if let Some(year) = changes.year {
                sets.push("year = ");
                sets.push_bind_unseparated(year);
            }
            if let Some(watched) = changes.watched {
                sets.push("watched = ");
                sets.push_bind_unseparated(watched);
            }
            sets.push("updated_at = ");
            sets.push_bind_unseparated(now);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(item_id);
        qb.push(
            " RETURNING id, list_id, title, type, cover_url, genre, year, watched, \
             created_at, updated_at",
        );

        qb.build_query_as::<Item>()
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, item_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(item_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Distinct genres of a list. Stored values are comma-separated; split,
    /// trim, dedupe and sort case-insensitively.
    pub async fn genres(pool: &SqlitePool, list_id: &str) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT genre FROM items WHERE list_id = ? AND genre IS NOT NULL AND genre <> ''",
        )
        .bind(list_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        let mut genres: Vec<String> = rows
            .iter()
            .flat_map(|(g,)| g.split(','))
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .map(|g| g.to_string())
            .collect();

        genres.sort_by_key(|g| g.to_lowercase());
        genres.dedup_by(|a, b| a.to_lowercase() == b.to_lowercase());

        Ok(genres)
    }
}
