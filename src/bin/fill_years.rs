//! Offline backfill for `items.year`.
//!
//! Reads items missing a release year, asks the running service's metadata
//! description endpoint for the best match, and writes the resolved years back
//! in batches. Runs as an external HTTP client of the backend so the API key
//! and match selection stay server-side.

use std::time::Duration;

use clap::Parser;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const YEAR_MIN: i64 = 1888;
const YEAR_MAX: i64 = 2100;

#[derive(Debug, Parser)]
#[command(name = "fill_years", about = "Fill missing item years via the metadata proxy")]
struct Args {
    /// Process every item, not only those missing a year
    #[arg(long)]
    all: bool,

    /// Limit the number of items processed
    #[arg(long)]
    limit: Option<i64>,

    /// Resolve years but do not write to the database
    #[arg(long)]
    dry_run: bool,

    /// Batch size for UPDATE commits
    #[arg(long, default_value_t = 200)]
    batch: usize,

    /// Parallel requests against the backend
    #[arg(long, default_value_t = 5, env = "FILL_YEARS_CONCURRENCY")]
    concurrency: usize,

    /// Base URL of the running backend
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "FILL_YEARS_BACKEND")]
    backend: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 100, env = "FILL_YEARS_TIMEOUT_SECONDS")]
    timeout_seconds: u64,
}

#[derive(Debug, sqlx::FromRow)]
struct PendingItem {
    id: String,
    title: String,
    #[sqlx(rename = "type")]
    item_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DescriptionPayload {
    #[serde(rename = "match")]
    best_match: Option<MatchPayload>,
}

#[derive(Debug, Deserialize)]
struct MatchPayload {
    year: Option<i64>,
}

/// Map localized type labels stored by older frontends onto API type names.
fn normalize_type(raw: &str) -> String {
    let t = raw.trim().to_lowercase();
    match t.as_str() {
        "фильм" | "movie" => "movie".to_string(),
        "сериал" | "tv-series" => "tv-series".to_string(),
        "аниме" | "anime" => "anime".to_string(),
        "мультфильм" | "cartoon" => "cartoon".to_string(),
        _ => t,
    }
}

async fn fetch_items(pool: &SqlitePool, only_missing: bool, limit: Option<i64>) -> anyhow::Result<Vec<PendingItem>> {
    let mut sql = String::from("SELECT id, title, type FROM items");
    if only_missing {
        sql.push_str(" WHERE year IS NULL");
    }
    sql.push_str(" ORDER BY created_at ASC");
    if limit.is_some() {
        sql.push_str(" LIMIT ?");
    }

    let mut query = sqlx::query_as::<_, PendingItem>(&sql);
    if let Some(n) = limit {
        query = query.bind(n);
    }

    Ok(query.fetch_all(pool).await?)
}

async fn resolve_year(
    client: &reqwest::Client,
    backend: &str,
    item: &PendingItem,
) -> Option<i64> {
    let mut params: Vec<(&str, String)> = vec![("query", item.title.clone())];
    if let Some(t) = item.item_type.as_deref().filter(|t| !t.trim().is_empty()) {
        params.push(("type", normalize_type(t)));
    }

    let url = format!("{}/api/metadata/description", backend.trim_end_matches('/'));
    let response = match client.get(&url).query(&params).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("Request failed for «{}»: {}", item.title, e);
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::warn!(
            "Backend returned {} for «{}»",
            response.status(),
            item.title
        );
        return None;
    }

    let payload: DescriptionPayload = match response.json().await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("Bad payload for «{}»: {}", item.title, e);
            return None;
        }
    };

    payload.best_match.and_then(|m| m.year)
}

async fn commit_batch(pool: &SqlitePool, updates: &[(String, i64)]) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    for (id, year) in updates {
        sqlx::query("UPDATE items SET year = ? WHERE id = ?")
            .bind(year)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fill_years=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();

    let db_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/app.db".to_string());
    let db_path = db_url.strip_prefix("sqlite://").unwrap_or(&db_url).to_string();

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(sqlx::sqlite::SqliteConnectOptions::new().filename(&db_path))
        .await?;

    let items = fetch_items(&pool, !args.all, args.limit).await?;
    if items.is_empty() {
        tracing::info!("Nothing to process");
        return Ok(());
    }
    tracing::info!("Resolving years for {} items", items.len());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout_seconds))
        .build()?;

    let resolved: Vec<Option<(String, i64)>> = stream::iter(items.iter())
        .map(|item| {
            let client = &client;
            let backend = &args.backend;
            async move {
                match resolve_year(client, backend, item).await {
                    Some(year) if (YEAR_MIN..=YEAR_MAX).contains(&year) => {
                        tracing::info!("[OK] {} «{}» -> {}", item.id, item.title, year);
                        Some((item.id.clone(), year))
                    }
                    _ => {
                        tracing::info!("[SKIP] {} «{}» -> not found", item.id, item.title);
                        None
                    }
                }
            }
        })
        .buffer_unordered(args.concurrency.max(1))
        .collect()
        .await;

    let updates: Vec<(String, i64)> = resolved.into_iter().flatten().collect();
    tracing::info!("Resolved {} years", updates.len());

    if args.dry_run {
        tracing::info!("Dry run; not writing to the database");
        return Ok(());
    }

    for chunk in updates.chunks(args.batch.max(1)) {
        commit_batch(&pool, chunk).await?;
        tracing::info!("Committed batch of {}", chunk.len());
    }

    tracing::info!("Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_aliases_normalize() {
        assert_eq!(normalize_type("Фильм"), "movie");
        assert_eq!(normalize_type("сериал"), "tv-series");
        assert_eq!(normalize_type("tv-show"), "tv-show");
        assert_eq!(normalize_type(" Anime "), "anime");
    }
}
