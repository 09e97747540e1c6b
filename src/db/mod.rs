pub mod models;
pub mod repository;

pub use models::*;
pub use repository::*;

/// In-memory database for unit tests. A single connection keeps every test
/// query on the same `:memory:` instance.
#[cfg(test)]
pub async fn test_pool() -> sqlx::SqlitePool {
    use std::str::FromStr;

    let options = sqlx::sqlite::SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("in-memory connect options");
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("in-memory pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    pool
}
