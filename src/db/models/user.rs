use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Opaque password hash, tagged by algorithm prefix. Current accounts use
    /// bcrypt; accounts created before the migration may still hold the legacy
    /// `sha256$...` format until their next successful login.
    pub password: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
