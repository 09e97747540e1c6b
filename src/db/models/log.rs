use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Frontend event log entry. `user_id` is NULL for anonymous events.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub event: String,
    pub data: String,
    pub user_id: Option<String>,
    pub created_at: NaiveDateTime,
}
