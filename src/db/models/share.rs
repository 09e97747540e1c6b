use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A share grant: gives `shared_with_id` read access to `list_id` without
/// transferring ownership.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SharedList {
    pub id: String,
    pub list_id: String,
    pub owner_id: String,
    pub shared_with_id: String,
    pub created_at: NaiveDateTime,
}
