use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub list_id: String,
    pub title: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub item_type: String,
    pub cover_url: String,
    pub genre: Option<String>,
    pub year: Option<i64>,
    pub watched: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
