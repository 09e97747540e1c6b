pub mod auth;
pub mod health;
pub mod items;
pub mod lists;
pub mod logs;
pub mod metadata;
pub mod users;
