pub mod items;
pub mod lists;
pub mod logs;
pub mod shares;
pub mod user;

pub use items::{ItemChanges, ItemQuery, ItemRepository, SortBy, SortOrder};
pub use lists::{ListRepository, SharedListRow};
pub use logs::LogRepository;
pub use shares::ShareRepository;
pub use user::UserRepository;
