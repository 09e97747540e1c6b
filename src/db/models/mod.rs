//! Database models split into separate files.

pub mod item;
pub mod list;
pub mod log;
pub mod share;
pub mod user;

pub use self::item::*;
pub use self::list::*;
pub use self::log::*;
pub use self::share::*;
pub use self::user::*;
