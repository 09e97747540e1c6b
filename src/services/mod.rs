pub mod access;
pub mod auth;
pub mod init;
pub mod metadata;
pub mod password;
