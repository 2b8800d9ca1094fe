pub mod clock;
pub mod config;
pub mod error;
pub mod format;
pub mod id;
pub mod models;
pub mod pagination;
pub mod password;
pub mod repository;
pub mod token;
