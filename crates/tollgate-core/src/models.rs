//! Domain models for Tollgate.
//!
//! These are the core types shared across all crates.

pub mod config_entry;
pub mod group;
pub mod session;
pub mod user;
