//! Database layer for footfall
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository operations for the anonymized request log
//! - The rotating-salt singleton row

pub mod repo;
pub mod schema;

pub use repo::Database;
