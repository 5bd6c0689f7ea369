//! # footfall-core
//!
//! Core library for footfall - privacy-first storefront analytics.
//!
//! This library provides:
//! - Domain types for request signals, anonymized records, visits, and metrics
//! - A capture pipeline that anonymizes and batches inbound request signals
//! - Database storage layer with SQLite
//! - A metrics aggregation service with pluggable strategies
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Layer 0 (Capture):** Inbound request signals, filtered and anonymized
//!   off the request path (identity never persisted)
//! - **Layer 1 (Storage):** Anonymized request log in SQLite, bulk-deleted by
//!   the retention sweeper
//! - **Layer 2 (Derived):** Visits, month buckets, and metric summaries,
//!   recomputed on demand and cached per query
//!
//! ## Example
//!
//! ```rust,no_run
//! use footfall_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use aggregation::{MetricsService, OrderRepository};
pub use capture::{CapturePipeline, RecordingPolicy, RetentionSweeper};
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod aggregation;
pub mod capture;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod types;
