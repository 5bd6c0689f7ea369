//! Error types for footfall-core

use thiserror::Error;

/// Main error type for the footfall-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A bucketed entity is missing a usable timestamp.
    ///
    /// Fatal for the whole bucketing call; never skipped per-entity.
    #[error("invalid timestamp on {entity}: field {field} is absent or unreadable")]
    InvalidTimestamp { entity: String, field: String },

    /// Capture queue error (worker gone, channel closed)
    #[error("capture queue error: {0}")]
    Queue(String),

    /// Salt store error
    #[error("salt error: {0}")]
    Salt(String),

    /// Metric strategy error
    #[error("metric error: {0}")]
    Metric(String),
}

/// Result type alias for footfall-core
pub type Result<T> = std::result::Result<T, Error>;
