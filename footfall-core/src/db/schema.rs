//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//!
//! The engine owns exactly two tables: the anonymized request log and the
//! rotating salt. Orders never land here; they stay in the host shop system
//! and are read through the order repository trait.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: request log + salt singleton
    r#"
    -- ============================================
    -- Anonymized request log
    -- ============================================

    CREATE TABLE IF NOT EXISTS request_log (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        pseudonymous_id  TEXT NOT NULL,
        device_type      TEXT NOT NULL,      -- 'mobile', 'tablet', 'desktop', 'unknown'
        channel_token    TEXT NOT NULL,
        created_at       DATETIME NOT NULL   -- RFC 3339, compared as text
    );

    CREATE INDEX IF NOT EXISTS idx_request_log_channel_created
        ON request_log(channel_token, created_at);
    CREATE INDEX IF NOT EXISTS idx_request_log_created
        ON request_log(created_at);

    -- ============================================
    -- Rotating salt (singleton row)
    -- ============================================

    CREATE TABLE IF NOT EXISTS visitor_salt (
        id               INTEGER PRIMARY KEY CHECK (id = 1),
        salt             TEXT NOT NULL,
        updated_at       DATETIME NOT NULL
    );
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
