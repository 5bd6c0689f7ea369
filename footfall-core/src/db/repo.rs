//! Database repository layer
//!
//! Provides insert, query, and bulk-delete operations for the engine-owned
//! tables: the anonymized request log and the salt singleton.

use crate::error::Result;
use crate::types::{AnonymizedRecord, DeviceType, SaltRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable foreign keys and WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Request log operations
    // ============================================

    /// Insert a batch of anonymized records in one transaction.
    ///
    /// All-or-nothing: a failure rolls the whole batch back so the capture
    /// worker can retry it without leaving partial writes behind. The `id`
    /// field of the inputs is ignored; SQLite assigns row ids.
    pub fn insert_records(&self, records: &[AnonymizedRecord]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for record in records {
            tx.execute(
                r#"
                INSERT INTO request_log (pseudonymous_id, device_type, channel_token, created_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    record.pseudonymous_id,
                    record.device_type.as_str(),
                    record.channel_token,
                    record.created_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(records.len())
    }

    /// Load anonymized records with `created_at >= since`, oldest first.
    ///
    /// `channel_token = None` spans all channels. Paginated via limit/offset;
    /// callers loop until a short page.
    pub fn find_records_since(
        &self,
        channel_token: Option<&str>,
        since: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AnonymizedRecord>> {
        let conn = self.conn.lock().unwrap();
        let since_str = since.to_rfc3339();

        let mut records = Vec::new();
        match channel_token {
            Some(token) => {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, pseudonymous_id, device_type, channel_token, created_at
                    FROM request_log
                    WHERE channel_token = ?1 AND created_at >= ?2
                    ORDER BY created_at ASC, id ASC
                    LIMIT ?3 OFFSET ?4
                    "#,
                )?;
                let rows = stmt.query_map(
                    params![token, since_str, limit as i64, offset as i64],
                    Self::row_to_record,
                )?;
                for row in rows {
                    records.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, pseudonymous_id, device_type, channel_token, created_at
                    FROM request_log
                    WHERE created_at >= ?1
                    ORDER BY created_at ASC, id ASC
                    LIMIT ?2 OFFSET ?3
                    "#,
                )?;
                let rows = stmt.query_map(
                    params![since_str, limit as i64, offset as i64],
                    Self::row_to_record,
                )?;
                for row in rows {
                    records.push(row?);
                }
            }
        }

        Ok(records)
    }

    /// Bulk-delete records strictly older than the cutoff.
    ///
    /// A record with `created_at` exactly at the cutoff survives; the
    /// comparison is strict `<`. Returns the number of deleted rows.
    pub fn delete_records_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM request_log WHERE created_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(deleted)
    }

    /// Total number of stored records (all channels)
    pub fn count_records(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM request_log", [], |r| r.get(0))?;
        Ok(count)
    }

    fn row_to_record(row: &Row) -> rusqlite::Result<AnonymizedRecord> {
        let device_type_str: String = row.get("device_type")?;
        let created_at_str: String = row.get("created_at")?;

        Ok(AnonymizedRecord {
            id: row.get("id")?,
            pseudonymous_id: row.get("pseudonymous_id")?,
            device_type: device_type_str.parse().unwrap_or(DeviceType::Unknown),
            channel_token: row.get("channel_token")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    // ============================================
    // Salt operations
    // ============================================

    /// Load the salt singleton, if one has been persisted yet
    pub fn find_salt(&self) -> Result<Option<SaltRecord>> {
        let conn = self.conn.lock().unwrap();
        let result: Option<(String, String)> = conn
            .query_row(
                "SELECT salt, updated_at FROM visitor_salt WHERE id = 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        Ok(result.map(|(salt, updated_str)| SaltRecord {
            salt,
            updated_at: DateTime::parse_from_rfc3339(&updated_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }))
    }

    /// Insert or replace the salt singleton.
    ///
    /// Last writer wins; concurrent rotators converge by re-reading after
    /// the write.
    pub fn upsert_salt(&self, salt: &str, updated_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO visitor_salt (id, salt, updated_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                salt = excluded.salt,
                updated_at = excluded.updated_at
            "#,
            params![salt, updated_at.to_rfc3339()],
        )?;
        Ok(())
    }
}
