//! Rotating anonymization salt.
//!
//! Pseudonymous visitor ids are salted hashes; the salt rotates daily so ids
//! cannot be correlated across days. The current salt lives in a singleton
//! storage row shared by every process, with a per-process in-memory cache
//! in front of it.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::SaltRecord;

/// Salts older than this are never used, only replaced.
const ROTATION_PERIOD_HOURS: i64 = 24;

/// Serves the current anonymization salt, rotating it when it expires.
///
/// Lookup order is in-memory cache, then the storage singleton, then a fresh
/// rotation. After writing a fresh salt the service reads it back and adopts
/// whatever the read returns, so concurrent processes that rotate at the same
/// moment converge on a single winner instead of diverging.
pub struct SaltService {
    db: Arc<Database>,
    cached: Mutex<Option<SaltRecord>>,
}

impl SaltService {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            cached: Mutex::new(None),
        }
    }

    /// Get the current salt, rotating first if the stored one has expired.
    pub fn current_salt(&self) -> Result<String> {
        self.current_salt_at(Utc::now())
    }

    pub(crate) fn current_salt_at(&self, now: DateTime<Utc>) -> Result<String> {
        let mut cached = self.cached.lock().unwrap();

        if let Some(record) = cached.as_ref() {
            if Self::is_fresh(record, now) {
                return Ok(record.salt.clone());
            }
        }

        // Cache is cold or expired; another process may have rotated already.
        if let Some(record) = self.db.find_salt()? {
            if Self::is_fresh(&record, now) {
                let salt = record.salt.clone();
                *cached = Some(record);
                return Ok(salt);
            }
        }

        // Write a fresh salt, then re-read so concurrent rotations agree on
        // the value that actually landed.
        let fresh = Uuid::new_v4().simple().to_string();
        self.db.upsert_salt(&fresh, now)?;

        let record = self
            .db
            .find_salt()?
            .ok_or_else(|| Error::Salt("salt row missing after rotation".to_string()))?;

        tracing::info!("Rotated anonymization salt");

        let salt = record.salt.clone();
        *cached = Some(record);
        Ok(salt)
    }

    fn is_fresh(record: &SaltRecord, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(record.updated_at) < Duration::hours(ROTATION_PERIOD_HOURS)
    }
}
