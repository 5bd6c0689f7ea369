//! Retention sweeping.
//!
//! Anonymized records only need to exist while the charts can still show
//! them. The sweeper bulk-deletes records older than a configured multiple
//! of the reporting window, once at startup and then on a timer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::aggregation::buckets::shift_months;
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;

/// Deletes anonymized records that have aged out of the retention window.
pub struct RetentionSweeper {
    db: Arc<Database>,
    retention_months: u32,
    sweep_interval: Duration,
}

impl RetentionSweeper {
    pub fn new(db: Arc<Database>, config: &Config) -> Self {
        Self {
            db,
            retention_months: config.retention_months(),
            sweep_interval: Duration::from_secs(config.retention.sweep_interval_hours * 3600),
        }
    }

    /// Records strictly older than this instant are deleted; a record
    /// created exactly at the cutoff survives.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        shift_months(now, -(self.retention_months as i32))
    }

    /// Run one sweep now.
    pub fn sweep(&self) -> Result<usize> {
        self.sweep_at(Utc::now())
    }

    pub(crate) fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = self.cutoff(now);
        let deleted = self.db.delete_records_older_than(cutoff)?;

        if deleted > 0 {
            tracing::info!(
                "Swept {} records older than {}",
                deleted,
                cutoff.to_rfc3339()
            );
        } else {
            tracing::debug!("Retention sweep found nothing to delete");
        }

        Ok(deleted)
    }

    /// Sweep forever: once immediately, then on the configured interval.
    /// Failures are logged and the loop keeps going.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.sweep_interval);

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep() {
                tracing::error!("Retention sweep failed: {}", e);
            }
        }
    }
}
