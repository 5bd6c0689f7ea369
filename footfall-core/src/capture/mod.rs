//! Request capture pipeline
//!
//! The write path of the analytics engine: turns inbound storefront request
//! signals into anonymized records without ever blocking the host's request
//! handling.
//!
//! ## Architecture
//!
//! Capture follows a "never in the hot path" principle:
//! - `observe` does one policy check and one bounded-channel send, nothing else
//! - Anonymization and storage writes happen on a dedicated flush task
//! - A full channel or a failing database drops events instead of stalling
//!   request handling; drops are counted and logged
//!
//! The flush task batches events, folds each one into a salted pseudonymous
//! id plus a coarse device type, and writes the batch in one transaction.
//! Client addresses and user agents never leave this module in raw form.
//!
//! ## Usage
//!
//! Tune the pipeline in `~/.config/footfall/config.toml`:
//!
//! ```toml
//! [capture]
//! batch_size = 10
//! queue_capacity = 1024
//! flush_interval_secs = 5
//! ```

mod anonymizer;
mod batcher;
mod policy;
mod retention;
mod salt;

pub use anonymizer::Anonymizer;
pub use batcher::{BatchSink, CaptureStats, EventBatcher};
pub use policy::{DefaultRecordingPolicy, RecordingPolicy};
pub use retention::RetentionSweeper;
pub use salt::SaltService;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::CaptureConfig;
use crate::db::Database;
use crate::error::Result;
use crate::types::{RawEvent, RequestSignal};

/// The assembled capture pipeline: policy in front, batcher and anonymizer
/// behind it.
///
/// Hosts construct one of these at startup, call [`CapturePipeline::observe`]
/// from their request middleware, and [`CapturePipeline::shutdown`] when the
/// process exits.
pub struct CapturePipeline {
    policy: Box<dyn RecordingPolicy>,
    batcher: EventBatcher,
}

impl CapturePipeline {
    /// Build the default pipeline: browser-only recording policy, salted
    /// anonymizer sink. Must be called from within a tokio runtime.
    pub fn new(db: Arc<Database>, config: &CaptureConfig) -> Self {
        Self::with_policy(db, config, Box::new(DefaultRecordingPolicy::new()))
    }

    /// Build the pipeline with a custom recording policy.
    pub fn with_policy(
        db: Arc<Database>,
        config: &CaptureConfig,
        policy: Box<dyn RecordingPolicy>,
    ) -> Self {
        let salt = Arc::new(SaltService::new(db.clone()));
        let sink = Arc::new(Anonymizer::new(db, salt));

        Self {
            policy,
            batcher: EventBatcher::spawn(sink, config),
        }
    }

    /// Handle one inbound request signal. Cheap, non-blocking, infallible
    /// from the caller's point of view.
    pub fn observe(&self, signal: &RequestSignal) {
        self.observe_at(signal, Utc::now());
    }

    pub fn observe_at(&self, signal: &RequestSignal, now: DateTime<Utc>) {
        if !self.policy.should_record(signal) {
            tracing::trace!("Recording policy rejected request signal");
            return;
        }

        self.batcher.record(RawEvent::from_signal(signal, now));
    }

    /// Wait until everything observed so far has been written.
    pub async fn flush(&self) -> Result<()> {
        self.batcher.flush().await
    }

    /// Snapshot of the capture counters
    pub fn stats(&self) -> CaptureStats {
        self.batcher.stats()
    }

    /// Flush remaining events and stop the flush task.
    pub async fn shutdown(self) -> Result<CaptureStats> {
        self.batcher.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pipeline_db() -> Arc<Database> {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        Arc::new(db)
    }

    fn make_config() -> CaptureConfig {
        CaptureConfig {
            batch_size: 10,
            queue_capacity: 64,
            flush_interval_secs: 3600,
            max_retries: 0,
        }
    }

    fn make_signal(user_agent: &str) -> RequestSignal {
        RequestSignal {
            client_address: "203.0.113.7".to_string(),
            user_agent: user_agent.to_string(),
            channel_token: "shop-a".to_string(),
            body: None,
        }
    }

    #[tokio::test]
    async fn test_pipeline_records_accepted_signals_only() {
        let db = make_pipeline_db();
        let pipeline = CapturePipeline::new(db.clone(), &make_config());

        pipeline.observe(&make_signal("Mozilla/5.0 (iPhone) Mobile Safari"));
        pipeline.observe(&make_signal("curl/8.4.0"));
        pipeline.flush().await.unwrap();

        assert_eq!(db.count_records().unwrap(), 1);

        let stats = pipeline.shutdown().await.unwrap();
        // The rejected signal never reached the batcher.
        assert_eq!(stats.received, 1);
        assert_eq!(stats.recorded, 1);
        assert_eq!(stats.dropped, 0);
    }

    #[tokio::test]
    async fn test_pipeline_anonymizes_before_storage() {
        let db = make_pipeline_db();
        let pipeline = CapturePipeline::new(db.clone(), &make_config());

        pipeline.observe(&make_signal("Mozilla/5.0 (iPhone) Mobile Safari"));
        pipeline.flush().await.unwrap();

        let records = db.find_records_since(None, Utc::now() - chrono::Duration::hours(1), 10, 0).unwrap();
        assert_eq!(records.len(), 1);
        // Nothing recognizable survives, only the salted hash.
        assert_ne!(records[0].pseudonymous_id, "203.0.113.7");
        assert_eq!(records[0].pseudonymous_id.len(), 64);
        assert_eq!(records[0].device_type, crate::types::DeviceType::Mobile);

        pipeline.shutdown().await.unwrap();
    }
}
