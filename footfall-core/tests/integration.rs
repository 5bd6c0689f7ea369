//! Integration tests for the footfall capture and aggregation pipeline
//!
//! These tests run the full flow against temporary SQLite databases: request
//! signals in, anonymized records stored, visits reconstructed, metric
//! summaries out.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use footfall_core::aggregation::{MemoryOrderRepository, MetricsService};
use footfall_core::capture::{CapturePipeline, RetentionSweeper};
use footfall_core::config::{CaptureConfig, Config};
use footfall_core::db::Database;
use footfall_core::types::{
    AnonymizedRecord, DeviceType, Order, OrderLine, RequestContext, RequestSignal,
};

const MOBILE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile/15E148 Safari/604.1";
const TABLET_UA: &str = "Mozilla/5.0 (iPad; Tablet; CPU OS 17_0) Safari/604.1";

/// Open a migrated database inside the given temp dir
fn open_db(dir: &TempDir) -> Arc<Database> {
    let path = dir.path().join("footfall.db");
    let db = Database::open(&path).expect("database should open");
    db.migrate().expect("migrations should run");
    Arc::new(db)
}

/// Capture config with the timer effectively disabled, so tests control
/// flushing explicitly.
fn capture_config() -> CaptureConfig {
    CaptureConfig {
        batch_size: 10,
        queue_capacity: 256,
        flush_interval_secs: 3600,
        max_retries: 0,
    }
}

fn browser_signal(address: &str, user_agent: &str, channel: &str) -> RequestSignal {
    RequestSignal {
        client_address: address.to_string(),
        user_agent: user_agent.to_string(),
        channel_token: channel.to_string(),
        body: None,
    }
}

fn make_order(id: &str, with_tax: i64, total: i64, placed: DateTime<Utc>) -> Order {
    Order {
        id: id.to_string(),
        total_with_tax: with_tax,
        total,
        order_placed_at: Some(placed),
        updated_at: placed,
        lines: vec![OrderLine {
            quantity: 1,
            product_variant_id: "v1".to_string(),
        }],
    }
}

// ============================================
// Capture to Storage Tests
// ============================================

#[tokio::test]
async fn test_capture_to_storage_round_trip() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let pipeline = CapturePipeline::new(db.clone(), &capture_config());

    pipeline.observe(&browser_signal("203.0.113.7", MOBILE_UA, "shop-a"));
    pipeline.observe(&browser_signal("203.0.113.7", MOBILE_UA, "shop-a"));
    pipeline.observe(&browser_signal("198.51.100.2", MOBILE_UA, "shop-a"));
    pipeline.flush().await.expect("flush should succeed");

    assert_eq!(db.count_records().expect("count should succeed"), 3);

    let records = db
        .find_records_since(Some("shop-a"), Utc::now() - Duration::hours(1), 100, 0)
        .expect("query should succeed");
    assert_eq!(records.len(), 3);

    for record in &records {
        // Only the salted hash reaches storage, never the raw identity.
        assert_eq!(record.pseudonymous_id.len(), 64);
        assert!(record.pseudonymous_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(record.channel_token, "shop-a");
        assert_eq!(record.device_type, DeviceType::Mobile);
    }

    // Same visitor hashes to the same id, a different one does not.
    assert_eq!(records[0].pseudonymous_id, records[1].pseudonymous_id);
    assert_ne!(records[0].pseudonymous_id, records[2].pseudonymous_id);

    let stats = pipeline.shutdown().await.expect("shutdown should succeed");
    assert_eq!(stats.received, 3);
    assert_eq!(stats.recorded, 3);
    assert_eq!(stats.dropped, 0);
}

#[tokio::test]
async fn test_non_browser_traffic_is_never_persisted() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let pipeline = CapturePipeline::new(db.clone(), &capture_config());

    pipeline.observe(&browser_signal("203.0.113.7", "curl/8.4.0", "shop-a"));
    pipeline.observe(&browser_signal("203.0.113.7", "kube-probe/1.29", "shop-a"));

    // Browser user agent, but an introspection payload: tooling, not a shopper.
    let mut introspection = browser_signal("203.0.113.7", MOBILE_UA, "shop-a");
    introspection.body = Some(serde_json::json!({
        "query": "query { __schema { types { name } } }"
    }));
    pipeline.observe(&introspection);

    pipeline.flush().await.expect("flush should succeed");

    assert_eq!(db.count_records().expect("count should succeed"), 0);

    let stats = pipeline.shutdown().await.expect("shutdown should succeed");
    // Rejected signals never even reach the queue.
    assert_eq!(stats.received, 0);
}

// ============================================
// Salt Persistence Tests
// ============================================

#[tokio::test]
async fn test_pseudonymous_ids_stable_across_restart() {
    let dir = TempDir::new().unwrap();
    let signal = browser_signal("203.0.113.7", MOBILE_UA, "shop-a");

    let first_id = {
        let db = open_db(&dir);
        let pipeline = CapturePipeline::new(db.clone(), &capture_config());
        pipeline.observe(&signal);
        pipeline.flush().await.expect("flush should succeed");

        let records = db
            .find_records_since(None, Utc::now() - Duration::hours(1), 10, 0)
            .expect("query should succeed");
        pipeline.shutdown().await.expect("shutdown should succeed");
        records[0].pseudonymous_id.clone()
    };

    // Same database, fresh process: the stored salt is reused, so the same
    // visitor keeps the same pseudonymous id within the rotation period.
    let db = open_db(&dir);
    let pipeline = CapturePipeline::new(db.clone(), &capture_config());
    pipeline.observe(&signal);
    pipeline.flush().await.expect("flush should succeed");

    let records = db
        .find_records_since(None, Utc::now() - Duration::hours(1), 10, 0)
        .expect("query should succeed");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].pseudonymous_id, first_id);
    assert_eq!(records[1].pseudonymous_id, first_id);

    pipeline.shutdown().await.expect("shutdown should succeed");
}

// ============================================
// End-to-End Aggregation Tests
// ============================================

#[tokio::test]
async fn test_captured_traffic_feeds_metric_summaries() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let pipeline = CapturePipeline::new(db.clone(), &capture_config());

    // Visitor A: a burst of two requests on June 10 (one visit) and a
    // return on June 20 (a second visit). Visitor B: one tablet visit.
    let burst = Utc.with_ymd_and_hms(2026, 6, 10, 10, 0, 0).unwrap();
    let return_visit = Utc.with_ymd_and_hms(2026, 6, 20, 15, 0, 0).unwrap();

    let visitor_a = browser_signal("203.0.113.7", MOBILE_UA, "shop-a");
    let visitor_b = browser_signal("198.51.100.2", TABLET_UA, "shop-a");

    pipeline.observe_at(&visitor_a, burst);
    pipeline.observe_at(&visitor_a, burst + Duration::minutes(5));
    pipeline.observe_at(&visitor_a, return_visit);
    pipeline.observe_at(&visitor_b, return_visit + Duration::minutes(10));
    pipeline.flush().await.expect("flush should succeed");

    // Three June orders placed by those visits.
    let repo = Arc::new(MemoryOrderRepository::new());
    repo.add_order(
        "shop-a",
        make_order("o-1", 10_00, 8_00, burst + Duration::minutes(30)),
    );
    repo.add_order(
        "shop-a",
        make_order("o-2", 20_00, 16_00, return_visit + Duration::minutes(30)),
    );
    repo.add_order(
        "shop-a",
        make_order("o-3", 30_00, 24_00, return_visit + Duration::hours(1)),
    );

    let mut config = Config::default();
    config.metrics.display_past_months = 1;
    let service = MetricsService::new(db.clone(), repo, &config);

    let query_time = Utc.with_ymd_and_hms(2026, 6, 25, 12, 0, 0).unwrap();
    let summaries = service
        .summaries_at(&RequestContext::new("shop-a", "EUR"), &[], query_time)
        .expect("summaries should succeed");

    assert_eq!(summaries.len(), 4);
    for summary in &summaries {
        assert_eq!(summary.labels, vec!["May", "June"]);
    }

    let sessions = summaries.iter().find(|s| s.code == "sessions").unwrap();
    let mobile = sessions.series.iter().find(|s| s.name == "Mobile").unwrap();
    assert_eq!(mobile.values, vec![0.0, 2.0], "burst merges into one visit");
    let tablet = sessions.series.iter().find(|s| s.name == "Tablet").unwrap();
    assert_eq!(tablet.values, vec![0.0, 1.0]);

    // Three orders across three visits.
    let conversion = summaries.iter().find(|s| s.code == "conversion").unwrap();
    assert_eq!(conversion.series[0].values, vec![0.0, 100.0]);

    let aov = summaries.iter().find(|s| s.code == "aov").unwrap();
    let incl = aov.series.iter().find(|s| s.name == "incl. tax").unwrap();
    assert_eq!(incl.values, vec![0.0, 20_00.0]);

    let units = summaries.iter().find(|s| s.code == "units").unwrap();
    assert_eq!(units.series[0].values, vec![0.0, 3.0]);

    pipeline.shutdown().await.expect("shutdown should succeed");
}

// ============================================
// Retention Tests
// ============================================

#[test]
fn test_retention_sweep_removes_expired_records() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);

    let ancient = AnonymizedRecord {
        id: 0,
        pseudonymous_id: "ancient-visitor".to_string(),
        device_type: DeviceType::Desktop,
        channel_token: "shop-a".to_string(),
        created_at: Utc::now() - Duration::days(3650),
    };
    let recent = AnonymizedRecord {
        id: 0,
        pseudonymous_id: "recent-visitor".to_string(),
        device_type: DeviceType::Mobile,
        channel_token: "shop-a".to_string(),
        created_at: Utc::now() - Duration::days(1),
    };
    db.insert_records(&[ancient, recent])
        .expect("insert should succeed");

    // Default retention is 24 calendar months; the ten-year-old record is
    // far past it.
    let sweeper = RetentionSweeper::new(db.clone(), &Config::default());
    assert_eq!(sweeper.sweep().expect("sweep should succeed"), 1);

    let survivors = db
        .find_records_since(None, Utc::now() - Duration::days(3650), 10, 0)
        .expect("query should succeed");
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].pseudonymous_id, "recent-visitor");
}
