//! Visit reconstruction.
//!
//! Stored request records are isolated points in time; a visit is a run of
//! requests by one pseudonymous client. Reconstruction merges a client's
//! consecutive records into one visit while they stay within the session
//! gap of the visit's FIRST request. The window is anchored at the visit
//! start; it does not slide forward with each request, so a client who
//! keeps clicking still rolls over into a new visit once the gap has passed
//! since the visit began.

use std::collections::HashMap;

use chrono::Duration;

use crate::types::{AnonymizedRecord, Visit};

/// Rebuild visits from anonymized request records.
///
/// A gap of zero disables merging entirely: every record becomes its own
/// visit. Records need not arrive sorted; each client's records are ordered
/// by timestamp first. Output order follows each client's first appearance
/// in the input, with that client's visits in chronological order, so equal
/// inputs produce equal outputs.
pub fn reconstruct_visits(records: &[AnonymizedRecord], gap_minutes: u32) -> Vec<Visit> {
    let gap = Duration::minutes(gap_minutes as i64);

    let mut client_order: Vec<&str> = Vec::new();
    let mut by_client: HashMap<&str, Vec<&AnonymizedRecord>> = HashMap::new();
    for record in records {
        let entry = by_client.entry(record.pseudonymous_id.as_str()).or_default();
        if entry.is_empty() {
            client_order.push(record.pseudonymous_id.as_str());
        }
        entry.push(record);
    }

    let mut visits = Vec::new();
    for client in client_order {
        let mut client_records = by_client.remove(client).unwrap_or_default();
        client_records.sort_by_key(|r| r.created_at);

        let mut iter = client_records.into_iter();
        let first = match iter.next() {
            Some(record) => record,
            None => continue,
        };

        let mut visit = start_visit(first);
        for record in iter {
            let within_window = gap_minutes > 0
                && record.created_at.signed_duration_since(visit.started_at) <= gap;

            if within_window {
                visit.ended_at = record.created_at;
            } else {
                visits.push(visit);
                visit = start_visit(record);
            }
        }
        visits.push(visit);
    }

    visits
}

/// A new visit takes its device class from its first record.
fn start_visit(record: &AnonymizedRecord) -> Visit {
    Visit {
        pseudonymous_id: record.pseudonymous_id.clone(),
        device_type: record.device_type,
        started_at: record.created_at,
        ended_at: record.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceType;
    use chrono::{TimeZone, Utc};

    fn make_record(client: &str, minute: i64, device: DeviceType) -> AnonymizedRecord {
        AnonymizedRecord {
            id: 0,
            pseudonymous_id: client.to_string(),
            device_type: device,
            channel_token: "shop-a".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    #[test]
    fn test_records_within_gap_merge_into_one_visit() {
        let records = vec![
            make_record("a", 0, DeviceType::Desktop),
            make_record("a", 5, DeviceType::Desktop),
            make_record("a", 10, DeviceType::Desktop),
        ];

        let visits = reconstruct_visits(&records, 6);

        // 5 minutes from the start fits a 6 minute gap; 10 does not.
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].started_at, records[0].created_at);
        assert_eq!(visits[0].ended_at, records[1].created_at);
        assert_eq!(visits[1].started_at, records[2].created_at);
        assert_eq!(visits[1].ended_at, records[2].created_at);
    }

    #[test]
    fn test_gap_is_measured_from_visit_start() {
        // A sliding window would chain these into one endless visit; the
        // fixed window rolls over once the start is out of reach.
        let records = vec![
            make_record("a", 0, DeviceType::Desktop),
            make_record("a", 20, DeviceType::Desktop),
            make_record("a", 40, DeviceType::Desktop),
        ];

        let visits = reconstruct_visits(&records, 30);

        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].ended_at, records[1].created_at);
        assert_eq!(visits[1].started_at, records[2].created_at);
    }

    #[test]
    fn test_zero_gap_disables_merging() {
        let records = vec![
            make_record("a", 0, DeviceType::Mobile),
            make_record("a", 1, DeviceType::Mobile),
            make_record("a", 2, DeviceType::Mobile),
        ];

        let visits = reconstruct_visits(&records, 0);
        assert_eq!(visits.len(), 3);
    }

    #[test]
    fn test_zero_gap_splits_identical_timestamps() {
        // Zero duration between records is still not a merge.
        let records = vec![
            make_record("a", 0, DeviceType::Mobile),
            make_record("a", 0, DeviceType::Mobile),
            make_record("a", 0, DeviceType::Mobile),
        ];

        let visits = reconstruct_visits(&records, 0);

        assert_eq!(visits.len(), 3);
        assert!(visits.iter().all(|v| v.started_at == v.ended_at));
    }

    #[test]
    fn test_boundary_delta_still_merges() {
        let records = vec![
            make_record("a", 0, DeviceType::Desktop),
            make_record("a", 6, DeviceType::Desktop),
        ];

        // Exactly the gap away from the visit start still belongs to it.
        let visits = reconstruct_visits(&records, 6);
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].ended_at, records[1].created_at);
    }

    #[test]
    fn test_clients_never_share_a_visit() {
        let records = vec![
            make_record("a", 0, DeviceType::Desktop),
            make_record("b", 1, DeviceType::Mobile),
            make_record("a", 2, DeviceType::Desktop),
            make_record("b", 3, DeviceType::Mobile),
        ];

        let visits = reconstruct_visits(&records, 30);

        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].pseudonymous_id, "a");
        assert_eq!(visits[1].pseudonymous_id, "b");
    }

    #[test]
    fn test_unsorted_input_reconstructs_the_same_visits() {
        let sorted = vec![
            make_record("a", 0, DeviceType::Desktop),
            make_record("a", 5, DeviceType::Desktop),
            make_record("a", 45, DeviceType::Desktop),
        ];
        let shuffled = vec![sorted[2].clone(), sorted[0].clone(), sorted[1].clone()];

        assert_eq!(
            reconstruct_visits(&sorted, 30),
            reconstruct_visits(&shuffled, 30)
        );
    }

    #[test]
    fn test_visit_device_comes_from_first_record() {
        let records = vec![
            make_record("a", 0, DeviceType::Mobile),
            make_record("a", 2, DeviceType::Desktop),
        ];

        let visits = reconstruct_visits(&records, 30);
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].device_type, DeviceType::Mobile);
    }

    #[test]
    fn test_no_records_no_visits() {
        assert!(reconstruct_visits(&[], 30).is_empty());
    }
}
