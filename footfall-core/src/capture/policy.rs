//! Recording policy: which inbound requests become events.
//!
//! The host middleware hands every request signal to the capture pipeline;
//! the policy decides whether it represents a real storefront visitor worth
//! counting. Hosts can swap in their own policy at pipeline construction.

use crate::types::RequestSignal;

/// Decides whether an inbound request signal should be recorded.
pub trait RecordingPolicy: Send + Sync {
    fn should_record(&self, signal: &RequestSignal) -> bool;
}

/// Default policy: browsers only, no API introspection traffic.
///
/// Rejects signals whose user agent does not look like a browser (bots,
/// health checks, CLI clients) and GraphQL introspection payloads issued by
/// tooling rather than shoppers.
#[derive(Debug, Default)]
pub struct DefaultRecordingPolicy;

impl DefaultRecordingPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Every mainstream browser advertises the Mozilla token; crawlers and
    /// CLI clients usually do not.
    fn is_browser(user_agent: &str) -> bool {
        user_agent.to_ascii_lowercase().contains("mozilla")
    }

    fn is_introspection(body: &serde_json::Value) -> bool {
        let query_hits = body
            .get("query")
            .and_then(|q| q.as_str())
            .map(|q| q.contains("__schema") || q.contains("__type"))
            .unwrap_or(false);

        let operation_hits = body
            .get("operationName")
            .and_then(|o| o.as_str())
            .map(|o| o == "IntrospectionQuery")
            .unwrap_or(false);

        query_hits || operation_hits
    }
}

impl RecordingPolicy for DefaultRecordingPolicy {
    fn should_record(&self, signal: &RequestSignal) -> bool {
        if !Self::is_browser(&signal.user_agent) {
            return false;
        }

        if let Some(body) = &signal.body {
            if Self::is_introspection(body) {
                return false;
            }
        }

        true
    }
}
