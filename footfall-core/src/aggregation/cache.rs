//! Summary cache.
//!
//! Aggregating a year of orders and visits is expensive; the resulting
//! summaries are tiny. Computed summaries are cached per exact query so a
//! dashboard reload costs one map lookup. No entry is ever evicted: the key
//! space stays small because the reporting window only advances one day at
//! a time, and `clear` exists for hosts that want a hard reset.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::types::MetricSummary;

/// Identity of one exact metric query.
///
/// Variant selection participates only for strategies that allow it; for
/// the rest it is dropped so every spelling of the query shares one entry.
/// Selected ids are sorted, making the key insensitive to selection order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryKey {
    code: String,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    channel_token: String,
    variant_ids: Option<Vec<String>>,
}

impl SummaryKey {
    pub fn new(
        code: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        channel_token: &str,
        variant_ids: Option<&[String]>,
    ) -> Self {
        let variant_ids = variant_ids.map(|ids| {
            let mut ids = ids.to_vec();
            ids.sort();
            ids
        });

        Self {
            code: code.to_string(),
            from,
            to,
            channel_token: channel_token.to_string(),
            variant_ids,
        }
    }
}

/// Hit and miss counters
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// Concurrent map from query identity to computed summary.
pub struct SummaryCache {
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<SummaryKey, MetricSummary>,
    stats: CacheStats,
}

impl SummaryCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Look up a summary, counting the hit or miss.
    pub fn get(&self, key: &SummaryKey) -> Option<MetricSummary> {
        let mut inner = self.inner.lock().unwrap();
        match inner.entries.get(key).cloned() {
            Some(summary) => {
                inner.stats.hits += 1;
                Some(summary)
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, key: SummaryKey, summary: MetricSummary) {
        self.inner.lock().unwrap().entries.insert(key, summary);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. The counters survive.
    pub fn clear(&self) {
        self.inner.lock().unwrap().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().unwrap().stats.clone()
    }
}

impl Default for SummaryCache {
    fn default() -> Self {
        Self::new()
    }
}
