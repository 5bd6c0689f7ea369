//! Aggregation engine: the read path.
//!
//! Everything here works on data already persisted (anonymized records) or
//! owned by the host shop (orders, variants). The pipeline for one query:
//!
//! 1. Resolve the reporting window: N past months plus the current one.
//! 2. Load the window's orders through the host's [`OrderRepository`] and
//!    the window's anonymized records from storage, both paginated.
//! 3. Rebuild [`Visit`](crate::types::Visit)s from the records.
//! 4. Bucket orders and visits per calendar month.
//! 5. Run each registered metric strategy over the buckets and cache the
//!    assembled summaries per exact query.
//!
//! The service is synchronous: queries run on the caller's thread, and the
//! only shared state is the summary cache behind a mutex.

pub mod buckets;
pub mod cache;
pub mod orders;
pub mod service;
pub mod sessions;

pub use buckets::{
    bucket_by_month, end_of_day, month_name, shift_months, start_of_month, MonthBucket,
};
pub use cache::{CacheStats, SummaryCache, SummaryKey};
pub use orders::{load_all_orders, MemoryOrderRepository, OrderRepository, PageRequest};
pub use service::MetricsService;
pub use sessions::reconstruct_visits;
