//! Metric strategies.
//!
//! Each strategy turns one month of orders and visits into the named data
//! points of one chart. The aggregation service runs every registered
//! strategy per month bucket and assembles the results into
//! [`MetricSummary`](crate::types::MetricSummary) values.
//!
//! ## Built-in strategies
//!
//! | Code | Chart | Variant-aware |
//! |------|-------|---------------|
//! | `conversion` | Conversion rate (orders per visit, capped at 100%) | no |
//! | `aov` | Average order value, incl. and excl. tax | no |
//! | `units` | Units sold, total or split per selected variant | yes |
//! | `sessions` | Visits per device type | no |
//!
//! ## Adding a custom strategy
//!
//! Implement [`MetricStrategy`] and hand it to
//! [`MetricsService::with_strategies`](crate::aggregation::MetricsService::with_strategies)
//! alongside (or instead of) [`default_strategies`]. Codes must be unique
//! per service; the code doubles as the cache key component and the
//! dashboard identifier.

pub mod average_order_value;
pub mod conversion_rate;
pub mod device_sessions;
pub mod strategy;
pub mod units_sold;

pub use average_order_value::AverageOrderValue;
pub use conversion_rate::ConversionRate;
pub use device_sessions::DeviceSessions;
pub use strategy::MetricStrategy;
pub use units_sold::UnitsSold;

/// The built-in strategy set, in dashboard order.
pub fn default_strategies() -> Vec<Box<dyn MetricStrategy>> {
    vec![
        Box::new(ConversionRate::new()),
        Box::new(AverageOrderValue::new()),
        Box::new(UnitsSold::new()),
        Box::new(DeviceSessions::new()),
    ]
}
