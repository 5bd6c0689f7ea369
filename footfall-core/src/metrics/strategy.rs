//! Metric strategy trait
//!
//! Each chart on the dashboard is produced by one strategy. The aggregation
//! service owns the window handling, bucketing, and caching; a strategy only
//! turns one month of entities into named data points.

use crate::error::Result;
use crate::types::{MetricType, NamedDataPoint, Order, ProductVariant, RequestContext, Visit};

/// One dashboard metric.
///
/// Strategies are stateless calculators. They should be:
/// - **Deterministic**: the same month of entities produces the same points
/// - **Total**: empty input months produce points too (usually zeros), so
///   every month charts
/// - **Fast**: called once per month per uncached query
///
/// ## Example
///
/// ```rust,ignore
/// use footfall_core::metrics::MetricStrategy;
///
/// pub struct OrderCount;
///
/// impl MetricStrategy for OrderCount {
///     fn code(&self) -> &str { "order-count" }
///     fn metric_type(&self) -> MetricType { MetricType::Number }
///     fn allows_variant_selection(&self) -> bool { false }
///     fn title(&self, _ctx: &RequestContext) -> String { "Orders".to_string() }
///
///     fn calculate(
///         &self,
///         _ctx: &RequestContext,
///         orders: &[Order],
///         _visits: &[Visit],
///         _variants: &[ProductVariant],
///     ) -> Result<Vec<NamedDataPoint>> {
///         Ok(vec![NamedDataPoint::new("Orders", orders.len() as f64)])
///     }
/// }
/// ```
pub trait MetricStrategy: Send + Sync {
    /// Stable identifier. Doubles as the cache key component and the code
    /// dashboards request charts by.
    fn code(&self) -> &str;

    /// Display hint for the chart's values.
    fn metric_type(&self) -> MetricType;

    /// Whether a product variant selection narrows this metric.
    ///
    /// Strategies answering `false` are cached without the selection: every
    /// spelling of the query shares their one entry.
    fn allows_variant_selection(&self) -> bool;

    /// Chart title shown above the series, built from the context's
    /// currency and locale hints.
    fn title(&self, ctx: &RequestContext) -> String;

    /// Produce the data points for one month of entities.
    ///
    /// `orders` and `visits` contain exactly the entities bucketed into the
    /// month being calculated. `variants` carries the resolved variant
    /// selection, and is empty when there is none.
    fn calculate(
        &self,
        ctx: &RequestContext,
        orders: &[Order],
        visits: &[Visit],
        variants: &[ProductVariant],
    ) -> Result<Vec<NamedDataPoint>>;
}
