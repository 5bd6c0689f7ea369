//! Average order value.
//!
//! Two series per month: the average order total including and excluding
//! tax, in minor currency units. Months without orders chart as zero.

use crate::error::Result;
use crate::metrics::MetricStrategy;
use crate::types::{MetricType, NamedDataPoint, Order, ProductVariant, RequestContext, Visit};

pub struct AverageOrderValue;

impl AverageOrderValue {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AverageOrderValue {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricStrategy for AverageOrderValue {
    fn code(&self) -> &str {
        "aov"
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Currency
    }

    fn allows_variant_selection(&self) -> bool {
        false
    }

    fn title(&self, ctx: &RequestContext) -> String {
        format!("Average order value ({})", ctx.currency_code)
    }

    fn calculate(
        &self,
        _ctx: &RequestContext,
        orders: &[Order],
        _visits: &[Visit],
        _variants: &[ProductVariant],
    ) -> Result<Vec<NamedDataPoint>> {
        if orders.is_empty() {
            return Ok(vec![
                NamedDataPoint::new("incl. tax", 0.0),
                NamedDataPoint::new("excl. tax", 0.0),
            ]);
        }

        let count = orders.len() as f64;
        let with_tax: i64 = orders.iter().map(|o| o.total_with_tax).sum();
        let without_tax: i64 = orders.iter().map(|o| o.total).sum();

        Ok(vec![
            NamedDataPoint::new("incl. tax", with_tax as f64 / count),
            NamedDataPoint::new("excl. tax", without_tax as f64 / count),
        ])
    }
}
