//! Units sold.
//!
//! Total quantity purchased per month. With a product variant selection the
//! chart splits into one series per selected variant, labeled by variant
//! name; without one it is a single total series.

use crate::error::Result;
use crate::metrics::MetricStrategy;
use crate::types::{MetricType, NamedDataPoint, Order, ProductVariant, RequestContext, Visit};

pub struct UnitsSold;

impl UnitsSold {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UnitsSold {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricStrategy for UnitsSold {
    fn code(&self) -> &str {
        "units"
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Number
    }

    fn allows_variant_selection(&self) -> bool {
        true
    }

    fn title(&self, _ctx: &RequestContext) -> String {
        "Units sold".to_string()
    }

    fn calculate(
        &self,
        _ctx: &RequestContext,
        orders: &[Order],
        _visits: &[Visit],
        variants: &[ProductVariant],
    ) -> Result<Vec<NamedDataPoint>> {
        if variants.is_empty() {
            let total: i64 = orders.iter().map(|o| o.units_of(None)).sum();
            return Ok(vec![NamedDataPoint::new("Total", total as f64)]);
        }

        Ok(variants
            .iter()
            .map(|variant| {
                let units: i64 = orders
                    .iter()
                    .map(|o| o.units_of(Some(&variant.id)))
                    .sum();
                NamedDataPoint::new(variant.name.clone(), units as f64)
            })
            .collect())
    }
}
