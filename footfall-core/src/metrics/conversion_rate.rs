//! Conversion rate.
//!
//! Orders as a percentage of visits, per month. A client can place several
//! orders in one visit and repeat visits blur across salt rotations, so the
//! raw ratio can exceed one; the reported rate is capped at 100.

use crate::error::Result;
use crate::metrics::MetricStrategy;
use crate::types::{MetricType, NamedDataPoint, Order, ProductVariant, RequestContext, Visit};

pub struct ConversionRate;

impl ConversionRate {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConversionRate {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricStrategy for ConversionRate {
    fn code(&self) -> &str {
        "conversion"
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Number
    }

    fn allows_variant_selection(&self) -> bool {
        false
    }

    fn title(&self, _ctx: &RequestContext) -> String {
        "Conversion rate".to_string()
    }

    fn calculate(
        &self,
        _ctx: &RequestContext,
        orders: &[Order],
        visits: &[Visit],
        _variants: &[ProductVariant],
    ) -> Result<Vec<NamedDataPoint>> {
        if visits.is_empty() {
            return Ok(vec![NamedDataPoint::new("Conversion", 0.0)]);
        }

        let rate = orders.len() as f64 / visits.len() as f64 * 100.0;
        Ok(vec![NamedDataPoint::new("Conversion", rate.min(100.0))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceType;
    use chrono::Utc;

    fn make_order(id: &str) -> Order {
        Order {
            id: id.to_string(),
            total_with_tax: 10_00,
            total: 8_00,
            order_placed_at: Some(Utc::now()),
            updated_at: Utc::now(),
            lines: Vec::new(),
        }
    }

    fn make_visit(n: usize) -> Visit {
        Visit {
            pseudonymous_id: format!("client-{}", n),
            device_type: DeviceType::Desktop,
            started_at: Utc::now(),
            ended_at: Utc::now(),
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new("shop-a", "EUR")
    }

    #[test]
    fn test_rate_is_orders_per_hundred_visits() {
        let strategy = ConversionRate::new();
        let orders: Vec<Order> = (0..25).map(|n| make_order(&format!("o{}", n))).collect();
        let visits: Vec<Visit> = (0..100).map(make_visit).collect();

        let points = strategy.calculate(&ctx(), &orders, &visits, &[]).unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 25.0);
    }

    #[test]
    fn test_rate_caps_at_one_hundred() {
        let strategy = ConversionRate::new();
        let orders: Vec<Order> = (0..150).map(|n| make_order(&format!("o{}", n))).collect();
        let visits: Vec<Visit> = (0..100).map(make_visit).collect();

        let points = strategy.calculate(&ctx(), &orders, &visits, &[]).unwrap();

        assert_eq!(points[0].value, 100.0);
    }

    #[test]
    fn test_no_visits_means_zero_even_with_orders() {
        let strategy = ConversionRate::new();
        let orders = vec![make_order("o1")];

        let points = strategy.calculate(&ctx(), &orders, &[], &[]).unwrap();

        assert_eq!(points[0].value, 0.0);
    }

    #[test]
    fn test_no_orders_means_zero() {
        let strategy = ConversionRate::new();
        let visits = vec![make_visit(0)];

        let points = strategy.calculate(&ctx(), &[], &visits, &[]).unwrap();

        assert_eq!(points[0].value, 0.0);
    }
}
