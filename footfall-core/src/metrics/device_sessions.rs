//! Sessions by device type.
//!
//! Visit counts per month, split by the coarse device class of each visit's
//! first request. Only device types that actually appear in a month produce
//! a point; the aggregation service zero-fills the other months of a legend.

use std::collections::HashMap;

use crate::error::Result;
use crate::metrics::MetricStrategy;
use crate::types::{
    DeviceType, MetricType, NamedDataPoint, Order, ProductVariant, RequestContext, Visit,
};

/// Devices appear in a fixed order so legends line up across months.
const DEVICE_ORDER: [DeviceType; 4] = [
    DeviceType::Mobile,
    DeviceType::Tablet,
    DeviceType::Desktop,
    DeviceType::Unknown,
];

pub struct DeviceSessions;

impl DeviceSessions {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DeviceSessions {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricStrategy for DeviceSessions {
    fn code(&self) -> &str {
        "sessions"
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Number
    }

    fn allows_variant_selection(&self) -> bool {
        false
    }

    fn title(&self, _ctx: &RequestContext) -> String {
        "Sessions by device type".to_string()
    }

    fn calculate(
        &self,
        _ctx: &RequestContext,
        _orders: &[Order],
        visits: &[Visit],
        _variants: &[ProductVariant],
    ) -> Result<Vec<NamedDataPoint>> {
        let mut counts: HashMap<DeviceType, usize> = HashMap::new();
        for visit in visits {
            *counts.entry(visit.device_type).or_insert(0) += 1;
        }

        Ok(DEVICE_ORDER
            .iter()
            .filter_map(|device| {
                counts
                    .get(device)
                    .map(|&n| NamedDataPoint::new(device.display_name(), n as f64))
            })
            .collect())
    }
}
