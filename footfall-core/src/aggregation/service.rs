//! Metrics aggregation service.
//!
//! The read-path orchestrator. One `summaries` call resolves the reporting
//! window, loads the window's orders and visits once, buckets them per
//! calendar month, and runs every registered strategy over the buckets,
//! returning one chart-ready summary per strategy. Summaries are cached per
//! exact query; a fully cached call never touches the repositories.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::aggregation::buckets::{
    bucket_by_month, end_of_day, shift_months, start_of_month, MonthBucket,
};
use crate::aggregation::cache::{CacheStats, SummaryCache, SummaryKey};
use crate::aggregation::orders::{load_all_orders, OrderRepository};
use crate::aggregation::sessions::reconstruct_visits;
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::metrics::MetricStrategy;
use crate::types::{
    AnonymizedRecord, MetricSeries, MetricSummary, Order, ProductVariant, RequestContext, Visit,
};

/// Everything loaded and bucketed for one reporting window.
///
/// Built once per query when at least one strategy misses the cache, and
/// shared by every strategy in that query.
struct WindowData {
    order_buckets: Vec<MonthBucket<Order>>,
    visit_buckets: Vec<MonthBucket<Visit>>,
    variants: Vec<ProductVariant>,
    labels: Vec<String>,
}

/// Runs metric strategies over month-bucketed shop data.
///
/// Loading the window is all or nothing: if orders or stored records
/// cannot be read, the whole call errors. Strategy calculations on top of
/// the loaded window run independently: one failing strategy is logged
/// and left out of the result, the others still return.
pub struct MetricsService {
    db: Arc<Database>,
    orders: Arc<dyn OrderRepository>,
    strategies: Vec<Box<dyn MetricStrategy>>,
    cache: SummaryCache,
    gap_minutes: u32,
    display_past_months: u32,
    page_size: usize,
}

impl MetricsService {
    /// Service with the built-in strategy set.
    pub fn new(db: Arc<Database>, orders: Arc<dyn OrderRepository>, config: &Config) -> Self {
        Self::with_strategies(db, orders, config, crate::metrics::default_strategies())
    }

    /// Service with a caller-provided strategy set.
    pub fn with_strategies(
        db: Arc<Database>,
        orders: Arc<dyn OrderRepository>,
        config: &Config,
        strategies: Vec<Box<dyn MetricStrategy>>,
    ) -> Self {
        for strategy in &strategies {
            tracing::info!(strategy = strategy.code(), "Registered metric strategy");
        }

        Self {
            db,
            orders,
            strategies,
            cache: SummaryCache::new(),
            gap_minutes: config.sessions.gap_minutes,
            display_past_months: config.metrics.display_past_months,
            page_size: config.metrics.page_size,
        }
    }

    /// Registered strategy codes, in dashboard order.
    pub fn strategy_codes(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.code()).collect()
    }

    pub fn has_strategy(&self, code: &str) -> bool {
        self.strategies.iter().any(|s| s.code() == code)
    }

    /// Cache hit and miss counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached summary, for hosts that just mutated orders in bulk.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// One summary per registered strategy for the trailing reporting
    /// window ending today.
    ///
    /// `variant_ids` narrows the order stream and splits variant-aware
    /// strategies per variant; strategies that ignore selections are keyed
    /// in the cache without it.
    pub fn summaries(
        &self,
        ctx: &RequestContext,
        variant_ids: &[String],
    ) -> Result<Vec<MetricSummary>> {
        self.summaries_at(ctx, variant_ids, Utc::now())
    }

    pub fn summaries_at(
        &self,
        ctx: &RequestContext,
        variant_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<MetricSummary>> {
        let to = end_of_day(now);
        let from = start_of_month(shift_months(to, -(self.display_past_months as i32)));

        tracing::debug!(
            channel = %ctx.channel_token,
            from = %from.to_rfc3339(),
            to = %to.to_rfc3339(),
            variants = variant_ids.len(),
            "Computing metric summaries"
        );

        let mut slots = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let key = self.cache_key(strategy.as_ref(), ctx, variant_ids, from, to);
            let cached = self.cache.get(&key);
            if cached.is_some() {
                tracing::debug!(strategy = strategy.code(), "Using cached summary");
            }
            slots.push((key, cached));
        }

        if slots.iter().all(|(_, cached)| cached.is_some()) {
            return Ok(slots.into_iter().filter_map(|(_, cached)| cached).collect());
        }

        // At least one miss: load the window once. A failure here fails the
        // whole call; only the per-strategy calculation below is isolated.
        let data = self.load_window(ctx, variant_ids, from, to)?;

        let mut summaries = Vec::with_capacity(self.strategies.len());
        for (strategy, (key, cached)) in self.strategies.iter().zip(slots) {
            if let Some(summary) = cached {
                summaries.push(summary);
                continue;
            }

            match self.summarize(strategy.as_ref(), ctx, &data) {
                Ok(summary) => {
                    self.cache.insert(key, summary.clone());
                    summaries.push(summary);
                }
                Err(e) => {
                    tracing::error!(
                        strategy = strategy.code(),
                        error = %e,
                        "Metric strategy failed"
                    );
                }
            }
        }

        Ok(summaries)
    }

    fn cache_key(
        &self,
        strategy: &dyn MetricStrategy,
        ctx: &RequestContext,
        variant_ids: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SummaryKey {
        let selection = if strategy.allows_variant_selection() {
            Some(variant_ids)
        } else {
            None
        };
        SummaryKey::new(strategy.code(), from, to, &ctx.channel_token, selection)
    }

    /// Load and bucket everything one window of strategies needs.
    fn load_window(
        &self,
        ctx: &RequestContext,
        variant_ids: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<WindowData> {
        let orders = load_all_orders(
            self.orders.as_ref(),
            &ctx.channel_token,
            from,
            to,
            variant_ids,
            self.page_size,
        )?;

        let records = self.load_records(&ctx.channel_token, from)?;
        let visits = reconstruct_visits(&records, self.gap_minutes);

        let variants = if variant_ids.is_empty() {
            Vec::new()
        } else {
            self.orders.find_variants(&ctx.channel_token, variant_ids)?
        };

        tracing::debug!(
            orders = orders.len(),
            records = records.len(),
            visits = visits.len(),
            "Loaded aggregation window"
        );

        let order_buckets = bucket_by_month(
            orders,
            |o| Some(o.placed_or_updated_at()),
            "order",
            "order_placed_at",
            from,
            to,
        )?;
        let visit_buckets = bucket_by_month(
            visits,
            |v| Some(v.started_at),
            "visit",
            "started_at",
            from,
            to,
        )?;

        let labels = order_buckets
            .iter()
            .map(|bucket| bucket.label().to_string())
            .collect();

        Ok(WindowData {
            order_buckets,
            visit_buckets,
            variants,
            labels,
        })
    }

    /// Drain every page of anonymized records from `since` onwards.
    fn load_records(
        &self,
        channel_token: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<AnonymizedRecord>> {
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            let page =
                self.db
                    .find_records_since(Some(channel_token), since, self.page_size, offset)?;
            let done = page.len() < self.page_size;
            all.extend(page);
            if done {
                break;
            }
            offset += self.page_size;
        }

        Ok(all)
    }

    /// Run one strategy over every month, then merge the per-month points
    /// into per-legend series.
    ///
    /// The legend set is the union across all months in first-appearance
    /// order; a legend absent from some month contributes 0 there, not a
    /// hole, so every series has one value per label.
    fn summarize(
        &self,
        strategy: &dyn MetricStrategy,
        ctx: &RequestContext,
        data: &WindowData,
    ) -> Result<MetricSummary> {
        let mut monthly_points = Vec::with_capacity(data.order_buckets.len());
        for (order_bucket, visit_bucket) in data.order_buckets.iter().zip(&data.visit_buckets) {
            let points = strategy.calculate(
                ctx,
                &order_bucket.entities,
                &visit_bucket.entities,
                &data.variants,
            )?;
            monthly_points.push(points);
        }

        let mut legends: Vec<String> = Vec::new();
        for points in &monthly_points {
            for point in points {
                if !legends.contains(&point.legend) {
                    legends.push(point.legend.clone());
                }
            }
        }

        let series = legends
            .into_iter()
            .map(|legend| {
                let values = monthly_points
                    .iter()
                    .map(|points| {
                        points
                            .iter()
                            .find(|p| p.legend == legend)
                            .map(|p| p.value)
                            .unwrap_or(0.0)
                    })
                    .collect();
                MetricSeries {
                    name: legend,
                    values,
                }
            })
            .collect();

        Ok(MetricSummary {
            code: strategy.code().to_string(),
            title: strategy.title(ctx),
            labels: data.labels.clone(),
            series,
            metric_type: strategy.metric_type(),
        })
    }
}
