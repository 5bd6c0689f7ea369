//! Order access.
//!
//! Orders live in the host shop system, not in our storage; the repository
//! trait is the seam hosts implement to expose them read-only. Loads are
//! paginated so a shop with years of history cannot balloon one query's
//! memory.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Order, ProductVariant};

/// One page of a paginated load.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }

    pub fn next(&self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset + self.limit,
        }
    }
}

/// Read access to the host's orders.
pub trait OrderRepository: Send + Sync {
    /// Orders of one storefront channel relevant to the `[from, to)` window.
    ///
    /// Implementations may over-approximate the window (for example by
    /// matching on either placement or update time); month bucketing drops
    /// strays afterwards. A non-empty `variant_ids` restricts the result to
    /// orders containing at least one of those variants.
    fn find_orders(
        &self,
        channel_token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        variant_ids: &[String],
        page: PageRequest,
    ) -> Result<Vec<Order>>;

    /// Resolve variant ids to display data for chart legends.
    fn find_variants(&self, channel_token: &str, ids: &[String])
        -> Result<Vec<ProductVariant>>;
}

/// Drain every page of [`OrderRepository::find_orders`] into one list.
///
/// Stops at the first short page, so exactly one extra round trip happens
/// when the total is a multiple of the page size.
pub fn load_all_orders(
    repo: &dyn OrderRepository,
    channel_token: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    variant_ids: &[String],
    page_size: usize,
) -> Result<Vec<Order>> {
    let mut all = Vec::new();
    let mut page = PageRequest::first(page_size);

    loop {
        let batch = repo.find_orders(channel_token, from, to, variant_ids, page)?;
        let done = batch.len() < page.limit;
        all.extend(batch);
        if done {
            break;
        }
        page = page.next();
    }

    Ok(all)
}

/// Reference repository backed by process memory.
///
/// Used by tests and by hosts that want footfall's traffic metrics without
/// wiring up an order backend.
#[derive(Default)]
pub struct MemoryOrderRepository {
    inner: Mutex<MemoryOrders>,
}

#[derive(Default)]
struct MemoryOrders {
    orders: Vec<(String, Order)>,
    variants: Vec<(String, ProductVariant)>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_order(&self, channel_token: &str, order: Order) {
        self.inner
            .lock()
            .unwrap()
            .orders
            .push((channel_token.to_string(), order));
    }

    pub fn add_variant(&self, channel_token: &str, variant: ProductVariant) {
        self.inner
            .lock()
            .unwrap()
            .variants
            .push((channel_token.to_string(), variant));
    }
}

impl OrderRepository for MemoryOrderRepository {
    fn find_orders(
        &self,
        channel_token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        variant_ids: &[String],
        page: PageRequest,
    ) -> Result<Vec<Order>> {
        let inner = self.inner.lock().unwrap();

        let matching = inner
            .orders
            .iter()
            .filter(|(channel, _)| channel == channel_token)
            .map(|(_, order)| order)
            .filter(|order| {
                let at = order.placed_or_updated_at();
                at >= from && at < to
            })
            .filter(|order| {
                variant_ids.is_empty()
                    || order
                        .lines
                        .iter()
                        .any(|line| variant_ids.contains(&line.product_variant_id))
            })
            .cloned();

        Ok(matching.skip(page.offset).take(page.limit).collect())
    }

    fn find_variants(
        &self,
        channel_token: &str,
        ids: &[String],
    ) -> Result<Vec<ProductVariant>> {
        let inner = self.inner.lock().unwrap();

        Ok(inner
            .variants
            .iter()
            .filter(|(channel, variant)| channel == channel_token && ids.contains(&variant.id))
            .map(|(_, variant)| variant.clone())
            .collect())
    }
}
