//! Order engine providing placement and lifecycle operations.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cache::{Cache, keys};
use catalog_store::{
    CatalogStore, CatalogStoreExt, ItemId, NewOrder, Order, OrderId, OrderSearch, OrderStatus,
    with_deadline,
};

use crate::{OrderError, PlaceOrder, Result};

/// Default deadline for one order operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Engine for placing and managing orders.
///
/// Holds no lock of its own: stock serialization is delegated to the store's
/// atomic `insert_order`, so a failed or abandoned placement leaves nothing
/// behind.
pub struct OrderEngine<S: CatalogStore> {
    store: S,
    cache: Arc<dyn Cache>,
    timeout: Duration,
}

impl<S: CatalogStore> OrderEngine<S> {
    /// Creates a new order engine with the default deadline.
    pub fn new(store: S, cache: Arc<dyn Cache>) -> Self {
        Self {
            store,
            cache,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the deadline applied to each operation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places an order.
    ///
    /// Validation and the customer lookup happen before any write. The order,
    /// its lines and every stock decrement then commit together or not at all.
    /// Cached entries for the ordered items are invalidated before returning.
    #[tracing::instrument(
        skip(self, request),
        fields(customer_id = ?request.customer_id, lines = request.lines.len())
    )]
    pub async fn place_order(&self, request: PlaceOrder) -> Result<Order> {
        let started = Instant::now();
        let touched: BTreeSet<ItemId> = request.lines.iter().map(|l| l.item_id).collect();

        let result = match tokio::time::timeout(self.timeout, self.commit(request)).await {
            Ok(result) => result,
            Err(_) => Err(OrderError::Timeout(self.timeout)),
        };

        if matches!(result, Ok(_) | Err(OrderError::Timeout(_))) {
            let mut stale: Vec<String> = touched.into_iter().map(keys::item).collect();
            stale.push(keys::ALL_ITEMS.to_string());
            if tokio::time::timeout(self.timeout, cache::invalidate(self.cache.as_ref(), &stale))
                .await
                .is_err()
            {
                tracing::warn!("cache invalidation after order exceeded its deadline");
            }
        }

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                metrics::histogram!("order_placement_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(order_id = %order.id, total = %order.total, "order placed");
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.reason()).increment(1);
                tracing::warn!(reason = e.reason(), error = %e, "order rejected");
            }
        }
        result
    }

    async fn commit(&self, request: PlaceOrder) -> Result<Order> {
        let customer_id = request.validate()?;

        if !self.store.customer_exists(customer_id).await? {
            return Err(OrderError::CustomerNotFound(customer_id));
        }

        let order = NewOrder::new(
            customer_id,
            request.declared_total,
            request.lines.into_iter().map(Into::into).collect(),
        );
        Ok(self.store.insert_order(order).await?)
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = catalog_store::Result<T>>,
    {
        Ok(with_deadline(self.timeout, operation).await?)
    }

    /// Retrieves an order by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.bounded(self.store.get_order(id)).await
    }

    /// Lists all orders.
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        self.bounded(self.store.list_orders()).await
    }

    /// Searches orders by customer name and status.
    #[tracing::instrument(skip(self))]
    pub async fn search_orders(&self, criteria: &OrderSearch) -> Result<Vec<Order>> {
        self.bounded(self.store.search_orders(criteria)).await
    }

    /// Moves an order to `next` if the lifecycle allows it.
    ///
    /// Cancelling does not return stock.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, id: OrderId, next: OrderStatus) -> Result<Order> {
        let current = self.get_order(id).await?.status;
        if !current.can_transition_to(next) {
            return Err(OrderError::InvalidStatusTransition {
                from: current,
                to: next,
            });
        }

        let order = self
            .bounded(self.store.update_order_status(id, current, next))
            .await?;
        tracing::info!(order_id = %id, from = %current, to = %next, "order status changed");
        Ok(order)
    }

    /// Deletes an order and its lines. Stock is not returned.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, id: OrderId) -> Result<()> {
        self.bounded(self.store.delete_order(id)).await?;
        tracing::info!(order_id = %id, "order deleted");
        Ok(())
    }
}
