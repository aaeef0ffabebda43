use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Author, AuthorDraft, AuthorId, AuthorSearch, Customer, CustomerDraft, CustomerId,
    CustomerSearch, Item, ItemDraft, ItemId, ItemSearch, NewOrder, Order, OrderId, OrderSearch,
    OrderStatus, Result, StockChange, StoreError, Tag,
};

/// Core trait for catalog store implementations.
///
/// The store is the system of record. It holds no cache knowledge: callers
/// decide which cache keys a successful mutation invalidates.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Retrieves one item with its author and tags.
    async fn get_item(&self, id: ItemId) -> Result<Item>;

    /// Lists all items. Ordering is by id.
    async fn list_items(&self) -> Result<Vec<Item>>;

    /// Searches items. Fails with `NoMatches` when nothing matches.
    async fn search_items(&self, criteria: &ItemSearch) -> Result<Vec<Item>>;

    /// Creates an item, reusing existing tag records by name.
    async fn create_item(&self, draft: ItemDraft) -> Result<Item>;

    /// Replaces all mutable fields and tag links of an item.
    async fn update_item(&self, id: ItemId, draft: ItemDraft) -> Result<Item>;

    /// Decrements quantity by one when it is above one; otherwise removes the
    /// item and its tag links. Serialized with order placement on the same item.
    async fn decrement_or_delete_item(&self, id: ItemId) -> Result<StockChange>;

    /// Atomically takes `quantity` units of stock from an item.
    ///
    /// Returns the remaining quantity. Never leaves the quantity negative.
    async fn reserve_stock(&self, id: ItemId, quantity: u32) -> Result<u32>;

    /// Lists all tag records.
    async fn list_tags(&self) -> Result<Vec<Tag>>;

    async fn get_author(&self, id: AuthorId) -> Result<Author>;
    async fn list_authors(&self) -> Result<Vec<Author>>;
    async fn search_authors(&self, criteria: &AuthorSearch) -> Result<Vec<Author>>;
    async fn create_author(&self, draft: AuthorDraft) -> Result<Author>;
    async fn update_author(&self, id: AuthorId, draft: AuthorDraft) -> Result<Author>;
    /// Fails with `Conflict` while items still reference the author.
    async fn delete_author(&self, id: AuthorId) -> Result<()>;

    async fn get_customer(&self, id: CustomerId) -> Result<Customer>;
    async fn list_customers(&self) -> Result<Vec<Customer>>;
    async fn search_customers(&self, criteria: &CustomerSearch) -> Result<Vec<Customer>>;
    async fn create_customer(&self, draft: CustomerDraft) -> Result<Customer>;
    async fn update_customer(&self, id: CustomerId, draft: CustomerDraft) -> Result<Customer>;
    /// Fails with `Conflict` while orders still reference the customer.
    async fn delete_customer(&self, id: CustomerId) -> Result<()>;

    /// Commits an order header, its lines and every stock reservation as one unit.
    ///
    /// If any line cannot be reserved, or the declared total differs from the
    /// computed one, nothing is written. Dropping the future before it resolves
    /// also leaves nothing behind.
    async fn insert_order(&self, order: NewOrder) -> Result<Order>;

    async fn get_order(&self, id: OrderId) -> Result<Order>;
    async fn list_orders(&self) -> Result<Vec<Order>>;
    async fn search_orders(&self, criteria: &OrderSearch) -> Result<Vec<Order>>;

    /// Sets the status if it is still `expected`; fails with `Conflict` otherwise.
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order>;

    /// Removes an order and its lines. Stock is not returned.
    async fn delete_order(&self, id: OrderId) -> Result<()>;

    /// Orders created in `[start, end)`, oldest first.
    async fn orders_between(&self, start: DateTime<Utc>, end: DateTime<Utc>)
    -> Result<Vec<Order>>;

    /// Verifies the backend is reachable.
    async fn health_check(&self) -> Result<()>;

    fn backend_name(&self) -> &'static str;
}

/// Extension trait providing convenience methods for catalog stores.
#[async_trait]
pub trait CatalogStoreExt: CatalogStore {
    /// Checks if a customer exists.
    async fn customer_exists(&self, id: CustomerId) -> Result<bool> {
        match self.get_customer(id).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Looks up an item, mapping `NotFound` to `None`.
    async fn find_item(&self, id: ItemId) -> Result<Option<Item>> {
        match self.get_item(id).await {
            Ok(item) => Ok(Some(item)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// Blanket implementation for all CatalogStore implementations
impl<T: CatalogStore + ?Sized> CatalogStoreExt for T {}

/// Fails with `NoMatches` when a search produced nothing.
pub(crate) fn non_empty<T>(results: Vec<T>, entity: &'static str) -> Result<Vec<T>> {
    if results.is_empty() {
        tracing::debug!(entity, "search matched nothing");
        return Err(StoreError::NoMatches(entity));
    }
    Ok(results)
}

/// Runs a store operation under a deadline.
///
/// On expiry the operation future is dropped, which abandons any open
/// transaction (rolled back by the backend) and yields `Timeout`.
pub async fn with_deadline<T, F>(limit: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(?limit, "store operation exceeded its deadline");
            Err(StoreError::Timeout(limit))
        }
    }
}
