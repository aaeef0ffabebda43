use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::{
    Author, AuthorDraft, AuthorId, AuthorSearch, Customer, CustomerDraft, CustomerId,
    CustomerSearch, Item, ItemDraft, ItemId, ItemSearch, Money, NewOrder, Order, OrderId,
    OrderLine, OrderSearch, OrderStatus, Result, StockChange, StoreError, Tag, order_total,
    store::{CatalogStore, non_empty},
};

#[derive(Debug, Clone)]
struct StoredItem {
    title: String,
    author_id: AuthorId,
    tag_ids: BTreeSet<i64>,
    published_at: Option<NaiveDate>,
    price: Money,
    quantity: u32,
}

#[derive(Debug, Clone)]
struct StoredOrder {
    customer_id: CustomerId,
    status: OrderStatus,
    total: Money,
    created_at: DateTime<Utc>,
    lines: Vec<OrderLine>,
}

#[derive(Debug, Default)]
struct CatalogState {
    authors: BTreeMap<AuthorId, Author>,
    customers: BTreeMap<CustomerId, Customer>,
    items: BTreeMap<ItemId, StoredItem>,
    tags: BTreeMap<i64, String>,
    tag_ids_by_name: HashMap<String, i64>,
    orders: BTreeMap<OrderId, StoredOrder>,
    last_id: i64,
}

impl CatalogState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn tag_id(&mut self, name: String) -> i64 {
        if let Some(id) = self.tag_ids_by_name.get(&name) {
            return *id;
        }
        let id = self.next_id();
        self.tags.insert(id, name.clone());
        self.tag_ids_by_name.insert(name, id);
        id
    }

    fn stored_item(&mut self, draft: ItemDraft) -> Result<StoredItem> {
        if !self.authors.contains_key(&draft.author_id) {
            return Err(StoreError::Invalid(format!(
                "author {} does not exist",
                draft.author_id
            )));
        }
        let tag_ids = draft
            .tag_names()
            .into_iter()
            .map(|name| self.tag_id(name))
            .collect();
        Ok(StoredItem {
            title: draft.title,
            author_id: draft.author_id,
            tag_ids,
            published_at: draft.published_at,
            price: draft.price,
            quantity: draft.quantity,
        })
    }

    fn resolve_item(&self, id: ItemId, stored: &StoredItem) -> Result<Item> {
        let author = self
            .authors
            .get(&stored.author_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("author", stored.author_id))?;
        let tags = stored
            .tag_ids
            .iter()
            .filter_map(|tag_id| self.tags.get(tag_id).cloned())
            .collect();
        Ok(Item {
            id,
            title: stored.title.clone(),
            author,
            tags,
            published_at: stored.published_at,
            price: stored.price,
            quantity: stored.quantity,
        })
    }

    fn resolve_order(&self, id: OrderId, stored: &StoredOrder) -> Result<Order> {
        let customer = self
            .customers
            .get(&stored.customer_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("customer", stored.customer_id))?;
        Ok(Order {
            id,
            customer,
            status: stored.status,
            total: stored.total,
            created_at: stored.created_at,
            lines: stored.lines.clone(),
        })
    }

    fn resolve_orders<'a>(
        &self,
        orders: impl Iterator<Item = (&'a OrderId, &'a StoredOrder)>,
    ) -> Result<Vec<Order>> {
        orders
            .map(|(id, stored)| self.resolve_order(*id, stored))
            .collect()
    }
}

/// In-memory catalog store.
///
/// Every mutation runs to completion under a single write guard with no
/// suspension point inside, which serializes stock changes per process and
/// makes multi-row writes all-or-nothing even if the caller is cancelled.
#[derive(Clone, Default)]
pub struct InMemoryCatalogStore {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalogStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of items stored.
    pub async fn item_count(&self) -> usize {
        self.state.read().await.items.len()
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Clears all rows.
    pub async fn clear(&self) {
        *self.state.write().await = CatalogState::default();
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn get_item(&self, id: ItemId) -> Result<Item> {
        let state = self.state.read().await;
        let stored = state
            .items
            .get(&id)
            .ok_or_else(|| StoreError::not_found("item", id))?;
        state.resolve_item(id, stored)
    }

    async fn list_items(&self) -> Result<Vec<Item>> {
        let state = self.state.read().await;
        state
            .items
            .iter()
            .map(|(id, stored)| state.resolve_item(*id, stored))
            .collect()
    }

    async fn search_items(&self, criteria: &ItemSearch) -> Result<Vec<Item>> {
        let state = self.state.read().await;
        let mut results = Vec::new();
        for (id, stored) in &state.items {
            let item = state.resolve_item(*id, stored)?;
            if criteria.matches(
                &item.title,
                &item.author.first_name,
                &item.author.last_name,
                item.price,
            ) {
                results.push(item);
            }
        }
        non_empty(results, "items")
    }

    async fn create_item(&self, draft: ItemDraft) -> Result<Item> {
        draft.validate()?;
        let mut state = self.state.write().await;
        let stored = state.stored_item(draft)?;
        let id = ItemId::new(state.next_id());
        let item = state.resolve_item(id, &stored)?;
        state.items.insert(id, stored);
        Ok(item)
    }

    async fn update_item(&self, id: ItemId, draft: ItemDraft) -> Result<Item> {
        draft.validate()?;
        let mut state = self.state.write().await;
        if !state.items.contains_key(&id) {
            return Err(StoreError::not_found("item", id));
        }
        let stored = state.stored_item(draft)?;
        let item = state.resolve_item(id, &stored)?;
        state.items.insert(id, stored);
        Ok(item)
    }

    async fn decrement_or_delete_item(&self, id: ItemId) -> Result<StockChange> {
        let mut state = self.state.write().await;
        let stored = state
            .items
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("item", id))?;

        if stored.quantity > 1 {
            stored.quantity -= 1;
            return Ok(StockChange::Decremented {
                remaining: stored.quantity,
            });
        }

        state.items.remove(&id);
        Ok(StockChange::Removed)
    }

    async fn reserve_stock(&self, id: ItemId, quantity: u32) -> Result<u32> {
        if quantity == 0 {
            return Err(StoreError::Invalid("quantity must be at least 1".to_string()));
        }
        let mut state = self.state.write().await;
        let stored = state
            .items
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("item", id))?;

        if stored.quantity < quantity {
            return Err(StoreError::InsufficientStock {
                item_id: id,
                requested: quantity,
                available: stored.quantity,
            });
        }
        stored.quantity -= quantity;
        Ok(stored.quantity)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let state = self.state.read().await;
        Ok(state
            .tags
            .iter()
            .map(|(id, name)| Tag {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    async fn get_author(&self, id: AuthorId) -> Result<Author> {
        self.state
            .read()
            .await
            .authors
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("author", id))
    }

    async fn list_authors(&self) -> Result<Vec<Author>> {
        Ok(self.state.read().await.authors.values().cloned().collect())
    }

    async fn search_authors(&self, criteria: &AuthorSearch) -> Result<Vec<Author>> {
        let state = self.state.read().await;
        let results = state
            .authors
            .values()
            .filter(|a| criteria.matches(&a.first_name, &a.last_name))
            .cloned()
            .collect();
        non_empty(results, "authors")
    }

    async fn create_author(&self, draft: AuthorDraft) -> Result<Author> {
        draft.validate()?;
        let mut state = self.state.write().await;
        let id = AuthorId::new(state.next_id());
        let author = draft.into_author(id);
        state.authors.insert(id, author.clone());
        Ok(author)
    }

    async fn update_author(&self, id: AuthorId, draft: AuthorDraft) -> Result<Author> {
        draft.validate()?;
        let mut state = self.state.write().await;
        let slot = state
            .authors
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("author", id))?;
        *slot = draft.into_author(id);
        Ok(slot.clone())
    }

    async fn delete_author(&self, id: AuthorId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.authors.contains_key(&id) {
            return Err(StoreError::not_found("author", id));
        }
        if state.items.values().any(|item| item.author_id == id) {
            return Err(StoreError::Conflict(format!(
                "author {id} is still referenced by items"
            )));
        }
        state.authors.remove(&id);
        Ok(())
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Customer> {
        self.state
            .read()
            .await
            .customers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("customer", id))
    }

    async fn list_customers(&self) -> Result<Vec<Customer>> {
        Ok(self.state.read().await.customers.values().cloned().collect())
    }

    async fn search_customers(&self, criteria: &CustomerSearch) -> Result<Vec<Customer>> {
        let state = self.state.read().await;
        let results = state
            .customers
            .values()
            .filter(|c| criteria.matches(&c.name, &c.email))
            .cloned()
            .collect();
        non_empty(results, "customers")
    }

    async fn create_customer(&self, draft: CustomerDraft) -> Result<Customer> {
        draft.validate()?;
        let mut state = self.state.write().await;
        let id = CustomerId::new(state.next_id());
        let customer = draft.into_customer(id);
        state.customers.insert(id, customer.clone());
        Ok(customer)
    }

    async fn update_customer(&self, id: CustomerId, draft: CustomerDraft) -> Result<Customer> {
        draft.validate()?;
        let mut state = self.state.write().await;
        let slot = state
            .customers
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("customer", id))?;
        *slot = draft.into_customer(id);
        Ok(slot.clone())
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.customers.contains_key(&id) {
            return Err(StoreError::not_found("customer", id));
        }
        if state.orders.values().any(|o| o.customer_id == id) {
            return Err(StoreError::Conflict(format!(
                "customer {id} is still referenced by orders"
            )));
        }
        state.customers.remove(&id);
        Ok(())
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        if order.lines.is_empty() {
            return Err(StoreError::Invalid("order has no lines".to_string()));
        }

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if !state.customers.contains_key(&order.customer_id) {
            return Err(StoreError::not_found("customer", order.customer_id));
        }

        // Validate every line against stock already claimed by earlier lines
        // before touching anything, so a failure leaves no trace.
        let mut claimed: BTreeMap<ItemId, u32> = BTreeMap::new();
        let mut lines = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            if line.quantity == 0 {
                return Err(StoreError::Invalid(format!(
                    "quantity for item {} must be at least 1",
                    line.item_id
                )));
            }
            let stored = state
                .items
                .get(&line.item_id)
                .ok_or_else(|| StoreError::not_found("item", line.item_id))?;
            let taken = claimed.entry(line.item_id).or_default();
            let available = stored.quantity - *taken;
            if available < line.quantity {
                return Err(StoreError::InsufficientStock {
                    item_id: line.item_id,
                    requested: line.quantity,
                    available,
                });
            }
            *taken += line.quantity;
            lines.push(OrderLine {
                item_id: line.item_id,
                title: stored.title.clone(),
                unit_price: stored.price,
                quantity: line.quantity,
            });
        }

        let computed = order_total(&lines)?;
        if computed != order.declared_total {
            return Err(StoreError::TotalMismatch {
                declared: order.declared_total,
                computed,
            });
        }

        for (item_id, quantity) in claimed {
            if let Some(stored) = state.items.get_mut(&item_id) {
                stored.quantity -= quantity;
            }
        }

        let id = OrderId::new(state.next_id());
        let stored = StoredOrder {
            customer_id: order.customer_id,
            status: OrderStatus::Pending,
            total: order.declared_total,
            created_at: order.created_at,
            lines,
        };
        let committed = state.resolve_order(id, &stored)?;
        state.orders.insert(id, stored);
        Ok(committed)
    }

    async fn get_order(&self, id: OrderId) -> Result<Order> {
        let state = self.state.read().await;
        let stored = state
            .orders
            .get(&id)
            .ok_or_else(|| StoreError::not_found("order", id))?;
        state.resolve_order(id, stored)
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        state.resolve_orders(state.orders.iter())
    }

    async fn search_orders(&self, criteria: &OrderSearch) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let results = state
            .resolve_orders(state.orders.iter())?
            .into_iter()
            .filter(|o| criteria.matches(&o.customer.name, o.status))
            .collect();
        non_empty(results, "orders")
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        let stored = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("order", id))?;
        if stored.status != expected {
            return Err(StoreError::Conflict(format!(
                "order {id} is {} (expected {expected})",
                stored.status
            )));
        }
        stored.status = next;
        let stored = stored.clone();
        state.resolve_order(id, &stored)
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        self.state
            .write()
            .await
            .orders
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    async fn orders_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders = state.resolve_orders(
            state
                .orders
                .iter()
                .filter(|(_, o)| o.created_at >= start && o.created_at < end),
        )?;
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
