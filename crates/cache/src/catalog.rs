//! Cache-aside reads and invalidate-on-write for the catalog.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use catalog_store::{
    Author, AuthorDraft, AuthorId, AuthorSearch, CatalogStore, Customer, CustomerDraft,
    CustomerId, CustomerSearch, Item, ItemDraft, ItemId, ItemSearch, Result, StockChange,
    StoreError, Tag, with_deadline,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{Cache, CacheError, CacheExt, keys};

/// Default lifetime of a cache-aside entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Default deadline for one catalog operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

fn record_cache_error(op: &'static str, key: &str, error: &CacheError) {
    tracing::warn!(op, key, error = %error, "cache operation failed, using store");
    metrics::counter!("cache_errors_total", "op" => op).increment(1);
}

/// Deletes `keys` from the cache, best-effort.
///
/// Failures are logged and counted, never returned.
pub async fn invalidate(cache: &dyn Cache, keys: &[String]) {
    for key in keys {
        match cache.delete(key).await {
            Ok(()) => {
                tracing::debug!(key, "cache key invalidated");
                metrics::counter!("cache_invalidations_total").increment(1);
            }
            Err(e) => record_cache_error("delete", key, &e),
        }
    }
}

/// Catalog access that consults the cache first.
///
/// Item reads are cache-aside with a fixed TTL. Item writes go to the store
/// and then delete the item key and the listing key before returning.
/// Author and customer operations pass through to the store under the same
/// deadline.
pub struct CachedCatalog<S: CatalogStore> {
    store: S,
    cache: Arc<dyn Cache>,
    ttl: Duration,
    timeout: Duration,
}

impl<S: CatalogStore> CachedCatalog<S> {
    /// Creates a cached catalog with the default TTL and deadline.
    pub fn new(store: S, cache: Arc<dyn Cache>) -> Self {
        Self {
            store,
            cache,
            ttl: DEFAULT_TTL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the lifetime of cache-aside entries.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
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

    /// Returns the shared cache client.
    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// Bounds a single cache call by the operation deadline.
    async fn bounded<T, F>(&self, call: F) -> crate::Result<T>
    where
        F: Future<Output = crate::Result<T>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(CacheError::Timeout(self.timeout)))
    }

    /// Serves `key` from the cache, or loads it from the store and caches it.
    ///
    /// Only the store load is subject to `with_deadline`; a slow or failing
    /// cache is treated as a miss.
    async fn read_through<T, F>(&self, key: &str, kind: &'static str, load: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: Future<Output = Result<T>>,
    {
        match self.bounded(self.cache.get_json::<T>(key)).await {
            Ok(Some(value)) => {
                metrics::counter!("cache_hits_total", "kind" => kind).increment(1);
                return Ok(value);
            }
            Ok(None) => {}
            Err(e) => record_cache_error("get", key, &e),
        }
        metrics::counter!("cache_misses_total", "kind" => kind).increment(1);

        let value = with_deadline(self.timeout, load).await?;
        if let Err(e) = self.bounded(self.cache.set_json(key, &value, self.ttl)).await {
            record_cache_error("set", key, &e);
        }
        Ok(value)
    }

    /// Runs a store write, then invalidates `keys` before acknowledging it.
    ///
    /// Keys are also invalidated when the write timed out, since the
    /// outcome of an abandoned write is unknown to the caller.
    async fn write_through<T, F>(&self, keys: Vec<String>, write: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = with_deadline(self.timeout, write).await;
        if matches!(result, Ok(_) | Err(StoreError::Timeout(_))) {
            self.invalidate(&keys).await;
        }
        result
    }

    async fn invalidate(&self, keys: &[String]) {
        if tokio::time::timeout(self.timeout, invalidate(self.cache.as_ref(), keys))
            .await
            .is_err()
        {
            tracing::warn!(?keys, "cache invalidation exceeded its deadline");
            metrics::counter!("cache_errors_total", "op" => "delete").increment(1);
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_item(&self, id: ItemId) -> Result<Item> {
        let key = keys::item(id);
        self.read_through(&key, "item", self.store.get_item(id)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_items(&self) -> Result<Vec<Item>> {
        self.read_through(keys::ALL_ITEMS, "all_items", self.store.list_items()).await
    }

    /// Searches items. Empty results are reported as `NoMatches` and not cached.
    #[tracing::instrument(skip(self))]
    pub async fn search_items(&self, criteria: &ItemSearch) -> Result<Vec<Item>> {
        let key = keys::search(criteria);
        self.read_through(&key, "search", self.store.search_items(criteria)).await
    }

    #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create_item(&self, draft: ItemDraft) -> Result<Item> {
        let item = self
            .write_through(
                vec![keys::ALL_ITEMS.to_string()],
                self.store.create_item(draft),
            )
            .await?;
        tracing::info!(item_id = %item.id, "item created");
        Ok(item)
    }

    #[tracing::instrument(skip(self, draft))]
    pub async fn update_item(&self, id: ItemId, draft: ItemDraft) -> Result<Item> {
        self.write_through(
            keys::stale_after_item_write(id),
            self.store.update_item(id, draft),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn decrement_or_delete_item(&self, id: ItemId) -> Result<StockChange> {
        let change = self
            .write_through(
                keys::stale_after_item_write(id),
                self.store.decrement_or_delete_item(id),
            )
            .await?;
        tracing::info!(item_id = %id, ?change, "item stock decremented or removed");
        Ok(change)
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        with_deadline(self.timeout, self.store.list_tags()).await
    }

    pub async fn get_author(&self, id: AuthorId) -> Result<Author> {
        with_deadline(self.timeout, self.store.get_author(id)).await
    }

    pub async fn list_authors(&self) -> Result<Vec<Author>> {
        with_deadline(self.timeout, self.store.list_authors()).await
    }

    pub async fn search_authors(&self, criteria: &AuthorSearch) -> Result<Vec<Author>> {
        with_deadline(self.timeout, self.store.search_authors(criteria)).await
    }

    pub async fn create_author(&self, draft: AuthorDraft) -> Result<Author> {
        with_deadline(self.timeout, self.store.create_author(draft)).await
    }

    /// Updates an author and invalidates every cached item that embeds it.
    #[tracing::instrument(skip(self, draft))]
    pub async fn update_author(&self, id: AuthorId, draft: AuthorDraft) -> Result<Author> {
        let author = with_deadline(self.timeout, self.store.update_author(id, draft)).await?;

        let mut stale = vec![keys::ALL_ITEMS.to_string()];
        match with_deadline(self.timeout, self.store.list_items()).await {
            Ok(items) => stale.extend(
                items
                    .iter()
                    .filter(|item| item.author.id == id)
                    .map(|item| keys::item(item.id)),
            ),
            Err(e) => {
                tracing::warn!(author_id = %id, error = %e, "could not list items to invalidate");
            }
        }
        self.invalidate(&stale).await;
        Ok(author)
    }

    pub async fn delete_author(&self, id: AuthorId) -> Result<()> {
        with_deadline(self.timeout, self.store.delete_author(id)).await
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer> {
        with_deadline(self.timeout, self.store.get_customer(id)).await
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        with_deadline(self.timeout, self.store.list_customers()).await
    }

    pub async fn search_customers(&self, criteria: &CustomerSearch) -> Result<Vec<Customer>> {
        with_deadline(self.timeout, self.store.search_customers(criteria)).await
    }

    pub async fn create_customer(&self, draft: CustomerDraft) -> Result<Customer> {
        with_deadline(self.timeout, self.store.create_customer(draft)).await
    }

    pub async fn update_customer(&self, id: CustomerId, draft: CustomerDraft) -> Result<Customer> {
        with_deadline(self.timeout, self.store.update_customer(id, draft)).await
    }

    pub async fn delete_customer(&self, id: CustomerId) -> Result<()> {
        with_deadline(self.timeout, self.store.delete_customer(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryCache;
    use catalog_store::{InMemoryCatalogStore, Money};

    async fn setup() -> (CachedCatalog<InMemoryCatalogStore>, InMemoryCache, AuthorId) {
        let store = InMemoryCatalogStore::new();
        let cache = InMemoryCache::new();
        let catalog = CachedCatalog::new(store, Arc::new(cache.clone()));
        let author = catalog
            .create_author(AuthorDraft {
                first_name: "Ursula".to_string(),
                last_name: "Le Guin".to_string(),
                bio: String::new(),
            })
            .await
            .unwrap();
        (catalog, cache, author.id)
    }

    fn draft(author_id: AuthorId, title: &str) -> ItemDraft {
        ItemDraft {
            title: title.to_string(),
            author_id,
            tags: vec![],
            published_at: None,
            price: Money::from_cents(900),
            quantity: 3,
        }
    }

    #[tokio::test]
    async fn get_item_populates_cache() {
        let (catalog, cache, author_id) = setup().await;
        let item = catalog
            .create_item(draft(author_id, "The Dispossessed"))
            .await
            .unwrap();

        assert!(!cache.contains(&keys::item(item.id)).await);
        catalog.get_item(item.id).await.unwrap();
        assert!(cache.contains(&keys::item(item.id)).await);
    }

    #[tokio::test]
    async fn missing_item_is_not_cached() {
        let (catalog, cache, _) = setup().await;
        let result = catalog.get_item(ItemId::new(77)).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn create_invalidates_listing() {
        let (catalog, cache, author_id) = setup().await;
        catalog.create_item(draft(author_id, "A")).await.unwrap();
        assert_eq!(catalog.list_items().await.unwrap().len(), 1);
        assert!(cache.contains(keys::ALL_ITEMS).await);

        catalog.create_item(draft(author_id, "B")).await.unwrap();
        assert!(!cache.contains(keys::ALL_ITEMS).await);
        assert_eq!(catalog.list_items().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn author_update_invalidates_embedding_items() {
        let (catalog, cache, author_id) = setup().await;
        let item = catalog.create_item(draft(author_id, "A")).await.unwrap();
        catalog.get_item(item.id).await.unwrap();

        catalog
            .update_author(
                author_id,
                AuthorDraft {
                    first_name: "Ursula K.".to_string(),
                    last_name: "Le Guin".to_string(),
                    bio: String::new(),
                },
            )
            .await
            .unwrap();

        assert!(!cache.contains(&keys::item(item.id)).await);
        let fresh = catalog.get_item(item.id).await.unwrap();
        assert_eq!(fresh.author.first_name, "Ursula K.");
    }

    #[tokio::test]
    async fn corrupt_entry_falls_back_to_store() {
        let (catalog, cache, author_id) = setup().await;
        let item = catalog.create_item(draft(author_id, "A")).await.unwrap();
        cache
            .set(&keys::item(item.id), "not json", DEFAULT_TTL)
            .await
            .unwrap();

        let fetched = catalog.get_item(item.id).await.unwrap();
        assert_eq!(fetched.title, "A");
    }
}
