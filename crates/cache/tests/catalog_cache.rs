//! Cache-aside behaviour of `CachedCatalog` over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cache::{Cache, CachedCatalog, InMemoryCache, keys};
use catalog_store::{
    AuthorDraft, AuthorId, CatalogStore, InMemoryCatalogStore, ItemDraft, ItemSearch, Money,
    StockChange, StoreError,
};

struct Fixture {
    catalog: CachedCatalog<InMemoryCatalogStore>,
    cache: InMemoryCache,
    author_id: AuthorId,
}

async fn fixture(ttl: Duration) -> Fixture {
    let cache = InMemoryCache::new();
    let catalog =
        CachedCatalog::new(InMemoryCatalogStore::new(), Arc::new(cache.clone())).with_ttl(ttl);
    let author = catalog
        .create_author(AuthorDraft {
            first_name: "Iain".to_string(),
            last_name: "Banks".to_string(),
            bio: String::new(),
        })
        .await
        .unwrap();
    Fixture {
        catalog,
        cache,
        author_id: author.id,
    }
}

fn draft(author_id: AuthorId, title: &str, price: i64, quantity: u32) -> ItemDraft {
    ItemDraft {
        title: title.to_string(),
        author_id,
        tags: vec!["culture".to_string()],
        published_at: None,
        price: Money::from_cents(price),
        quantity,
    }
}

#[tokio::test]
async fn cached_read_is_served_until_invalidated() {
    let f = fixture(Duration::from_secs(600)).await;
    let item = f
        .catalog
        .create_item(draft(f.author_id, "Consider Phlebas", 1200, 3))
        .await
        .unwrap();
    f.catalog.get_item(item.id).await.unwrap();

    // A write that bypasses the cached path is not observed...
    f.catalog
        .store()
        .update_item(item.id, draft(f.author_id, "Bypassed", 1200, 3))
        .await
        .unwrap();
    assert_eq!(
        f.catalog.get_item(item.id).await.unwrap().title,
        "Consider Phlebas"
    );

    // ...but a write through the catalog is, immediately.
    f.catalog
        .update_item(item.id, draft(f.author_id, "Player of Games", 1500, 3))
        .await
        .unwrap();
    let fresh = f.catalog.get_item(item.id).await.unwrap();
    assert_eq!(fresh.title, "Player of Games");
    assert_eq!(fresh.price, Money::from_cents(1500));
}

#[tokio::test]
async fn decrement_or_delete_is_coherent() {
    let f = fixture(Duration::from_secs(600)).await;
    let item = f
        .catalog
        .create_item(draft(f.author_id, "Excession", 1000, 2))
        .await
        .unwrap();
    assert_eq!(f.catalog.get_item(item.id).await.unwrap().quantity, 2);
    assert_eq!(f.catalog.list_items().await.unwrap().len(), 1);

    assert_eq!(
        f.catalog.decrement_or_delete_item(item.id).await.unwrap(),
        StockChange::Decremented { remaining: 1 }
    );
    assert_eq!(f.catalog.get_item(item.id).await.unwrap().quantity, 1);

    assert_eq!(
        f.catalog.decrement_or_delete_item(item.id).await.unwrap(),
        StockChange::Removed
    );
    assert!(matches!(
        f.catalog.get_item(item.id).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(f.catalog.list_items().await.unwrap().is_empty());
}

#[tokio::test]
async fn unavailable_cache_is_transparent() {
    let f = fixture(Duration::from_secs(600)).await;
    f.cache.set_unavailable(true);

    let item = f
        .catalog
        .create_item(draft(f.author_id, "Use of Weapons", 1100, 3))
        .await
        .unwrap();
    assert_eq!(f.catalog.get_item(item.id).await.unwrap().title, "Use of Weapons");
    assert_eq!(f.catalog.list_items().await.unwrap().len(), 1);
    assert_eq!(
        f.catalog
            .search_items(&ItemSearch::new().title("weapons"))
            .await
            .unwrap()
            .len(),
        1
    );
    f.catalog
        .update_item(item.id, draft(f.author_id, "Look to Windward", 1100, 3))
        .await
        .unwrap();
    f.catalog.decrement_or_delete_item(item.id).await.unwrap();

    f.cache.set_unavailable(false);
    assert!(f.cache.is_empty().await);
    assert_eq!(f.catalog.get_item(item.id).await.unwrap().quantity, 2);
}

#[tokio::test]
async fn search_results_are_cached_but_not_invalidated() {
    let f = fixture(Duration::from_secs(600)).await;
    f.catalog
        .create_item(draft(f.author_id, "Matter", 1000, 1))
        .await
        .unwrap();

    let criteria = ItemSearch::new().title("matter");
    assert_eq!(f.catalog.search_items(&criteria).await.unwrap().len(), 1);
    assert!(f.cache.contains(&keys::search(&criteria)).await);

    f.catalog
        .create_item(draft(f.author_id, "Dark Matter", 1000, 1))
        .await
        .unwrap();

    // Search keys expire with their TTL instead of being invalidated.
    assert_eq!(f.catalog.search_items(&criteria).await.unwrap().len(), 1);
    assert_eq!(
        f.catalog
            .search_items(&ItemSearch::new().title("MATTER").author_last_name("banks"))
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn empty_search_is_not_cached() {
    let f = fixture(Duration::from_secs(600)).await;
    let criteria = ItemSearch::new().title("Inversions");
    assert!(matches!(
        f.catalog.search_items(&criteria).await,
        Err(StoreError::NoMatches("items"))
    ));
    assert!(!f.cache.contains(&keys::search(&criteria)).await);
}

#[tokio::test]
async fn stale_entries_expire_after_ttl() {
    let f = fixture(Duration::from_millis(300)).await;
    let item = f
        .catalog
        .create_item(draft(f.author_id, "Feersum Endjinn", 1000, 1))
        .await
        .unwrap();
    f.catalog.get_item(item.id).await.unwrap();

    f.catalog
        .store()
        .update_item(item.id, draft(f.author_id, "Feersum Endjinn (rev)", 1000, 1))
        .await
        .unwrap();

    assert_eq!(
        f.catalog.get_item(item.id).await.unwrap().title,
        "Feersum Endjinn"
    );

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(
        f.catalog.get_item(item.id).await.unwrap().title,
        "Feersum Endjinn (rev)"
    );
}

/// A cache backend that never answers.
struct HungCache;

#[async_trait]
impl Cache for HungCache {
    async fn get(&self, _key: &str) -> cache::Result<Option<String>> {
        std::future::pending().await
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> cache::Result<()> {
        std::future::pending().await
    }

    async fn delete(&self, _key: &str) -> cache::Result<()> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn hung_cache_is_a_miss_not_a_timeout() {
    let catalog = CachedCatalog::new(InMemoryCatalogStore::new(), Arc::new(HungCache))
        .with_timeout(Duration::from_millis(200));
    let author = catalog
        .create_author(AuthorDraft {
            first_name: "Iain".to_string(),
            last_name: "Banks".to_string(),
            bio: String::new(),
        })
        .await
        .unwrap();
    let item = catalog
        .create_item(draft(author.id, "The Algebraist", 1000, 2))
        .await
        .unwrap();

    assert_eq!(catalog.get_item(item.id).await.unwrap().title, "The Algebraist");
    assert_eq!(catalog.list_items().await.unwrap().len(), 1);
    assert_eq!(
        catalog
            .search_items(&ItemSearch::new().title("algebraist"))
            .await
            .unwrap()
            .len(),
        1
    );

    let updated = catalog
        .update_item(item.id, draft(author.id, "Transition", 1000, 2))
        .await
        .unwrap();
    assert_eq!(updated.title, "Transition");
    assert_eq!(catalog.get_item(item.id).await.unwrap().title, "Transition");
}
